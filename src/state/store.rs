//! Authoritative room documents and their subscriptions.
//!
//! Each room lives behind its own mutex, which is the single serialization
//! point for every mutation of that room. Observers hold a `watch` receiver
//! and only ever see committed snapshots.

use super::timer::TimerHandle;
use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Independently subscribable sub-paths of a room
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoomTopic {
    Settings,
    Host,
    Players,
    TimeLeft,
    /// Status together with the round number
    Status,
    CurrentRound,
}

impl RoomTopic {
    pub const ALL: [RoomTopic; 6] = [
        RoomTopic::Settings,
        RoomTopic::Host,
        RoomTopic::Players,
        RoomTopic::TimeLeft,
        RoomTopic::Status,
        RoomTopic::CurrentRound,
    ];
}

/// Topics whose content differs between two snapshots of the same room
pub fn changed_topics(previous: Option<&Room>, next: &Room) -> Vec<RoomTopic> {
    let Some(prev) = previous else {
        return RoomTopic::ALL.to_vec();
    };

    RoomTopic::ALL
        .into_iter()
        .filter(|topic| match topic {
            RoomTopic::Settings => prev.settings != next.settings,
            RoomTopic::Host => prev.host != next.host,
            RoomTopic::Players => prev.players != next.players,
            RoomTopic::TimeLeft => prev.time_left != next.time_left,
            RoomTopic::Status => {
                prev.status != next.status || prev.round_number != next.round_number
            }
            RoomTopic::CurrentRound => prev.current_round != next.current_round,
        })
        .collect()
}

/// Liveness registration handed out at join time.
///
/// Disconnect cleanup only applies while the token is still the participant's
/// current one; quitting or reconnecting invalidates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceToken {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub connection: u64,
}

pub(crate) struct RoomSlot {
    cell: Arc<Mutex<RoomCell>>,
    updates: watch::Sender<Option<Room>>,
}

pub(crate) struct RoomCell {
    pub(crate) room: Room,
    pub(crate) deleted: bool,
    pub(crate) timer: Option<TimerHandle>,
    /// Ownership token for countdowns; bumped whenever a countdown is replaced
    pub(crate) timer_epoch: u64,
    /// Round number for which a template fetch is in flight
    pub(crate) template_fetch_round: Option<u32>,
    pub(crate) presence: HashMap<ParticipantId, u64>,
    pub(crate) last_activity: Instant,
}

/// Exclusive access to one room, released on drop
pub(crate) struct RoomGuard {
    slot: Arc<RoomSlot>,
    cell: OwnedMutexGuard<RoomCell>,
}

impl Deref for RoomGuard {
    type Target = RoomCell;

    fn deref(&self) -> &RoomCell {
        &self.cell
    }
}

impl DerefMut for RoomGuard {
    fn deref_mut(&mut self) -> &mut RoomCell {
        &mut self.cell
    }
}

impl RoomGuard {
    /// Publish the current document as the next version
    pub(crate) fn commit(&mut self) {
        self.cell.room.version += 1;
        self.cell.last_activity = Instant::now();
        self.slot.updates.send_replace(Some(self.cell.room.clone()));
    }

    /// Mark the room gone and tell observers; the caller unregisters the slot
    pub(crate) fn mark_deleted(&mut self) {
        AppState::disarm_timer(&mut self.cell);
        self.cell.deleted = true;
        self.cell.presence.clear();
        self.slot.updates.send_replace(None);
    }

    fn same_slot(&self, other: &Arc<RoomSlot>) -> bool {
        Arc::ptr_eq(&self.slot, other)
    }
}

impl AppState {
    /// Register a freshly created room; fails if the code is already used
    pub(crate) async fn insert_room(&self, room: Room) -> RoomResult<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            return Err(RoomError::RoomCodeTaken);
        }
        rooms.insert(room.id.clone(), Arc::new(new_slot(room)));
        Ok(())
    }

    pub(crate) async fn lock_room(&self, room_id: &str) -> RoomResult<RoomGuard> {
        let slot = self
            .rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)?;

        let cell = tokio::time::timeout(
            self.config.store_lock_timeout,
            slot.cell.clone().lock_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!("Timed out waiting for room {}", room_id);
            RoomError::StoreUnavailable
        })?;

        if cell.deleted {
            return Err(RoomError::RoomNotFound);
        }
        Ok(RoomGuard { slot, cell })
    }

    /// Lock a room without the store timeout; only for cleanup that must land
    pub(crate) async fn lock_room_untimed(&self, room_id: &str) -> RoomResult<RoomGuard> {
        let slot = self
            .rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)?;

        let cell = slot.cell.clone().lock_owned().await;
        if cell.deleted {
            return Err(RoomError::RoomNotFound);
        }
        Ok(RoomGuard { slot, cell })
    }

    /// Delete a locked room and drop it from the registry
    pub(crate) async fn delete_room(&self, mut guard: RoomGuard) {
        guard.mark_deleted();
        let room_id = guard.room.id.clone();

        let mut rooms = self.rooms.write().await;
        if rooms
            .get(&room_id)
            .is_some_and(|slot| guard.same_slot(slot))
        {
            rooms.remove(&room_id);
        }
        tracing::info!("Deleted room {}", room_id);
    }

    /// Get the latest committed snapshot of a room
    pub async fn get_room(&self, room_id: &str) -> RoomResult<Room> {
        let rx = self.subscribe(room_id).await?;
        let snapshot = rx.borrow().clone();
        snapshot.ok_or(RoomError::RoomNotFound)
    }

    /// Observe committed snapshots of a room; `None` means it was deleted
    pub async fn subscribe(&self, room_id: &str) -> RoomResult<watch::Receiver<Option<Room>>> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|slot| slot.updates.subscribe())
            .ok_or(RoomError::RoomNotFound)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Record a participant's connection as the live one for this room
    pub(crate) fn register_presence(
        &self,
        guard: &mut RoomGuard,
        participant_id: &str,
    ) -> PresenceToken {
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        guard
            .presence
            .insert(participant_id.to_string(), connection);
        PresenceToken {
            room_id: guard.room.id.clone(),
            participant_id: participant_id.to_string(),
            connection,
        }
    }

    /// Delete rooms without a committed change for longer than the idle TTL
    pub async fn reap_idle_rooms(&self) -> usize {
        let slots: Vec<Arc<RoomSlot>> = self.rooms.read().await.values().cloned().collect();
        let ttl = self.config.room_idle_ttl;
        let mut reaped = 0;

        for slot in slots {
            // Busy rooms are not idle
            let Ok(cell) = slot.cell.clone().try_lock_owned() else {
                continue;
            };
            if cell.deleted || cell.last_activity.elapsed() < ttl {
                continue;
            }
            let guard = RoomGuard { slot, cell };
            tracing::info!("Reaping idle room {}", guard.room.id);
            self.delete_room(guard).await;
            reaped += 1;
        }
        reaped
    }
}

fn new_slot(room: Room) -> RoomSlot {
    let (updates, _rx) = watch::channel(Some(room.clone()));
    RoomSlot {
        cell: Arc::new(Mutex::new(RoomCell {
            room,
            deleted: false,
            timer: None,
            timer_epoch: 0,
            template_fetch_round: None,
            presence: HashMap::new(),
            last_activity: Instant::now(),
        })),
        updates,
    }
}
