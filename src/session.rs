//! Per-connection client context.
//!
//! Everything a connection knows about itself lives here and is passed into
//! every intent explicitly: who it is, which room it is in, the presence
//! token for disconnect cleanup, and what it wants pushed.

use crate::error::{RoomError, RoomResult};
use crate::protocol::{RoomPatch, ServerMessage};
use crate::state::{PresenceToken, RoomTopic};
use crate::types::{ParticipantId, Room, RoomId};
use std::collections::HashSet;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Session {
    pub participant_id: ParticipantId,
    pub room_id: Option<RoomId>,
    pub presence: Option<PresenceToken>,
    pub topics: HashSet<RoomTopic>,
    updates: Option<watch::Receiver<Option<Room>>>,
    last_seen: Option<Room>,
}

impl Session {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            room_id: None,
            presence: None,
            topics: RoomTopic::ALL.into_iter().collect(),
            updates: None,
            last_seen: None,
        }
    }

    /// The room this session is in
    pub fn room(&self) -> RoomResult<&str> {
        self.room_id.as_deref().ok_or(RoomError::NotInRoom)
    }

    /// Start observing a room; returns the snapshot the observer starts from
    pub fn enter(
        &mut self,
        presence: PresenceToken,
        mut updates: watch::Receiver<Option<Room>>,
    ) -> Option<Room> {
        let snapshot = updates.borrow_and_update().clone();
        self.room_id = Some(presence.room_id.clone());
        self.presence = Some(presence);
        self.updates = Some(updates);
        self.last_seen = snapshot.clone();
        snapshot
    }

    /// Stop observing; the returned token is no longer live
    pub fn leave(&mut self) -> Option<PresenceToken> {
        self.room_id = None;
        self.updates = None;
        self.last_seen = None;
        self.presence.take()
    }

    /// Wait for the next committed snapshot of the observed room.
    /// Never resolves while the session is not in a room.
    pub async fn next_update(&mut self) -> Option<Room> {
        match self.updates.as_mut() {
            Some(rx) => match rx.changed().await {
                Ok(()) => rx.borrow_and_update().clone(),
                // Store dropped the room
                Err(_) => None,
            },
            None => std::future::pending().await,
        }
    }

    /// Turn a snapshot into the push message this session should receive
    pub fn observe(&mut self, snapshot: Option<Room>) -> Option<ServerMessage> {
        match snapshot {
            Some(room) => {
                let patch = RoomPatch::between(self.last_seen.as_ref(), &room, &self.topics);
                self.last_seen = Some(room);
                patch.map(ServerMessage::RoomPatch)
            }
            None => {
                let room_id = self.room_id.clone()?;
                self.leave();
                Some(ServerMessage::RoomDeleted { room_id })
            }
        }
    }
}
