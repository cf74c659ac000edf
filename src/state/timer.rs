//! Timer Authority: one countdown per room per timed phase.
//!
//! A countdown owns the epoch it was armed with. Any phase change bumps the
//! room's epoch before a new countdown starts, so a stale countdown finds its
//! epoch outdated on its next tick and stops without touching the room.

use super::store::{RoomCell, RoomGuard};
use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::RoomStatus;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub(crate) struct TimerHandle {
    task: JoinHandle<()>,
}

impl AppState {
    /// Start the countdown for the room's current phase, replacing any running one
    pub(crate) fn arm_timer(&self, cell: &mut RoomCell) {
        Self::disarm_timer(cell);

        if !self.config.auto_advance || !cell.room.status.is_timed() {
            return;
        }

        let state = self.clone();
        let room_id = cell.room.id.clone();
        let epoch = cell.timer_epoch;
        let tick = self.config.timer_tick;

        tracing::debug!(
            "Arming {:?} countdown for room {} ({}s, epoch {})",
            cell.room.status,
            room_id,
            cell.room.time_left,
            epoch
        );

        let task = tokio::spawn(async move {
            state.run_countdown(room_id, epoch, tick).await;
        });
        cell.timer = Some(TimerHandle { task });
    }

    /// Invalidate and stop whatever countdown the room has
    pub(crate) fn disarm_timer(cell: &mut RoomCell) {
        cell.timer_epoch += 1;
        if let Some(timer) = cell.timer.take() {
            timer.task.abort();
        }
    }

    pub(crate) fn timer_running(cell: &RoomCell) -> bool {
        cell.timer
            .as_ref()
            .is_some_and(|timer| !timer.task.is_finished())
    }

    async fn run_countdown(self, room_id: String, epoch: u64, tick: Duration) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.timer_tick(&room_id, epoch).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(RoomError::StoreUnavailable) => {
                    tracing::warn!("Countdown for room {} skipped a tick", room_id);
                }
                Err(e) => {
                    tracing::debug!("Countdown for room {} stopped: {}", room_id, e);
                    break;
                }
            }
        }
    }

    /// One countdown step. Returns whether the countdown keeps running.
    async fn timer_tick(&self, room_id: &str, epoch: u64) -> RoomResult<bool> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.timer_epoch != epoch {
            return Ok(false);
        }

        guard.room.time_left = guard.room.time_left.saturating_sub(1);
        guard.commit();
        if guard.room.time_left > 0 {
            return Ok(true);
        }

        // This countdown is done; detach it so the transition doesn't abort it mid-tick
        guard.timer = None;
        tracing::info!(
            "Countdown expired in room {} during {:?}",
            room_id,
            guard.room.status
        );
        match guard.room.status {
            RoomStatus::Submission => self.enter_voting(&mut guard),
            RoomStatus::Voting => self.finish_round(&mut guard),
            _ => {}
        }
        Ok(false)
    }

    /// Re-arm a countdown for a timed phase that has none (host reconnect)
    pub(crate) fn resume_timer(&self, guard: &mut RoomGuard) {
        if guard.room.status.is_timed() && !Self::timer_running(guard) {
            tracing::info!(
                "Resuming {:?} countdown in room {} at {}s",
                guard.room.status,
                guard.room.id,
                guard.room.time_left
            );
            self.arm_timer(guard);
        }
    }
}
