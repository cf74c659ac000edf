use super::store::{PresenceToken, RoomCell};
use super::AppState;
use crate::error::{RoomError, RoomResult};

impl AppState {
    /// Leave a room. The host leaving deletes the room for everyone.
    pub async fn quit(&self, room_id: &str, participant_id: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;

        if guard.room.is_host(participant_id) {
            tracing::info!("Host {} closed room {}", participant_id, room_id);
            self.delete_room(guard).await;
            return Ok(());
        }

        if !remove_participant(&mut guard, participant_id) {
            return Err(RoomError::NotInRoom);
        }
        guard.commit();
        tracing::info!("{} left room {}", participant_id, room_id);
        Ok(())
    }

    /// Transport-level disconnect for the connection identified by `token`.
    ///
    /// A no-op unless the token is still the participant's live connection,
    /// so it never undoes an explicit quit or a newer reconnect. A host
    /// disconnect only stops the countdown; everyone else is removed.
    pub async fn handle_disconnect(&self, token: &PresenceToken) {
        let mut guard = match self.lock_room(&token.room_id).await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::debug!(
                    "Disconnect of {} from room {} ignored: {}",
                    token.participant_id,
                    token.room_id,
                    e
                );
                return;
            }
        };

        if guard.presence.get(&token.participant_id) != Some(&token.connection) {
            tracing::debug!(
                "Stale disconnect for {} in room {}",
                token.participant_id,
                token.room_id
            );
            return;
        }
        guard.presence.remove(&token.participant_id);

        if guard.room.is_host(&token.participant_id) {
            Self::disarm_timer(&mut guard);
            tracing::warn!(
                "Host {} disconnected from room {}; countdown paused",
                token.participant_id,
                token.room_id
            );
            return;
        }

        if remove_participant(&mut guard, &token.participant_id) {
            guard.commit();
            tracing::info!(
                "{} disconnected from room {}",
                token.participant_id,
                token.room_id
            );
        }
    }
}

/// Drop a non-host participant, their submission and the votes cast for it
fn remove_participant(cell: &mut RoomCell, participant_id: &str) -> bool {
    if cell.room.players.shift_remove(participant_id).is_none() {
        return false;
    }
    cell.presence.remove(participant_id);

    let round = &mut cell.room.current_round;
    if round.submissions.shift_remove(participant_id).is_some() {
        // Those voters get their vote back
        round.voted.retain(|_, target| target != participant_id);
    }
    true
}
