use super::store::{PresenceToken, RoomGuard};
use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::*;
use indexmap::IndexMap;
use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Generate a random room code (6 characters)
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Trim and cap a display name; blank names get a generated one
pub(crate) fn normalize_display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return petname::petname(2, " ").unwrap_or_else(|| "Anonymous Player".to_string());
    }
    trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect()
}

impl AppState {
    /// Create a room with a fresh unique code; the host is its only player
    pub async fn create_room(
        &self,
        host_id: &str,
        display_name: String,
        settings: RoomSettings,
    ) -> RoomResult<Room> {
        settings.validate()?;
        loop {
            let code = generate_room_code();
            match self
                .create_room_with_code(&code, host_id, display_name.clone(), settings.clone())
                .await
            {
                // Collision - try again (~887M combinations)
                Err(RoomError::RoomCodeTaken) => continue,
                other => return other,
            }
        }
    }

    /// Create a room under a caller-chosen code
    pub async fn create_room_with_code(
        &self,
        code: &str,
        host_id: &str,
        display_name: String,
        settings: RoomSettings,
    ) -> RoomResult<Room> {
        settings.validate()?;
        if code.trim().is_empty() {
            return Err(RoomError::InvalidSettings(
                "room code must not be empty".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut players = IndexMap::new();
        players.insert(
            host_id.to_string(),
            PlayerEntry {
                display_name: normalize_display_name(&display_name),
                total_votes: 0,
                joined_at: now.clone(),
            },
        );

        let room = Room {
            id: code.trim().to_string(),
            host: host_id.to_string(),
            status: RoomStatus::Lobby,
            round_number: 1,
            time_left: settings.submission_seconds,
            settings,
            players,
            current_round: CurrentRound::default(),
            created_at: now,
            version: 0,
        };

        self.insert_room(room.clone()).await?;
        tracing::info!(
            "Room {} created by {} ({:?})",
            room.id,
            host_id,
            room.settings.game_type
        );
        Ok(room)
    }

    /// Join a room in the lobby, or reconnect as an existing member in any phase.
    ///
    /// The capacity check and the insert happen under the room's writer lock,
    /// so concurrent joins can never overshoot `max_players`.
    pub async fn join_room(
        &self,
        room_id: &str,
        participant_id: &str,
        display_name: String,
    ) -> RoomResult<PresenceToken> {
        let mut guard = self.lock_room(room_id).await?;

        if guard.room.is_player(participant_id) {
            let renamed = rename_player(&mut guard, participant_id, &display_name);
            let token = self.reattach(&mut guard, participant_id);
            if renamed {
                guard.commit();
            }
            tracing::info!("{} rejoined room {}", participant_id, room_id);
            return Ok(token);
        }

        if guard.room.player_count() >= guard.room.settings.max_players as usize {
            return Err(RoomError::RoomFull);
        }
        if guard.room.status != RoomStatus::Lobby {
            return Err(RoomError::GameInProgress);
        }

        guard.room.players.insert(
            participant_id.to_string(),
            PlayerEntry {
                display_name: normalize_display_name(&display_name),
                total_votes: 0,
                joined_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        let token = self.register_presence(&mut guard, participant_id);
        guard.commit();

        tracing::info!(
            "{} joined room {} ({}/{})",
            participant_id,
            room_id,
            guard.room.player_count(),
            guard.room.settings.max_players
        );
        Ok(token)
    }

    /// Register a live connection for an existing member (e.g. the host right after creating)
    pub async fn attach(&self, room_id: &str, participant_id: &str) -> RoomResult<PresenceToken> {
        let mut guard = self.lock_room(room_id).await?;
        if !guard.room.is_player(participant_id) {
            return Err(RoomError::NotInRoom);
        }
        Ok(self.reattach(&mut guard, participant_id))
    }

    fn reattach(&self, guard: &mut RoomGuard, participant_id: &str) -> PresenceToken {
        let token = self.register_presence(guard, participant_id);
        if guard.room.is_host(participant_id) {
            self.resume_timer(guard);
        }
        token
    }
}

/// Returns whether the stored name changed; blank names keep the old one
fn rename_player(guard: &mut RoomGuard, participant_id: &str, display_name: &str) -> bool {
    if display_name.trim().is_empty() {
        return false;
    }
    let name = normalize_display_name(display_name);
    match guard.room.players.get_mut(participant_id) {
        Some(entry) if entry.display_name != name => {
            entry.display_name = name;
            true
        }
        _ => false,
    }
}
