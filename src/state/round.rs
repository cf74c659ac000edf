use super::store::RoomGuard;
use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::*;

impl AppState {
    /// Host starts the first round
    pub async fn start_game(&self, room_id: &str, caller: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if !guard.room.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if guard.room.status != RoomStatus::Lobby {
            return Err(RoomError::WrongPhase(guard.room.status));
        }

        let count = guard.room.player_count();
        if count < MIN_PLAYERS_TO_START {
            return Err(RoomError::NotEnoughPlayers);
        }
        if count > guard.room.settings.max_players as usize {
            return Err(RoomError::TooManyPlayers);
        }

        tracing::info!("Starting game in room {} with {} players", room_id, count);
        self.enter_submission(&mut guard, 1);
        Ok(())
    }

    /// Record a participant's entry for the current round (last write wins)
    pub async fn submit(
        &self,
        room_id: &str,
        participant_id: &str,
        payload: SubmissionPayload,
    ) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.room.status != RoomStatus::Submission {
            return Err(RoomError::WrongPhase(guard.room.status));
        }
        if !guard.room.is_player(participant_id) {
            return Err(RoomError::NotInRoom);
        }
        validate_payload(&guard.room, &payload)?;

        // Listings follow submission time, so a resubmission moves to the end
        let submissions = &mut guard.room.current_round.submissions;
        let replaced = submissions.shift_remove(participant_id);
        submissions.insert(
            participant_id.to_string(),
            Submission {
                payload,
                rendered_url: None,
                votes_this_round: 0,
                submitted_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        guard.commit();

        tracing::info!(
            "{} {} in room {} round {}",
            participant_id,
            if replaced.is_some() { "resubmitted" } else { "submitted" },
            room_id,
            guard.room.round_number
        );
        Ok(())
    }

    /// Close submissions and open voting
    pub async fn advance_to_voting(&self, room_id: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.room.status != RoomStatus::Submission {
            return Err(RoomError::WrongPhase(guard.room.status));
        }
        self.enter_voting(&mut guard);
        Ok(())
    }

    /// Close voting; either start the next round or show results
    pub async fn advance_round(&self, room_id: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.room.status != RoomStatus::Voting {
            return Err(RoomError::WrongPhase(guard.room.status));
        }
        self.finish_round(&mut guard);
        Ok(())
    }

    /// Host skips the rest of the current countdown
    pub async fn host_advance(&self, room_id: &str, caller: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if !guard.room.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        match guard.room.status {
            RoomStatus::Submission => self.enter_voting(&mut guard),
            RoomStatus::Voting => self.finish_round(&mut guard),
            status => return Err(RoomError::WrongPhase(status)),
        }
        Ok(())
    }

    /// Back to the lobby with the same roster and zeroed scores
    pub async fn restart(&self, room_id: &str, caller: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if !guard.room.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if guard.room.status != RoomStatus::Results {
            return Err(RoomError::WrongPhase(guard.room.status));
        }

        Self::disarm_timer(&mut guard);
        guard.template_fetch_round = None;
        let room = &mut guard.room;
        room.status = RoomStatus::Lobby;
        room.round_number = 1;
        room.time_left = room.settings.submission_seconds;
        room.current_round = CurrentRound::default();
        for player in room.players.values_mut() {
            player.total_votes = 0;
        }
        guard.commit();

        tracing::info!("Room {} restarted", room_id);
        Ok(())
    }

    pub(crate) fn enter_submission(&self, guard: &mut RoomGuard, round_number: u32) {
        guard.template_fetch_round = None;
        let room = &mut guard.room;
        room.status = RoomStatus::Submission;
        room.round_number = round_number;
        room.time_left = room.settings.submission_seconds;
        room.current_round = CurrentRound::default();
        guard.commit();
        self.arm_timer(guard);

        tracing::info!(
            "Room {} entered submission for round {}",
            guard.room.id,
            round_number
        );
        if guard.room.settings.game_type == GameType::Meme {
            self.spawn_template_fetch(guard.room.id.clone());
        }
    }

    pub(crate) fn enter_voting(&self, guard: &mut RoomGuard) {
        let room = &mut guard.room;
        room.status = RoomStatus::Voting;
        room.time_left = room.settings.voting_seconds;
        room.current_round.voted.clear();
        guard.commit();
        self.arm_timer(guard);

        tracing::info!(
            "Room {} entered voting with {} submissions",
            guard.room.id,
            guard.room.current_round.submissions.len()
        );
        self.spawn_renders(guard);
    }

    pub(crate) fn finish_round(&self, guard: &mut RoomGuard) {
        if guard.room.round_number < guard.room.settings.max_rounds {
            let next = guard.room.round_number + 1;
            self.enter_submission(guard, next);
            return;
        }

        Self::disarm_timer(guard);
        let room = &mut guard.room;
        room.status = RoomStatus::Results;
        room.time_left = 0;
        room.current_round = CurrentRound::default();
        guard.commit();
        tracing::info!("Room {} finished after {} rounds", guard.room.id, guard.room.round_number);
    }
}

/// Payload must match the room's game type (and the published template, if any)
fn validate_payload(room: &Room, payload: &SubmissionPayload) -> RoomResult<()> {
    let is_meme = room.settings.game_type == GameType::Meme;
    match payload {
        SubmissionPayload::Text { .. } if is_meme => Err(RoomError::InvalidSubmission(
            "meme rounds need a template and caption boxes".to_string(),
        )),
        SubmissionPayload::Text { text } if text.trim().is_empty() => Err(
            RoomError::InvalidSubmission("text must not be empty".to_string()),
        ),
        SubmissionPayload::Text { .. } => Ok(()),
        SubmissionPayload::Meme { .. } if !is_meme => Err(RoomError::InvalidSubmission(
            "only meme rounds take caption boxes".to_string(),
        )),
        SubmissionPayload::Meme { template_id, boxes } => {
            if boxes.iter().all(|b| b.trim().is_empty()) {
                return Err(RoomError::InvalidSubmission(
                    "at least one caption box must be filled".to_string(),
                ));
            }
            match &room.current_round.template {
                Some(template) if template.id != *template_id => Err(
                    RoomError::InvalidSubmission(format!(
                        "this round uses template {}",
                        template.id
                    )),
                ),
                Some(template) if template.box_count != boxes.len() => Err(
                    RoomError::InvalidSubmission(format!(
                        "template {} takes {} boxes",
                        template.id, template.box_count
                    )),
                ),
                _ => Ok(()),
            }
        }
    }
}
