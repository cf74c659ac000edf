use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// One row of the final ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Standing {
    /// Shared on ties (1, 1, 3, ...)
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub total_votes: u32,
}

impl Room {
    /// Players by descending total votes; ties keep join order
    pub fn standings(&self) -> Vec<Standing> {
        let mut players: Vec<_> = self.players.iter().collect();
        players.sort_by(|a, b| b.1.total_votes.cmp(&a.1.total_votes));

        let mut standings: Vec<Standing> = Vec::with_capacity(players.len());
        for (index, (participant_id, entry)) in players.into_iter().enumerate() {
            let rank = match standings.last() {
                Some(prev) if prev.total_votes == entry.total_votes => prev.rank,
                _ => index as u32 + 1,
            };
            standings.push(Standing {
                rank,
                participant_id: participant_id.clone(),
                display_name: entry.display_name.clone(),
                total_votes: entry.total_votes,
            });
        }
        standings
    }
}

impl AppState {
    /// Cast one vote. The submission count, the player total and the voter
    /// record change together in a single commit.
    pub async fn vote(&self, room_id: &str, voter: &str, target: &str) -> RoomResult<()> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.room.status != RoomStatus::Voting {
            return Err(RoomError::WrongPhase(guard.room.status));
        }
        if !guard.room.is_player(voter) {
            return Err(RoomError::NotInRoom);
        }
        if voter == target {
            return Err(RoomError::SelfVote);
        }
        if guard.room.current_round.voted.contains_key(voter) {
            return Err(RoomError::AlreadyVoted);
        }
        if !guard.room.current_round.submissions.contains_key(target)
            || !guard.room.is_player(target)
        {
            return Err(RoomError::UnknownTarget);
        }

        let room = &mut guard.room;
        if let Some(submission) = room.current_round.submissions.get_mut(target) {
            submission.votes_this_round += 1;
        }
        if let Some(player) = room.players.get_mut(target) {
            player.total_votes += 1;
        }
        room.current_round
            .voted
            .insert(voter.to_string(), target.to_string());
        guard.commit();

        tracing::info!("{} voted for {} in room {}", voter, target, room_id);
        Ok(())
    }

    pub async fn standings(&self, room_id: &str) -> RoomResult<Vec<Standing>> {
        Ok(self.get_room(room_id).await?.standings())
    }
}
