use crate::error::RoomError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type ParticipantId = String;
pub type TemplateId = String;

/// Accepted ranges for room settings
pub const MAX_PLAYERS_RANGE: RangeInclusive<u32> = 3..=10;
pub const MAX_ROUNDS_RANGE: RangeInclusive<u32> = 1..=10;
pub const PHASE_SECONDS_RANGE: RangeInclusive<u32> = 10..=120;

/// Minimum number of players needed to start a game
pub const MIN_PLAYERS_TO_START: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Submission,
    Voting,
    Results,
}

impl RoomStatus {
    /// Phases that are driven by a countdown
    pub fn is_timed(self) -> bool {
        matches!(self, RoomStatus::Submission | RoomStatus::Voting)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GameType {
    Meme,
    Quote,
    #[serde(rename = "Hot-Take")]
    HotTake,
    Joke,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSettings {
    pub game_type: GameType,
    pub max_players: u32,
    pub max_rounds: u32,
    pub submission_seconds: u32,
    pub voting_seconds: u32,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            game_type: GameType::Quote,
            max_players: 8,
            max_rounds: 2,
            submission_seconds: 30,
            voting_seconds: 30,
        }
    }
}

impl RoomSettings {
    /// Check every field against its declared range
    pub fn validate(&self) -> Result<(), RoomError> {
        let checks: [(&str, u32, &RangeInclusive<u32>); 4] = [
            ("max_players", self.max_players, &MAX_PLAYERS_RANGE),
            ("max_rounds", self.max_rounds, &MAX_ROUNDS_RANGE),
            ("submission_seconds", self.submission_seconds, &PHASE_SECONDS_RANGE),
            ("voting_seconds", self.voting_seconds, &PHASE_SECONDS_RANGE),
        ];

        for (field, value, range) in checks {
            if !range.contains(&value) {
                return Err(RoomError::InvalidSettings(format!(
                    "{} must be between {} and {} (got {})",
                    field,
                    range.start(),
                    range.end(),
                    value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntry {
    pub display_name: String,
    pub total_votes: u32,
    pub joined_at: String,
}

/// What a participant hands in for a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionPayload {
    /// Quote, Hot-Take and Joke rounds
    Text { text: String },
    /// Meme rounds: caption boxes for a shared template, in display order
    Meme {
        template_id: TemplateId,
        boxes: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    #[serde(flatten)]
    pub payload: SubmissionPayload,
    /// Set once the caption renderer has produced an image (meme rounds only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_url: Option<String>,
    pub votes_this_round: u32,
    /// ISO timestamp, only used for ordering listings
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemeTemplate {
    pub id: TemplateId,
    pub url: String,
    pub box_count: usize,
}

/// Round-scoped data, cleared whenever a submission phase begins
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentRound {
    /// Ordered by submission time
    pub submissions: IndexMap<ParticipantId, Submission>,
    /// voter -> participant whose submission received the vote
    pub voted: IndexMap<ParticipantId, ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<MemeTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub host: ParticipantId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub round_number: u32,
    pub time_left: u32,
    /// Insertion order is join order
    pub players: IndexMap<ParticipantId, PlayerEntry>,
    pub current_round: CurrentRound,
    pub created_at: String,
    /// Bumped on every committed mutation
    pub version: u64,
}

impl Room {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_host(&self, participant_id: &str) -> bool {
        self.host == participant_id
    }

    pub fn is_player(&self, participant_id: &str) -> bool {
        self.players.contains_key(participant_id)
    }
}
