use crate::error::RoomError;
use crate::state::{changed_topics, RoomTopic};
use crate::types::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        display_name: String,
        #[serde(default)]
        settings: RoomSettings,
    },
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        display_name: String,
    },
    /// Replace the set of room topics pushed to this connection
    Subscribe {
        topics: Vec<RoomTopic>,
    },
    // Host-only messages
    StartGame,
    Advance,
    Restart,
    Submit {
        payload: SubmissionPayload,
    },
    Vote {
        target: ParticipantId,
    },
    Quit,
    /// Ask for the current meme round's template to be published
    RequestTemplate,
}

impl ClientMessage {
    /// Wire name of the intent, echoed back in acks
    pub fn intent(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom { .. } => "create_room",
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::StartGame => "start_game",
            ClientMessage::Advance => "advance",
            ClientMessage::Restart => "restart",
            ClientMessage::Submit { .. } => "submit",
            ClientMessage::Vote { .. } => "vote",
            ClientMessage::Quit => "quit",
            ClientMessage::RequestTemplate => "request_template",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        participant_id: ParticipantId,
        server_now: String,
    },
    Ack {
        intent: String,
    },
    RoomJoined {
        room: RoomView,
    },
    /// Changed sub-paths of the observed room
    RoomPatch(RoomPatch),
    RoomDeleted {
        room_id: RoomId,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn ack(intent: &str) -> Self {
        ServerMessage::Ack {
            intent: intent.to_string(),
        }
    }
}

impl From<&RoomError> for ServerMessage {
    fn from(err: &RoomError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

/// Public shape of a room's current round; who voted for whom stays server-side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentRoundView {
    pub submissions: IndexMap<ParticipantId, Submission>,
    pub voted: Vec<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<MemeTemplate>,
}

impl From<&CurrentRound> for CurrentRoundView {
    fn from(round: &CurrentRound) -> Self {
        Self {
            submissions: round.submissions.clone(),
            voted: round.voted.keys().cloned().collect(),
            template: round.template.clone(),
        }
    }
}

/// Public shape of a room document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomView {
    pub id: RoomId,
    pub host: ParticipantId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub round_number: u32,
    pub time_left: u32,
    pub players: IndexMap<ParticipantId, PlayerEntry>,
    pub current_round: CurrentRoundView,
    pub created_at: String,
    pub version: u64,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            host: room.host.clone(),
            status: room.status,
            settings: room.settings.clone(),
            round_number: room.round_number,
            time_left: room.time_left,
            players: room.players.clone(),
            current_round: CurrentRoundView::from(&room.current_round),
            created_at: room.created_at.clone(),
            version: room.version,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomPatch {
    pub room_id: RoomId,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<RoomSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<IndexMap<ParticipantId, PlayerEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<CurrentRoundView>,
}

impl RoomPatch {
    /// Patch carrying the subscribed topics that differ between two snapshots.
    /// `None` when nothing the observer cares about changed.
    pub fn between(previous: Option<&Room>, next: &Room, topics: &HashSet<RoomTopic>) -> Option<Self> {
        let mut patch = RoomPatch {
            room_id: next.id.clone(),
            version: next.version,
            ..Default::default()
        };
        let mut any = false;

        for topic in changed_topics(previous, next) {
            if !topics.contains(&topic) {
                continue;
            }
            any = true;
            match topic {
                RoomTopic::Settings => patch.settings = Some(next.settings.clone()),
                RoomTopic::Host => patch.host = Some(next.host.clone()),
                RoomTopic::Players => patch.players = Some(next.players.clone()),
                RoomTopic::TimeLeft => patch.time_left = Some(next.time_left),
                RoomTopic::Status => {
                    patch.status = Some(next.status);
                    patch.round_number = Some(next.round_number);
                }
                RoomTopic::CurrentRound => {
                    patch.current_round = Some(CurrentRoundView::from(&next.current_round))
                }
            }
        }

        any.then_some(patch)
    }
}
