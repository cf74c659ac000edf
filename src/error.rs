use crate::types::RoomStatus;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Result type for room operations
pub type RoomResult<T> = Result<T, RoomError>;

/// Everything an intent against a room can be rejected with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Game already in progress")]
    GameInProgress,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Not enough players to start")]
    NotEnoughPlayers,

    #[error("Too many players to start")]
    TooManyPlayers,

    #[error("Not allowed during the {0:?} phase")]
    WrongPhase(RoomStatus),

    #[error("Already voted this round")]
    AlreadyVoted,

    #[error("Cannot vote for your own submission")]
    SelfVote,

    #[error("Caption rendering failed: {0}")]
    RenderFailed(String),

    #[error("Room store unavailable, try again")]
    StoreUnavailable,

    #[error("Not a player in this room")]
    NotInRoom,

    #[error("Vote target has no submission this round")]
    UnknownTarget,

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Room code already in use")]
    RoomCodeTaken,
}

impl RoomError {
    /// Stable wire code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::InvalidSettings(_) => "INVALID_SETTINGS",
            RoomError::RoomNotFound => "ROOM_NOT_FOUND",
            RoomError::RoomFull => "ROOM_FULL",
            RoomError::GameInProgress => "GAME_IN_PROGRESS",
            RoomError::NotHost => "NOT_HOST",
            RoomError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            RoomError::TooManyPlayers => "TOO_MANY_PLAYERS",
            RoomError::WrongPhase(_) => "WRONG_PHASE",
            RoomError::AlreadyVoted => "ALREADY_VOTED",
            RoomError::SelfVote => "SELF_VOTE",
            RoomError::RenderFailed(_) => "RENDER_FAILED",
            RoomError::StoreUnavailable => "STORE_UNAVAILABLE",
            RoomError::NotInRoom => "NOT_IN_ROOM",
            RoomError::UnknownTarget => "UNKNOWN_TARGET",
            RoomError::InvalidSubmission(_) => "INVALID_SUBMISSION",
            RoomError::RoomCodeTaken => "ROOM_CODE_TAKEN",
        }
    }

    /// Transient errors leave state unchanged and may be retried as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, RoomError::StoreUnavailable)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RoomError::InvalidSettings(_)
            | RoomError::SelfVote
            | RoomError::UnknownTarget
            | RoomError::InvalidSubmission(_) => StatusCode::BAD_REQUEST,
            RoomError::RoomNotFound => StatusCode::NOT_FOUND,
            RoomError::NotHost | RoomError::NotInRoom => StatusCode::FORBIDDEN,
            RoomError::RoomFull
            | RoomError::GameInProgress
            | RoomError::NotEnoughPlayers
            | RoomError::TooManyPlayers
            | RoomError::WrongPhase(_)
            | RoomError::AlreadyVoted
            | RoomError::RoomCodeTaken => StatusCode::CONFLICT,
            RoomError::RenderFailed(_) => StatusCode::BAD_GATEWAY,
            RoomError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// HTTP wrapper around [`RoomError`]
#[derive(Debug)]
pub struct ApiError(pub RoomError);

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        });
        (self.0.status_code(), body).into_response()
    }
}
