//! WebSocket message dispatch
//!
//! Every intent runs against the connection's explicit [`Session`]. Rejections
//! are answered to the originating connection only; state changes reach
//! everyone through the room subscription.

use crate::error::{RoomError, RoomResult};
use crate::protocol::{ClientMessage, RoomView, ServerMessage};
use crate::session::Session;
use crate::state::{AppState, PresenceToken};
use crate::types::{RoomId, RoomSettings};

/// Resolve the session's room or answer with NOT_IN_ROOM
macro_rules! require_room {
    ($session:expr) => {
        match $session.room() {
            Ok(room_id) => room_id.to_string(),
            Err(e) => return Some(ServerMessage::from(&e)),
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Session,
    state: &AppState,
) -> Option<ServerMessage> {
    let intent = msg.intent();
    let participant_id = session.participant_id.clone();

    let result = match msg {
        ClientMessage::CreateRoom {
            display_name,
            settings,
        } => handle_create_room(state, session, display_name, settings).await,

        ClientMessage::JoinRoom {
            room_id,
            display_name,
        } => handle_join_room(state, session, room_id, display_name).await,

        ClientMessage::Subscribe { topics } => {
            session.topics = topics.into_iter().collect();
            Ok(ServerMessage::ack(intent))
        }

        ClientMessage::StartGame => {
            let room_id = require_room!(session);
            state.start_game(&room_id, &participant_id).await.map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::Advance => {
            let room_id = require_room!(session);
            state
                .host_advance(&room_id, &participant_id)
                .await
                .map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::Restart => {
            let room_id = require_room!(session);
            state.restart(&room_id, &participant_id).await.map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::Submit { payload } => {
            let room_id = require_room!(session);
            state
                .submit(&room_id, &participant_id, payload)
                .await
                .map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::Vote { target } => {
            let room_id = require_room!(session);
            state
                .vote(&room_id, &participant_id, &target)
                .await
                .map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::Quit => {
            let room_id = require_room!(session);
            let result = state.quit(&room_id, &participant_id).await;
            // A transient failure left the room untouched, so stay in it
            if !matches!(&result, Err(e) if e.is_transient()) {
                session.leave();
            }
            result.map(|()| ServerMessage::ack(intent))
        }

        ClientMessage::RequestTemplate => {
            let room_id = require_room!(session);
            state
                .request_template(&room_id)
                .await
                .map(|_| ServerMessage::ack(intent))
        }
    };

    match result {
        Ok(reply) => Some(reply),
        Err(e) => {
            if e.is_transient() {
                tracing::warn!("{} from {} failed: {}", intent, participant_id, e);
            } else {
                tracing::debug!("{} from {} rejected: {}", intent, participant_id, e);
            }
            Some(ServerMessage::from(&e))
        }
    }
}

async fn handle_create_room(
    state: &AppState,
    session: &mut Session,
    display_name: String,
    settings: RoomSettings,
) -> RoomResult<ServerMessage> {
    let room = state
        .create_room(&session.participant_id, display_name, settings)
        .await?;
    let presence = state.attach(&room.id, &session.participant_id).await?;
    enter_room(state, session, presence).await
}

async fn handle_join_room(
    state: &AppState,
    session: &mut Session,
    room_id: RoomId,
    display_name: String,
) -> RoomResult<ServerMessage> {
    let presence = state
        .join_room(room_id.trim(), &session.participant_id, display_name)
        .await?;
    enter_room(state, session, presence).await
}

/// Point the session at its new room, leaving any other room it was in
async fn enter_room(
    state: &AppState,
    session: &mut Session,
    presence: PresenceToken,
) -> RoomResult<ServerMessage> {
    let updates = state.subscribe(&presence.room_id).await?;
    let previous = session
        .room_id
        .clone()
        .filter(|room_id| *room_id != presence.room_id);

    let snapshot = session
        .enter(presence, updates)
        .ok_or(RoomError::RoomNotFound)?;

    if let Some(old_room) = previous {
        if let Err(e) = state.quit(&old_room, &session.participant_id).await {
            tracing::debug!(
                "{} could not leave previous room {}: {}",
                session.participant_id,
                old_room,
                e
            );
        }
    }

    Ok(ServerMessage::RoomJoined {
        room: RoomView::from(&snapshot),
    })
}
