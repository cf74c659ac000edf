use crate::types::ParticipantId;
use ulid::Ulid;

/// Resolve the participant id for a connection.
///
/// A well-formed ULID supplied by the client is kept so reconnects keep
/// their identity; anything else gets a fresh one.
pub fn authenticate(session: Option<&str>) -> ParticipantId {
    session
        .and_then(|raw| Ulid::from_string(raw.trim()).ok())
        .unwrap_or_else(Ulid::new)
        .to_string()
}
