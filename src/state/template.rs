use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::types::*;
use rand::seq::IndexedRandom;

impl AppState {
    /// Make sure the current meme round has a template.
    ///
    /// The first caller fetches the catalog and publishes a random pick; the
    /// room keeps the first published template for the whole round. Returns
    /// `None` while another fetch for this round is still in flight.
    pub async fn request_template(&self, room_id: &str) -> RoomResult<Option<MemeTemplate>> {
        let round = {
            let mut guard = self.lock_room(room_id).await?;
            if guard.room.settings.game_type != GameType::Meme {
                return Err(RoomError::InvalidSubmission(
                    "templates only exist in meme rooms".to_string(),
                ));
            }
            if guard.room.status != RoomStatus::Submission {
                return Err(RoomError::WrongPhase(guard.room.status));
            }
            if let Some(template) = &guard.room.current_round.template {
                return Ok(Some(template.clone()));
            }
            if guard.template_fetch_round == Some(guard.room.round_number) {
                return Ok(None);
            }
            guard.template_fetch_round = Some(guard.room.round_number);
            guard.room.round_number
        };

        // Catalog is fetched without holding the room
        let fetched = match &self.captions {
            Some(captions) => captions.list_templates().await.map_err(RoomError::from),
            None => Err(RoomError::RenderFailed(
                "caption service not configured".to_string(),
            )),
        };

        let mut guard = match self.lock_room(room_id).await {
            Ok(guard) => guard,
            Err(e) => {
                self.release_template_fetch(room_id, round).await;
                return Err(e);
            }
        };
        let templates = match fetched {
            Ok(templates) => templates,
            Err(e) => {
                if guard.template_fetch_round == Some(round) {
                    guard.template_fetch_round = None;
                }
                return Err(e);
            }
        };

        if guard.room.status != RoomStatus::Submission || guard.room.round_number != round {
            return Ok(None);
        }
        if let Some(existing) = &guard.room.current_round.template {
            return Ok(Some(existing.clone()));
        }

        let Some(chosen) = templates.choose(&mut rand::rng()).cloned() else {
            guard.template_fetch_round = None;
            return Err(RoomError::RenderFailed(
                "template catalog is empty".to_string(),
            ));
        };
        guard.room.current_round.template = Some(chosen.clone());
        guard.commit();

        tracing::info!(
            "Room {} round {} uses template {}",
            room_id,
            round,
            chosen.id
        );
        Ok(Some(chosen))
    }

    /// Clear the in-flight marker so the next request fetches again
    async fn release_template_fetch(&self, room_id: &str, round: u32) {
        let Ok(mut guard) = self.lock_room_untimed(room_id).await else {
            return;
        };
        if guard.template_fetch_round == Some(round) {
            guard.template_fetch_round = None;
        }
    }

    pub(crate) fn spawn_template_fetch(&self, room_id: RoomId) {
        if self.captions.is_none() {
            tracing::warn!(
                "Room {} plays memes but no caption service is configured",
                room_id
            );
            return;
        }

        let state = self.clone();
        tokio::spawn(async move {
            if let Err(e) = state.request_template(&room_id).await {
                tracing::warn!("Template fetch for room {} failed: {}", room_id, e);
            }
        });
    }
}
