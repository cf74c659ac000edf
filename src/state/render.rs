use super::store::RoomGuard;
use super::AppState;
use crate::caption::CaptionRequest;
use crate::error::RoomResult;
use crate::types::*;

struct RenderJob {
    participant_id: ParticipantId,
    payload: SubmissionPayload,
    request: CaptionRequest,
}

impl AppState {
    /// Kick off one best-effort render per meme submission; voting never waits on them
    pub(crate) fn spawn_renders(&self, guard: &RoomGuard) {
        let Some(captions) = self.captions.clone() else {
            return;
        };
        if guard.room.settings.game_type != GameType::Meme {
            return;
        }

        let jobs: Vec<RenderJob> = guard
            .room
            .current_round
            .submissions
            .iter()
            .filter(|(_, s)| s.rendered_url.is_none())
            .filter_map(|(pid, s)| match &s.payload {
                SubmissionPayload::Meme { template_id, boxes } => Some(RenderJob {
                    participant_id: pid.clone(),
                    payload: s.payload.clone(),
                    request: CaptionRequest {
                        template_id: template_id.clone(),
                        boxes: boxes.clone(),
                    },
                }),
                SubmissionPayload::Text { .. } => None,
            })
            .collect();
        if jobs.is_empty() {
            return;
        }

        let state = self.clone();
        let room_id = guard.room.id.clone();
        let round = guard.room.round_number;
        tracing::debug!("Rendering {} memes for room {}", jobs.len(), room_id);

        tokio::spawn(async move {
            let renders = jobs.into_iter().map(|job| {
                let captions = captions.clone();
                let state = state.clone();
                let room_id = room_id.clone();
                async move {
                    match captions.render(&job.request).await {
                        Ok(url) => {
                            if let Err(e) = state.apply_render(&room_id, round, &job, url).await {
                                tracing::debug!("Dropped render for room {}: {}", room_id, e);
                            }
                        }
                        Err(e) => {
                            // Submission keeps its placeholder
                            tracing::error!(
                                "Failed to render meme for {} in room {}: {}",
                                job.participant_id,
                                room_id,
                                e
                            );
                        }
                    }
                }
            });
            futures::future::join_all(renders).await;
        });
    }

    /// Store a finished render if its submission is still the one that was rendered
    async fn apply_render(
        &self,
        room_id: &str,
        round: u32,
        job: &RenderJob,
        url: String,
    ) -> RoomResult<bool> {
        let mut guard = self.lock_room(room_id).await?;
        if guard.room.status != RoomStatus::Voting || guard.room.round_number != round {
            return Ok(false);
        }

        let Some(submission) = guard
            .room
            .current_round
            .submissions
            .get_mut(&job.participant_id)
        else {
            return Ok(false);
        };
        if submission.payload != job.payload || submission.rendered_url.is_some() {
            return Ok(false);
        }

        submission.rendered_url = Some(url);
        guard.commit();
        Ok(true)
    }
}
