//! HTTP API endpoints.
//!
//! Read-only room views for spectators and tooling, plus the caption
//! service passthrough used by meme clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::caption::CaptionRequest;
use crate::error::ApiError;
use crate::protocol::RoomView;
use crate::state::{AppState, Standing};
use crate::types::{MemeTemplate, TemplateId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rooms/{room_id}", get(get_room))
        .route("/api/rooms/{room_id}/standings", get(get_standings))
        .route("/api/templates", get(list_templates))
        .route("/api/caption", post(caption))
}

/// GET /api/rooms/{room_id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ApiError> {
    let room = state.get_room(&room_id).await?;
    Ok(Json(RoomView::from(&room)))
}

/// GET /api/rooms/{room_id}/standings
///
/// Players by total votes, ties in join order.
pub async fn get_standings(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Standing>>, ApiError> {
    Ok(Json(state.standings(&room_id).await?))
}

fn captions_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "code": "CAPTIONS_UNAVAILABLE",
            "message": "Caption service is not configured",
        })),
    )
        .into_response()
}

/// GET /api/templates
pub async fn list_templates(State(state): State<AppState>) -> Response {
    let Some(captions) = state.captions.as_ref() else {
        return captions_unavailable();
    };

    match captions.list_templates().await {
        Ok(templates) => Json::<Vec<MemeTemplate>>(templates).into_response(),
        Err(e) => {
            tracing::warn!("Failed to list templates: {}", e);
            ApiError(e.into()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CaptionBody {
    pub template_id: TemplateId,
    #[serde(default)]
    pub boxes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// POST /api/caption
///
/// Renders caption boxes onto a template. Renderer failures are reported in
/// the body with `success: false`.
pub async fn caption(State(state): State<AppState>, Json(body): Json<CaptionBody>) -> Response {
    let Some(captions) = state.captions.as_ref() else {
        return captions_unavailable();
    };

    let request = CaptionRequest {
        template_id: body.template_id,
        boxes: body.boxes,
    };
    let response = match captions.render(&request).await {
        Ok(url) => CaptionResponse {
            success: true,
            url: Some(url),
            error_message: None,
        },
        Err(e) => {
            tracing::error!("Caption render for template {} failed: {}", request.template_id, e);
            CaptionResponse {
                success: false,
                url: None,
                error_message: Some(e.to_string()),
            }
        }
    };
    Json(response).into_response()
}
