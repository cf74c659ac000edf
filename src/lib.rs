// Public API for integration tests and potential library usage

pub mod api;
pub mod background;
pub mod caption;
pub mod config;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Full HTTP + WebSocket application
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
