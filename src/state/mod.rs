mod player;
mod render;
mod room;
mod round;
mod store;
mod template;
mod timer;
mod vote;

pub use store::{changed_topics, PresenceToken, RoomTopic};
pub use vote::Standing;

use crate::caption::CaptionManager;
use crate::config::ServerConfig;
use crate::types::RoomId;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use store::RoomSlot;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    rooms: Arc<RwLock<HashMap<RoomId, Arc<RoomSlot>>>>,
    pub config: Arc<ServerConfig>,
    /// Caption renderer and template catalog (None = meme images unavailable)
    pub captions: Option<Arc<CaptionManager>>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            captions: None,
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_captions(mut self, captions: CaptionManager) -> Self {
        self.captions = Some(Arc::new(captions));
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
