use crate::state::AppState;
use std::time::Duration;

/// Spawn a background task that deletes rooms nobody has touched for the idle TTL
pub fn spawn_idle_reaper(state: AppState) {
    let period = (state.config.room_idle_ttl / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;

            let reaped = state.reap_idle_rooms().await;
            if reaped > 0 {
                tracing::info!(
                    "Reaped {} idle rooms ({} remaining)",
                    reaped,
                    state.room_count().await
                );
            }
        }
    });
}
