use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agreeable::{background, caption::CaptionConfig, config::ServerConfig, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agreeable=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting agreeable...");

    let config = ServerConfig::from_env();
    let addr = config.bind_addr;

    // Meme rendering is optional; other game types work without it
    let mut state = AppState::with_config(config);
    match CaptionConfig::from_env().build_manager() {
        Ok(manager) => {
            tracing::info!("Caption service initialized");
            state = state.with_captions(manager);
        }
        Err(e) => {
            tracing::warn!("{}. Meme images will not be rendered.", e);
        }
    }

    background::spawn_idle_reaper(state.clone());

    let app = agreeable::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
