mod imgflip;

use crate::config::{env_parse, env_string};
use crate::types::{MemeTemplate, TemplateId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use imgflip::ImgflipClient;

/// Result type for caption operations
pub type CaptionResult<T> = Result<T, CaptionError>;

/// Errors that can occur while talking to the caption service
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

impl From<CaptionError> for crate::error::RoomError {
    fn from(err: CaptionError) -> Self {
        crate::error::RoomError::RenderFailed(err.to_string())
    }
}

/// Request to render captions onto a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    pub template_id: TemplateId,
    /// Caption texts in box order
    pub boxes: Vec<String>,
}

/// Renders caption boxes onto a template image and returns its URL
#[async_trait]
pub trait CaptionRenderer: Send + Sync {
    async fn render(&self, request: &CaptionRequest) -> CaptionResult<String>;

    /// Get the name of this renderer
    fn name(&self) -> &str;
}

/// Lists the meme templates a round can draw from
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn list_templates(&self) -> CaptionResult<Vec<MemeTemplate>>;
}

/// Renderer and catalog bundled with the retry policy
pub struct CaptionManager {
    renderer: Arc<dyn CaptionRenderer>,
    catalog: Arc<dyn TemplateCatalog>,
    retries: u32,
}

impl CaptionManager {
    pub fn new(renderer: Arc<dyn CaptionRenderer>, catalog: Arc<dyn TemplateCatalog>) -> Self {
        Self {
            renderer,
            catalog,
            retries: 0,
        }
    }

    /// Number of extra attempts after a failed render
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Render one submission, retrying up to the configured bound
    pub async fn render(&self, request: &CaptionRequest) -> CaptionResult<String> {
        let mut attempt = 0;
        loop {
            match self.renderer.render(request).await {
                Ok(url) => return Ok(url),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Renderer {} failed for template {} (attempt {}): {}",
                        self.renderer.name(),
                        request.template_id,
                        attempt,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn list_templates(&self) -> CaptionResult<Vec<MemeTemplate>> {
        self.catalog.list_templates().await
    }
}

/// Configuration for the caption service
#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            base_url: "https://api.imgflip.com".to_string(),
            timeout: Duration::from_secs(10),
            retries: 0,
        }
    }
}

impl CaptionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            username: env_string("IMGFLIP_USERNAME"),
            password: env_string("IMGFLIP_PASSWORD"),
            base_url: env_string("IMGFLIP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: env_parse::<u64>("CAPTION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retries: env_parse("CAPTION_RETRIES").unwrap_or(defaults.retries),
        }
    }

    /// Build a CaptionManager backed by imgflip
    pub fn build_manager(&self) -> CaptionResult<CaptionManager> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(CaptionError::ConfigError(
                "Set IMGFLIP_USERNAME and IMGFLIP_PASSWORD to enable meme rendering".to_string(),
            ));
        };

        let client = Arc::new(ImgflipClient::new(
            self.base_url.clone(),
            username.clone(),
            password.clone(),
            self.timeout,
        )?);

        Ok(CaptionManager::new(client.clone(), client).with_retries(self.retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyRenderer {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CaptionRenderer for FlakyRenderer {
        async fn render(&self, request: &CaptionRequest) -> CaptionResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(CaptionError::ApiError("boom".to_string()));
            }
            Ok(format!("https://img.test/{}.jpg", request.template_id))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct EmptyCatalog;

    #[async_trait]
    impl TemplateCatalog for EmptyCatalog {
        async fn list_templates(&self) -> CaptionResult<Vec<MemeTemplate>> {
            Ok(Vec::new())
        }
    }

    fn request() -> CaptionRequest {
        CaptionRequest {
            template_id: "181913649".to_string(),
            boxes: vec!["top".to_string(), "bottom".to_string()],
        }
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let renderer = Arc::new(FlakyRenderer {
            failures_left: AtomicU32::new(1),
            calls: AtomicU32::new(0),
        });
        let manager = CaptionManager::new(renderer.clone(), Arc::new(EmptyCatalog));

        assert!(manager.render(&request()).await.is_err());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_retry_recovers() {
        let renderer = Arc::new(FlakyRenderer {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        });
        let manager =
            CaptionManager::new(renderer.clone(), Arc::new(EmptyCatalog)).with_retries(2);

        let url = manager.render(&request()).await.unwrap();
        assert_eq!(url, "https://img.test/181913649.jpg");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_caption_error_becomes_render_failed() {
        let err: crate::error::RoomError = CaptionError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(err.code(), "RENDER_FAILED");
    }

    #[test]
    #[serial]
    fn test_build_manager_requires_credentials() {
        std::env::remove_var("IMGFLIP_USERNAME");
        std::env::remove_var("IMGFLIP_PASSWORD");
        let config = CaptionConfig::from_env();
        assert!(matches!(
            config.build_manager(),
            Err(CaptionError::ConfigError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("IMGFLIP_USERNAME", "someone");
        std::env::set_var("IMGFLIP_PASSWORD", "hunter2");
        std::env::set_var("IMGFLIP_BASE_URL", "http://localhost:9999/");
        std::env::set_var("CAPTION_RETRIES", "2");

        let config = CaptionConfig::from_env();
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.retries, 2);
        assert!(config.build_manager().is_ok());

        for key in [
            "IMGFLIP_USERNAME",
            "IMGFLIP_PASSWORD",
            "IMGFLIP_BASE_URL",
            "CAPTION_RETRIES",
        ] {
            std::env::remove_var(key);
        }
    }
}
