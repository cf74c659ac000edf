use super::*;
use serde::Deserialize;

/// Imgflip-backed renderer and template catalog
pub struct ImgflipClient {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ImgflipClient {
    pub fn new(
        base_url: String,
        username: String,
        password: String,
        timeout: Duration,
    ) -> CaptionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptionError::ConfigError(e.to_string()))?;

        Ok(Self {
            base_url,
            username,
            password,
            timeout,
            client,
        })
    }

    /// Form fields for caption_image; boxes are indexed in display order
    fn caption_form(&self, request: &CaptionRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("template_id".to_string(), request.template_id.clone()),
            ("username".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
        ];
        for (index, text) in request.boxes.iter().enumerate() {
            params.push((format!("boxes[{}][text]", index), text.clone()));
        }
        params
    }

    fn map_send_error(&self, e: reqwest::Error) -> CaptionError {
        if e.is_timeout() {
            CaptionError::Timeout(self.timeout)
        } else {
            CaptionError::ApiError(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImgflipResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error_message: Option<String>,
}

impl<T> ImgflipResponse<T> {
    fn into_data(self) -> CaptionResult<T> {
        if !self.success {
            return Err(CaptionError::ApiError(
                self.error_message
                    .unwrap_or_else(|| "imgflip reported failure".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| CaptionError::ParseError("Missing data in response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CaptionData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MemesData {
    memes: Vec<ImgflipMeme>,
}

#[derive(Debug, Deserialize)]
struct ImgflipMeme {
    id: String,
    url: String,
    box_count: usize,
}

#[async_trait]
impl CaptionRenderer for ImgflipClient {
    async fn render(&self, request: &CaptionRequest) -> CaptionResult<String> {
        let url = format!("{}/caption_image", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&self.caption_form(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body: ImgflipResponse<CaptionData> = response
            .json()
            .await
            .map_err(|e| CaptionError::ParseError(e.to_string()))?;

        Ok(body.into_data()?.url)
    }

    fn name(&self) -> &str {
        "imgflip"
    }
}

#[async_trait]
impl TemplateCatalog for ImgflipClient {
    async fn list_templates(&self) -> CaptionResult<Vec<MemeTemplate>> {
        let url = format!("{}/get_memes", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body: ImgflipResponse<MemesData> = response
            .json()
            .await
            .map_err(|e| CaptionError::ParseError(e.to_string()))?;

        Ok(body
            .into_data()?
            .memes
            .into_iter()
            .map(|m| MemeTemplate {
                id: m.id,
                url: m.url,
                box_count: m.box_count,
            })
            .collect())
    }
}
