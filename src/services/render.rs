//! Video renderers.
//!
//! `TemplateRenderer` drives a hosted template service and is used by the
//! interactive flow. The queue uses `DiffusionRenderer` wrapped in a
//! `FallbackRenderer` so it degrades to `PlaceholderRenderer` instead of failing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::VideoQuality;
use crate::storage::{MediaStorage, StorageError};

const DIFFUSION_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLLS: u32 = 150;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No product images found")]
    MissingImage,
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("No Hugging Face token configured")]
    MissingToken,
    #[error("Rate limited by Hugging Face. Please try again in a few moments.")]
    RateLimited,
    #[error("Invalid Hugging Face API token")]
    InvalidToken,
    #[error("Video generation failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Video generation failed: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("Render failed: {0}")]
    Failed(String),
    #[error("Render did not finish in time")]
    TimedOut,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything a renderer might need. Each implementation reads the fields it uses.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Storage key prefix for renderers that upload their output
    pub key_prefix: String,
    pub image: Option<String>,
    pub hook: String,
    pub cta: String,
    pub script: String,
    pub prompt: String,
    pub duration_secs: i32,
    pub quality: VideoQuality,
    pub hf_token: Option<String>,
}

#[async_trait]
pub trait VideoRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render and return the public URL of the finished video
    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError>;
}

// ============================================================================
// Template service
// ============================================================================

#[derive(Serialize)]
struct CreateRender<'a> {
    template_id: &'a str,
    modifications: serde_json::Value,
    subtitles: serde_json::Value,
    output_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct RenderJob {
    id: String,
    status: String,
    url: Option<String>,
    error_message: Option<String>,
}

pub struct TemplateRenderer {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    template_id: Option<String>,
    poll_interval: Duration,
    max_polls: u32,
}

impl TemplateRenderer {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: Option<String>,
        template_id: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            template_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    #[cfg(test)]
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RenderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RenderError::Api {
            status: status.as_u16(),
            body,
        })
    }

    fn finished(job: RenderJob) -> Option<Result<String, RenderError>> {
        match job.status.as_str() {
            "succeeded" => Some(job.url.ok_or_else(|| {
                RenderError::Failed(format!("render {} succeeded without a url", job.id))
            })),
            "failed" => Some(Err(RenderError::Failed(
                job.error_message.unwrap_or_else(|| format!("render {} failed", job.id)),
            ))),
            _ => None,
        }
    }
}

#[async_trait]
impl VideoRenderer for TemplateRenderer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let image = request.image.as_deref().ok_or(RenderError::MissingImage)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RenderError::NotConfigured("CREATOMATE_API_KEY"))?;
        let template_id = self
            .template_id
            .as_deref()
            .ok_or(RenderError::NotConfigured("CREATOMATE_TEMPLATE_ID"))?;

        let body = CreateRender {
            template_id,
            modifications: json!({
                "product_image": image,
                "hook_text": request.hook,
                "cta_text": request.cta,
            }),
            subtitles: json!({
                "source": "script",
                "text": request.script,
            }),
            output_format: "mp4",
        };

        let resp = self
            .http
            .post(format!("{}/v1/renders", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let jobs: Vec<RenderJob> = Self::check(resp).await?.json().await?;
        let job = jobs
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::Failed("render service returned no renders".into()))?;

        let id = job.id.clone();
        if let Some(done) = Self::finished(job) {
            return done;
        }

        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let resp = self
                .http
                .get(format!("{}/v1/renders/{}", self.base_url, id))
                .bearer_auth(api_key)
                .send()
                .await?;
            let job: RenderJob = Self::check(resp).await?.json().await?;
            if let Some(done) = Self::finished(job) {
                return done;
            }
        }

        Err(RenderError::TimedOut)
    }
}

// ============================================================================
// Diffusion model
// ============================================================================

pub struct DiffusionRenderer {
    http: Client,
    base_url: String,
    model: String,
    storage: Arc<MediaStorage>,
}

impl DiffusionRenderer {
    pub fn new(http: Client, base_url: &str, model: &str, storage: Arc<MediaStorage>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            storage,
        }
    }

    fn inference_steps(quality: VideoQuality) -> u32 {
        match quality {
            VideoQuality::Fast => 25,
            VideoQuality::Balanced => 50,
            VideoQuality::High => 75,
        }
    }
}

#[async_trait]
impl VideoRenderer for DiffusionRenderer {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let token = request.hf_token.as_deref().ok_or(RenderError::MissingToken)?;

        let resp = self
            .http
            .post(format!("{}/models/{}", self.base_url, self.model))
            .bearer_auth(token)
            .timeout(Duration::from_secs(DIFFUSION_TIMEOUT_SECS))
            .json(&json!({
                "inputs": request.prompt,
                "parameters": {
                    "num_inference_steps": Self::inference_steps(request.quality),
                    "guidance_scale": 7.5,
                    "duration": request.duration_secs,
                }
            }))
            .send()
            .await?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(RenderError::RateLimited),
            StatusCode::UNAUTHORIZED => return Err(RenderError::InvalidToken),
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(RenderError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let bytes: Bytes = resp.bytes().await?;
        let key = format!(
            "{}/ugc_{}.mp4",
            request.key_prefix,
            chrono::Utc::now().timestamp_millis()
        );
        Ok(self.storage.put(&key, bytes).await?)
    }
}

// ============================================================================
// Placeholder and fallback
// ============================================================================

/// Returns a fixed placeholder asset so the queue can always complete the video stage
pub struct PlaceholderRenderer {
    url: String,
}

impl PlaceholderRenderer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl VideoRenderer for PlaceholderRenderer {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn render(&self, _request: &RenderRequest) -> Result<String, RenderError> {
        Ok(self.url.clone())
    }
}

pub struct FallbackRenderer {
    primary: Arc<dyn VideoRenderer>,
    fallback: Arc<dyn VideoRenderer>,
}

impl FallbackRenderer {
    pub fn new(primary: Arc<dyn VideoRenderer>, fallback: Arc<dyn VideoRenderer>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl VideoRenderer for FallbackRenderer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        match self.primary.render(request).await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "[render] primary renderer failed, using fallback"
                );
                self.fallback.render(request).await
            }
        }
    }
}
