//! Thumbnail image generation

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::storage::{MediaStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image API key is not configured")]
    NotConfigured,
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image generation failed: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("image generation returned no image")]
    EmptyResponse,
    #[error("image payload was not valid base64")]
    Decode(#[from] base64::DecodeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image and return a URL for it. `key` names the stored
    /// object when the service returns raw image data.
    async fn generate(&self, prompt: &str, key: &str) -> Result<String, ImageError>;
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

pub struct ImageClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    storage: Arc<MediaStorage>,
}

impl ImageClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: Option<String>,
        storage: Arc<MediaStorage>,
    ) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/images/generations", base_url.trim_end_matches('/')),
            api_key,
            storage,
        }
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(&self, prompt: &str, key: &str) -> Result<String, ImageError> {
        let api_key = self.api_key.as_deref().ok_or(ImageError::NotConfigured)?;

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&json!({ "prompt": prompt, "n": 1 }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ImageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImageResponse = resp.json().await?;
        let image = parsed.data.into_iter().next().ok_or(ImageError::EmptyResponse)?;

        if let Some(url) = image.url {
            return Ok(url);
        }

        let encoded = image.b64_json.ok_or(ImageError::EmptyResponse)?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        Ok(self.storage.put(key, Bytes::from(bytes)).await?)
    }
}
