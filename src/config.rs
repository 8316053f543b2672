//! Environment-driven configuration.
//!
//! Loaded once in `main` after `dotenvy` has merged any `.env` file into the
//! process environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::DEFAULT_QUEUE_POLL_INTERVAL_SECS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// How the product extractor reads a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Parse Open Graph / meta tags, falling back to the LLM when no title is found
    Html,
    /// Always hand the page to the LLM
    Llm,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: Vec<u8>,
    pub app_id: String,
    pub oauth_server_url: String,
    pub owner_open_id: Option<String>,
    pub forge_api_url: String,
    pub forge_api_key: Option<String>,
    pub llm_model: String,
    pub creatomate_api_url: String,
    pub creatomate_api_key: Option<String>,
    pub creatomate_template_id: Option<String>,
    pub hf_api_url: String,
    pub hf_video_model: String,
    pub local_storage_path: Option<PathBuf>,
    pub gcs_bucket: Option<String>,
    pub public_base_url: String,
    pub frontend_url: String,
    pub secure_cookies: bool,
    pub queue_poll_interval: Duration,
    pub queue_workers: usize,
    pub extraction_mode: ExtractionMode,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let extraction_mode = match var("EXTRACTION_MODE").as_deref() {
            None | Some("html") => ExtractionMode::Html,
            Some("llm") => ExtractionMode::Llm,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EXTRACTION_MODE",
                    value: other.to_string(),
                });
            }
        };

        let queue_workers: usize = parse_var("QUEUE_WORKERS", 1)?;
        if queue_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "QUEUE_WORKERS",
                value: "0".to_string(),
            });
        }

        let port = parse_var("PORT", 3000u16)?;

        Ok(Self {
            port,
            database_url: var("DATABASE_URL"),
            jwt_secret: jwt_secret.into_bytes(),
            app_id: var("APP_ID").or_else(|| var("VITE_APP_ID")).unwrap_or_default(),
            oauth_server_url: var("OAUTH_SERVER_URL").unwrap_or_default(),
            owner_open_id: var("OWNER_OPEN_ID"),
            forge_api_url: var("FORGE_API_URL")
                .unwrap_or_else(|| "https://forge.manus.im".to_string()),
            forge_api_key: var("FORGE_API_KEY"),
            llm_model: var("LLM_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            creatomate_api_url: var("CREATOMATE_API_URL")
                .unwrap_or_else(|| "https://api.creatomate.com".to_string()),
            creatomate_api_key: var("CREATOMATE_API_KEY"),
            creatomate_template_id: var("CREATOMATE_TEMPLATE_ID"),
            hf_api_url: var("HF_API_URL")
                .unwrap_or_else(|| "https://api-inference.huggingface.co".to_string()),
            hf_video_model: var("HF_VIDEO_MODEL")
                .unwrap_or_else(|| "Lightricks/LTX-Video-0.9.8-13B-distilled".to_string()),
            local_storage_path: var("LOCAL_STORAGE_PATH").map(PathBuf::from),
            gcs_bucket: var("GCS_BUCKET_NAME"),
            public_base_url: var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:8081".to_string()),
            secure_cookies: var("ENV").as_deref() == Some("prod"),
            queue_poll_interval: Duration::from_secs(parse_var(
                "QUEUE_POLL_INTERVAL_SECS",
                DEFAULT_QUEUE_POLL_INTERVAL_SECS,
            )?),
            queue_workers,
            extraction_mode,
        })
    }

    /// A config suitable for unit tests; nothing points at real services.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            database_url: None,
            jwt_secret: b"test-secret".to_vec(),
            app_id: "test-app".to_string(),
            oauth_server_url: "http://127.0.0.1:9".to_string(),
            owner_open_id: Some("owner-open-id".to_string()),
            forge_api_url: "http://127.0.0.1:9".to_string(),
            forge_api_key: None,
            llm_model: "test-model".to_string(),
            creatomate_api_url: "http://127.0.0.1:9".to_string(),
            creatomate_api_key: None,
            creatomate_template_id: None,
            hf_api_url: "http://127.0.0.1:9".to_string(),
            hf_video_model: "test/model".to_string(),
            local_storage_path: None,
            gcs_bucket: None,
            public_base_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:8081".to_string(),
            secure_cookies: false,
            queue_poll_interval: Duration::from_secs(30),
            queue_workers: 1,
            extraction_mode: ExtractionMode::Html,
        }
    }
}
