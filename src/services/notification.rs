//! Owner notifications through the platform notification service

use reqwest::Client;
use serde::Serialize;

use crate::constants::{NOTIFICATION_CONTENT_MAX_LENGTH, NOTIFICATION_TITLE_MAX_LENGTH};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("{0}")]
    Invalid(String),
    #[error("Notification service is not configured")]
    NotConfigured,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub content: String,
}

/// Trim and bound-check a notification payload
pub fn validate(title: &str, content: &str) -> Result<Notification, NotifyError> {
    let title = title.trim();
    let content = content.trim();

    if title.is_empty() {
        return Err(NotifyError::Invalid("Notification title is required.".into()));
    }
    if content.is_empty() {
        return Err(NotifyError::Invalid("Notification content is required.".into()));
    }
    if title.chars().count() > NOTIFICATION_TITLE_MAX_LENGTH {
        return Err(NotifyError::Invalid(format!(
            "Notification title must be at most {} characters.",
            NOTIFICATION_TITLE_MAX_LENGTH
        )));
    }
    if content.chars().count() > NOTIFICATION_CONTENT_MAX_LENGTH {
        return Err(NotifyError::Invalid(format!(
            "Notification content must be at most {} characters.",
            NOTIFICATION_CONTENT_MAX_LENGTH
        )));
    }

    Ok(Notification {
        title: title.to_string(),
        content: content.to_string(),
    })
}

pub struct Notifier {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl Notifier {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/webdevtoken.v1.WebDevService/SendNotification",
                base_url.trim_end_matches('/')
            ),
            api_key,
        }
    }

    /// Send a notification to the project owner.
    ///
    /// Invalid payloads and missing configuration are errors. Delivery
    /// failures are logged and reported as `Ok(false)`.
    pub async fn notify_owner(&self, title: &str, content: &str) -> Result<bool, NotifyError> {
        let payload = validate(title, content)?;
        let api_key = self.api_key.as_deref().ok_or(NotifyError::NotConfigured)?;

        let result = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("accept", "application/json")
            .header("connect-protocol-version", "1")
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                let status = resp.status();
                let detail = resp.text().await.unwrap_or_default();
                tracing::warn!(%status, detail = %detail, "[notification] failed to notify owner");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "[notification] error calling notification service");
                Ok(false)
            }
        }
    }
}
