//! Error handling utilities for route handlers

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::constants::{NOT_ADMIN_ERR_MSG, UNAUTHED_ERR_MSG};
use crate::pipeline::PipelineError;
use crate::services::notification::NotifyError;
use crate::store::StoreError;

/// Extension trait for logging errors and converting to StatusCode
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{}", context);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// Error returned by RPC procedures.
///
/// Serialized as `{ "error": { "message", "code" } }` so the mobile client can
/// show the message directly.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{}", UNAUTHED_ERR_MSG)]
    Unauthorized,

    #[error("{}", NOT_ADMIN_ERR_MSG)]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many generation requests, try again shortly")]
    RateLimited,

    /// A third-party service (LLM, renderer, OAuth, ...) failed
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                "An internal error occurred".to_string()
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream service error");
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": {
                "message": message,
                "code": code,
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::VideoNotFound(_) => AppError::NotFound("Video"),
            PipelineError::InvalidState { .. } => AppError::Conflict(err.to_string()),
            PipelineError::InvalidUrl(_) | PipelineError::MissingProductImage => {
                AppError::BadRequest(err.to_string())
            }
            PipelineError::Store(e) => AppError::Store(e),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Invalid(msg) => AppError::BadRequest(msg),
            NotifyError::NotConfigured => AppError::Upstream(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_uses_fixed_message() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Please login (10001)");
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn upstream_message_is_embedded() {
        let response = AppError::Upstream("LLM invoke failed: 500".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "LLM invoke failed: 500");
        assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn store_errors_are_sanitized() {
        let err = AppError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn log_500_maps_any_error_to_internal() {
        let result: Result<(), &str> = Err("boom");
        assert_eq!(result.log_500("context"), Err(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(Ok::<u8, &str>(3).log_500("context"), Ok(3));
    }
}
