//! settings.get / settings.update

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::{MutationInput, Rpc, Success};
use crate::AppState;
use crate::models::{SettingsUpdate, UserSettings};
use crate::services::error::{AppError, AppResult};

/// Upper bound accepted for a generated video's length in seconds
const MAX_VIDEO_LENGTH_SECS: i32 = 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trpc/settings.get", get(get_settings))
        .route("/api/trpc/settings.update", post(update_settings))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Rpc<Option<UserSettings>>> {
    Ok(Rpc(state.store.get_settings(user.id).await?))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(update): MutationInput<SettingsUpdate>,
) -> AppResult<Rpc<Success>> {
    if let Some(length) = update.video_length {
        if !(1..=MAX_VIDEO_LENGTH_SECS).contains(&length) {
            return Err(AppError::BadRequest(format!(
                "videoLength must be between 1 and {}",
                MAX_VIDEO_LENGTH_SECS
            )));
        }
    }

    state.store.upsert_settings(user.id, update).await?;
    Ok(Success::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support::{body_json, mutation, query, signed_in, test_state};

    #[tokio::test]
    async fn unsaved_settings_are_null() {
        let state = test_state();
        let (_, token) = signed_in(&state, "alice").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(query("/api/trpc/settings.get", &token, None))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["result"]["data"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn partial_updates_merge() {
        let state = test_state();
        let (_, token) = signed_in(&state, "alice").await;
        let app = routes().with_state(state);

        for body in [
            json!({ "hfToken": "hf_1", "videoQuality": "high" }),
            json!({ "defaultPrivacy": "SELF_ONLY", "enableDuets": false }),
        ] {
            let response = app
                .clone()
                .oneshot(mutation("/api/trpc/settings.update", &token, body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(query("/api/trpc/settings.get", &token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        let settings = &body["result"]["data"];
        assert_eq!(settings["hfToken"], "hf_1");
        assert_eq!(settings["videoQuality"], "high");
        assert_eq!(settings["defaultPrivacy"], "SELF_ONLY");
        assert_eq!(settings["enableDuets"], false);
        assert_eq!(settings["enableComments"], true);
        assert_eq!(settings["videoLength"], 8);
    }

    #[tokio::test]
    async fn invalid_quality_is_rejected() {
        let state = test_state();
        let (_, token) = signed_in(&state, "alice").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/settings.update",
                &token,
                json!({ "videoQuality": "ultra" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_length_is_rejected() {
        let state = test_state();
        let (_, token) = signed_in(&state, "alice").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/settings.update",
                &token,
                json!({ "videoLength": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
