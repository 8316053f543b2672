//! video.* - interactive generation steps

use axum::{Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::{MutationInput, Rpc};
use crate::AppState;
use crate::pipeline::orchestrator::{GeneratedCaption, GeneratedVideo, UrlVideo};
use crate::services::error::{AppError, AppResult};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trpc/video.generateScript", post(generate_script))
        .route("/api/trpc/video.generate", post(generate))
        .route("/api/trpc/video.generateCaption", post(generate_caption))
        .route("/api/trpc/video.generateFromUrl", post(generate_from_url))
}

/// Per-user token bucket in front of every LLM/render call
pub async fn ensure_generation_allowed(state: &AppState, user_id: i64) -> AppResult<()> {
    if state.generation_limiter.check(user_id).await {
        Ok(())
    } else {
        tracing::warn!(user_id, "[video] generation rate limit hit");
        Err(AppError::RateLimited)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoIdInput {
    video_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateInput {
    video_id: i64,
    script: String,
    #[serde(default)]
    regenerate: bool,
}

#[derive(Debug, Deserialize)]
struct FromUrlInput {
    url: String,
    #[serde(default)]
    script: Option<String>,
}

#[derive(Serialize)]
struct ScriptResponse {
    script: String,
}

async fn generate_script(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<VideoIdInput>,
) -> AppResult<Rpc<ScriptResponse>> {
    ensure_generation_allowed(&state, user.id).await?;
    let script = state.studio.generate_script(user.id, input.video_id).await?;
    Ok(Rpc(ScriptResponse { script }))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<GenerateInput>,
) -> AppResult<Rpc<GeneratedVideo>> {
    if input.script.trim().is_empty() {
        return Err(AppError::BadRequest("script is required".into()));
    }
    ensure_generation_allowed(&state, user.id).await?;

    let generated = state
        .studio
        .generate_video(user.id, input.video_id, &input.script, input.regenerate)
        .await?;
    Ok(Rpc(generated))
}

async fn generate_caption(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<VideoIdInput>,
) -> AppResult<Rpc<GeneratedCaption>> {
    ensure_generation_allowed(&state, user.id).await?;
    let caption = state.studio.generate_caption(user.id, input.video_id).await?;
    Ok(Rpc(caption))
}

async fn generate_from_url(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<FromUrlInput>,
) -> AppResult<Rpc<UrlVideo>> {
    ensure_generation_allowed(&state, user.id).await?;
    let result = state.studio.generate_from_url(&input.url, input.script).await?;
    Ok(Rpc(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::models::{NewVideo, VideoStatus};
    use crate::test_support::{body_json, mutation, signed_in, test_state};

    async fn seed(state: &AppState, user_id: i64) -> i64 {
        state
            .store
            .create_video(NewVideo {
                user_id,
                product_url: "https://shop.example.com/p/1".into(),
                product_name: "Glow Lamp".into(),
                product_price: "$24.50".into(),
                product_description: "A lamp".into(),
                product_image: Some("https://cdn.example.com/p.jpg".into()),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn llm_failure_is_upstream_error() {
        // The test LLM client has no API key
        let state = test_state();
        let (user, token) = signed_in(&state, "open-1").await;
        let video_id = seed(&state, user.id).await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/video.generateScript",
                &token,
                json!({ "videoId": video_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let state = test_state();
        let (_, token) = signed_in(&state, "open-1").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/video.generateCaption",
                &token,
                json!({ "videoId": 999 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn render_failure_is_recorded_on_video() {
        // The test template renderer has no API key
        let state = test_state();
        let (user, token) = signed_in(&state, "open-1").await;
        let video_id = seed(&state, user.id).await;
        let app = routes().with_state(state.clone());

        let response = app
            .oneshot(mutation(
                "/api/trpc/video.generate",
                &token,
                json!({ "videoId": video_id, "script": "Hook\nCTA" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let video = state.store.get_video(user.id, video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Failed);
        assert!(video.error_message.is_some());
    }

    #[tokio::test]
    async fn empty_script_is_rejected() {
        let state = test_state();
        let (user, token) = signed_in(&state, "open-1").await;
        let video_id = seed(&state, user.id).await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/video.generate",
                &token,
                json!({ "videoId": video_id, "script": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
