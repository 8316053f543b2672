//! product.analyze

use axum::{Router, extract::State, routing::post};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::{MutationInput, Rpc};
use super::video::ensure_generation_allowed;
use crate::AppState;
use crate::pipeline::orchestrator::AnalyzedProduct;
use crate::services::error::AppResult;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/trpc/product.analyze", post(analyze))
}

#[derive(Debug, Deserialize)]
struct AnalyzeInput {
    url: String,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<AnalyzeInput>,
) -> AppResult<Rpc<AnalyzedProduct>> {
    ensure_generation_allowed(&state, user.id).await?;
    let analyzed = state.studio.analyze_product(user.id, &input.url).await?;
    Ok(Rpc(analyzed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::test_support::{body_json, mutation, signed_in, test_state};

    #[tokio::test]
    async fn unreachable_page_still_creates_video() {
        let state = test_state();
        let (user, token) = signed_in(&state, "open-1").await;
        let app = routes().with_state(state.clone());

        let response = app
            .oneshot(mutation(
                "/api/trpc/product.analyze",
                &token,
                serde_json::json!({ "url": "http://127.0.0.1:9/product/1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let data = &body["result"]["data"];
        assert_eq!(data["product"]["name"], "Premium TikTok Shop Product");
        assert_eq!(data["source"], "fallback");

        let video_id = data["videoId"].as_i64().unwrap();
        assert!(state.store.get_video(user.id, video_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_url_is_bad_request() {
        let state = test_state();
        let (_, token) = signed_in(&state, "open-1").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(mutation(
                "/api/trpc/product.analyze",
                &token,
                serde_json::json!({ "url": "not a url" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn requires_session() {
        let app = routes().with_state(test_state());
        let response = app
            .oneshot(
                axum::http::Request::post("/api/trpc/product.analyze")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(r#"{"url":"https://example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Please login (10001)"
        );
    }
}
