//! analytics.metrics

use axum::{Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::Rpc;
use crate::AppState;
use crate::analytics::{self, TrendingMetrics, VideoMetrics};
use crate::services::error::AppResult;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/trpc/analytics.metrics", get(metrics))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResponse {
    #[serde(flatten)]
    trending: TrendingMetrics,
    total_views_display: String,
    total_likes_display: String,
    video_count: usize,
}

async fn metrics(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Rpc<MetricsResponse>> {
    let videos = state.store.list_videos(user.id).await?;
    let video_count = videos.len();
    let trending = analytics::trending_metrics(videos.iter().map(VideoMetrics::for_video).collect());

    Ok(Rpc(MetricsResponse {
        total_views_display: analytics::format_metric(trending.total_views),
        total_likes_display: analytics::format_metric(trending.total_likes),
        video_count,
        trending,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    use crate::models::NewVideo;
    use crate::test_support::{body_json, query, signed_in, test_state};

    #[tokio::test]
    async fn metrics_for_new_account_are_zero() {
        let state = test_state();
        let (_, token) = signed_in(&state, "alice").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(query("/api/trpc/analytics.metrics", &token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        let data = &body["result"]["data"];
        assert_eq!(data["totalViews"], 0);
        assert_eq!(data["averageEngagement"], 0.0);
        assert_eq!(data["totalViewsDisplay"], "0");
        assert!(data["topPerformers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_performers_capped_at_five() {
        let state = test_state();
        let (user, token) = signed_in(&state, "alice").await;
        for i in 0..7 {
            state
                .store
                .create_video(NewVideo {
                    user_id: user.id,
                    product_url: format!("https://shop.example.com/p/{}", i),
                    product_name: format!("Item {}", i),
                    product_price: "$1".into(),
                    product_description: "desc".into(),
                    product_image: None,
                })
                .await
                .unwrap();
        }
        let app = routes().with_state(state);

        let response = app
            .oneshot(query("/api/trpc/analytics.metrics", &token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["result"]["data"]["videoCount"], 7);
        assert_eq!(
            body["result"]["data"]["topPerformers"].as_array().unwrap().len(),
            5
        );
    }
}
