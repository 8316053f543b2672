//! queue.* - batch submissions drained by the background driver

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::rpc::{MutationInput, Rpc, Success};
use crate::AppState;
use crate::models::{
    NewQueueItem, QueueDeleteOutcome, QueueItem, QueueStats, QueueStatus, VideoStatus,
};
use crate::pipeline::extractor::validate_url;
use crate::services::error::{AppError, AppResult};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trpc/queue.list", get(list))
        .route("/api/trpc/queue.add", post(add))
        .route("/api/trpc/queue.delete", post(delete))
        .route("/api/trpc/queue.stats", get(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddInput {
    video_id: i64,
    product_url: String,
    #[serde(default)]
    priority: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct IdInput {
    id: i64,
}

#[derive(Serialize)]
struct Created {
    id: i64,
}

async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Rpc<Vec<QueueItem>>> {
    Ok(Rpc(state.store.list_queue_items(user.id).await?))
}

async fn add(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<AddInput>,
) -> AppResult<Rpc<Created>> {
    let url = validate_url(&input.product_url).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let video = state
        .store
        .get_video(user.id, input.video_id)
        .await?
        .ok_or(AppError::NotFound("Video"))?;
    if !matches!(video.status, VideoStatus::Pending | VideoStatus::Failed) {
        return Err(AppError::Conflict(format!(
            "Video {} is {} and cannot be queued",
            video.id, video.status
        )));
    }
    let in_flight = state.store.list_queue_items(user.id).await?.into_iter().any(|item| {
        item.video_id == video.id
            && matches!(item.status, QueueStatus::Queued | QueueStatus::Processing)
    });
    if in_flight {
        return Err(AppError::Conflict(format!("Video {} is already queued", video.id)));
    }

    let item = state
        .store
        .add_queue_item(NewQueueItem {
            user_id: user.id,
            video_id: video.id,
            product_url: url.to_string(),
            priority: input.priority.unwrap_or(0),
        })
        .await?;

    tracing::info!(user_id = user.id, queue_item_id = item.id, video_id = video.id, "[queue] item added");
    Ok(Rpc(Created { id: item.id }))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    MutationInput(input): MutationInput<IdInput>,
) -> AppResult<Rpc<Success>> {
    match state.store.delete_queue_item(user.id, input.id).await? {
        QueueDeleteOutcome::Deleted => Ok(Success::ok()),
        QueueDeleteOutcome::NotFound => Err(AppError::NotFound("Queue item")),
        QueueDeleteOutcome::NotQueued(status) => Err(AppError::Conflict(format!(
            "Queue item {} is {} and can no longer be removed",
            input.id, status
        ))),
    }
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Rpc<QueueStats>> {
    Ok(Rpc(state.store.queue_stats(user.id).await?))
}
