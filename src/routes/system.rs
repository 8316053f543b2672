//! Health checks and owner notifications

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use super::auth::AdminUser;
use super::rpc::{MutationInput, QueryInput, Rpc};
use crate::AppState;
use crate::services::error::{AppError, AppResult};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/trpc/system.health", get(rpc_health))
        .route("/api/trpc/system.notifyOwner", post(notify_owner))
}

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

#[derive(Debug, Deserialize)]
struct HealthInput {
    timestamp: i64,
}

#[derive(Serialize)]
struct Healthy {
    ok: bool,
}

async fn rpc_health(QueryInput(input): QueryInput<HealthInput>) -> AppResult<Rpc<Healthy>> {
    if input.timestamp < 0 {
        return Err(AppError::BadRequest("timestamp cannot be negative".into()));
    }
    Ok(Rpc(Healthy { ok: true }))
}

#[derive(Debug, Deserialize)]
struct NotifyInput {
    title: String,
    content: String,
}

#[derive(Serialize)]
struct Delivered {
    success: bool,
}

async fn notify_owner(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    MutationInput(input): MutationInput<NotifyInput>,
) -> AppResult<Rpc<Delivered>> {
    let success = state.notifier.notify_owner(&input.title, &input.content).await?;
    tracing::info!(user_id = admin.id, success, "[system] owner notification sent");
    Ok(Rpc(Delivered { success }))
}
