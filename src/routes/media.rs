//! Serves generated media (GET /media/{*path})

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::error::LogErr;
use crate::storage::{StorageError, content_type_for};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/media/{*path}", get(serve_file))
}

async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let data = match state.storage.get(&path).await {
        Err(StorageError::InvalidPath(_)) => return Err(StatusCode::FORBIDDEN),
        other => other.log_500("[media] read failed")?,
    }
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], data))
}
