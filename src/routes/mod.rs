pub mod analytics;
pub mod auth;
pub mod media;
pub mod oauth;
pub mod product;
pub mod queue;
pub mod rpc;
pub mod settings;
pub mod system;
pub mod video;
pub mod videos;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(analytics::routes())
        .merge(auth::routes())
        .merge(media::routes())
        .merge(oauth::routes())
        .merge(product::routes())
        .merge(queue::routes())
        .merge(settings::routes())
        .merge(system::routes())
        .merge(video::routes())
        .merge(videos::routes())
}
