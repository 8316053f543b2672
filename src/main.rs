mod analytics;
mod config;
mod constants;
mod domain;
mod models;
mod pipeline;
mod routes;
mod services;
mod storage;
mod store;

use axum::http::{HeaderValue, Method, header};
use google_cloud_storage::client::Storage;
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use pipeline::extractor::ProductExtractor;
use pipeline::orchestrator::Studio;
use pipeline::queue::QueueDriver;
use services::images::ImageClient;
use services::llm::{ChatModel, LlmClient};
use services::notification::Notifier;
use services::oauth::OAuthClient;
use services::rate_limit::{RateLimitConfig, UserRateLimiter};
use services::render::{DiffusionRenderer, FallbackRenderer, PlaceholderRenderer, TemplateRenderer};
use storage::{GcsBucket, MediaStorage};
use store::{MemoryStore, PgStore, Store};

/// Served when the diffusion backend cannot produce a clip
const PLACEHOLDER_VIDEO_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4";
/// Local media root used when neither LOCAL_STORAGE_PATH nor GCS_BUCKET_NAME is set
const DEFAULT_MEDIA_DIR: &str = "./media";
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const LIMITER_MAX_IDLE: Duration = Duration::from_secs(3600);

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub oauth: OAuthClient,
    pub notifier: Notifier,
    pub storage: Arc<MediaStorage>,
    pub studio: Studio,
    pub generation_limiter: UserRateLimiter,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tik_agent=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            sqlx::migrate!().run(&pool).await?;
            tracing::info!("[db] connected and migrated");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("[db] DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // GCS client uses GOOGLE_APPLICATION_CREDENTIALS
    let gcs = match &config.gcs_bucket {
        Some(bucket) => {
            let client = Storage::builder()
                .build()
                .await
                .map_err(|e| format!("failed to create GCS client: {}", e))?;
            Some(GcsBucket {
                client,
                bucket: bucket.clone(),
            })
        }
        None => None,
    };
    let local_root = match (&config.local_storage_path, &gcs) {
        (Some(path), _) => Some(path.clone()),
        (None, None) => {
            tracing::warn!(dir = DEFAULT_MEDIA_DIR, "[storage] no backend configured, using local directory");
            Some(PathBuf::from(DEFAULT_MEDIA_DIR))
        }
        (None, Some(_)) => None,
    };
    let storage = Arc::new(MediaStorage::new(local_root, gcs, &config.public_base_url));

    let http = Client::new();
    let chat: Arc<dyn ChatModel> = Arc::new(LlmClient::new(
        http.clone(),
        &config.forge_api_url,
        config.forge_api_key.clone(),
        &config.llm_model,
    ));
    let extractor = ProductExtractor::new(http.clone(), Some(chat.clone()), config.extraction_mode);
    let template_renderer = Arc::new(TemplateRenderer::new(
        http.clone(),
        &config.creatomate_api_url,
        config.creatomate_api_key.clone(),
        config.creatomate_template_id.clone(),
    ));
    let studio = Studio::new(store.clone(), extractor, chat.clone(), template_renderer);

    let queue_renderer = Arc::new(FallbackRenderer::new(
        Arc::new(DiffusionRenderer::new(
            http.clone(),
            &config.hf_api_url,
            &config.hf_video_model,
            storage.clone(),
        )),
        Arc::new(PlaceholderRenderer::new(PLACEHOLDER_VIDEO_URL)),
    ));
    let images = Arc::new(ImageClient::new(
        http.clone(),
        &config.forge_api_url,
        config.forge_api_key.clone(),
        storage.clone(),
    ));
    let driver = Arc::new(QueueDriver::new(
        store.clone(),
        chat,
        images,
        queue_renderer,
        config.queue_poll_interval,
    ));
    for worker in 0..config.queue_workers {
        tokio::spawn(driver.clone().run(worker));
    }
    tracing::info!(
        workers = config.queue_workers,
        interval_secs = config.queue_poll_interval.as_secs(),
        "[queue] background processing started"
    );

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&config.frontend_url)?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let port = config.port;
    let state = Arc::new(AppState {
        oauth: OAuthClient::new(http.clone(), &config.oauth_server_url, &config.app_id),
        notifier: Notifier::new(http, &config.forge_api_url, config.forge_api_key.clone()),
        config,
        store,
        storage,
        studio,
        generation_limiter: UserRateLimiter::new(RateLimitConfig::GENERATION),
    });

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_state.generation_limiter.cleanup(LIMITER_MAX_IDLE).await;
        }
    });

    let app = routes::build_routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
