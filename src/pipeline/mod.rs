//! Generation pipeline: product extraction, script, render, caption.
//!
//! `Studio` drives the interactive flow one RPC at a time; `QueueDriver`
//! runs the whole pipeline for queued items in the background.

pub mod caption;
pub mod extractor;
pub mod orchestrator;
pub mod queue;
pub mod script;

use crate::models::VideoStatus;
use crate::services::images::ImageError;
use crate::services::llm::LlmError;
use crate::services::render::RenderError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Video {0} not found")]
    VideoNotFound(i64),
    #[error("Video {video_id} is {status} and cannot be {action}")]
    InvalidState {
        video_id: i64,
        status: VideoStatus,
        action: &'static str,
    },
    #[error("No product images found")]
    MissingProductImage,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
