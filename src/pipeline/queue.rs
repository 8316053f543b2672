//! Background queue driver.
//!
//! Each tick claims at most one queued item and runs the whole pipeline for
//! its video: script, render, thumbnail, caption. Failures are recorded on
//! the item and the video; the loop itself never stops.

use std::sync::Arc;
use std::time::Duration;

use crate::constants::DEFAULT_VIDEO_LENGTH_SECS;
use crate::models::{QueueItem, QueueStatus, Video, VideoPatch, VideoQuality, VideoStatus};
use crate::services::images::ImageGenerator;
use crate::services::llm::ChatModel;
use crate::services::render::{RenderRequest, VideoRenderer};
use crate::store::{Store, StoreError};

use super::PipelineError;
use super::caption::{generate_caption, hashtag_field};
use super::script::{ProductBrief, generate_script, parse_script};

/// Assets produced for one queued video
#[derive(Debug)]
struct Generated {
    video_url: String,
    thumbnail_url: String,
    caption: String,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Completed { item_id: i64 },
    Failed { item_id: i64, error: String },
}

pub struct QueueDriver {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatModel>,
    images: Arc<dyn ImageGenerator>,
    renderer: Arc<dyn VideoRenderer>,
    interval: Duration,
}

impl QueueDriver {
    pub fn new(
        store: Arc<dyn Store>,
        chat: Arc<dyn ChatModel>,
        images: Arc<dyn ImageGenerator>,
        renderer: Arc<dyn VideoRenderer>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            chat,
            images,
            renderer,
            interval,
        }
    }

    /// Claim and process the next item, if any.
    pub async fn tick(&self) -> Result<TickOutcome, StoreError> {
        let Some(item) = self.store.claim_next_queue_item().await? else {
            tracing::debug!("[queue] no items in queue");
            return Ok(TickOutcome::Idle);
        };

        tracing::info!(
            queue_item_id = item.id,
            video_id = item.video_id,
            user_id = item.user_id,
            "[queue] processing item"
        );

        match self.process(&item).await {
            Ok(()) => {
                self.store
                    .finish_queue_item(item.id, QueueStatus::Completed, None)
                    .await?;
                tracing::info!(queue_item_id = item.id, video_id = item.video_id, "[queue] completed");
                Ok(TickOutcome::Completed { item_id: item.id })
            }
            Err(err) => {
                let error = err.to_string();
                tracing::warn!(
                    queue_item_id = item.id,
                    video_id = item.video_id,
                    error = %error,
                    "[queue] item failed"
                );
                self.store
                    .finish_queue_item(item.id, QueueStatus::Failed, Some(error.clone()))
                    .await?;
                Ok(TickOutcome::Failed {
                    item_id: item.id,
                    error,
                })
            }
        }
    }

    /// Runs forever: one tick immediately, then one per interval.
    pub async fn run(self: Arc<Self>, worker: usize) {
        tracing::info!(worker, interval_secs = self.interval.as_secs(), "[queue] worker started");
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.tick().await {
                tracing::error!(worker, error = %e, "[queue] tick failed");
            }
        }
    }

    async fn process(&self, item: &QueueItem) -> Result<(), PipelineError> {
        let video = self
            .store
            .get_video(item.user_id, item.video_id)
            .await?
            .ok_or(PipelineError::VideoNotFound(item.video_id))?;

        let claimed = self
            .store
            .begin_processing(
                item.user_id,
                item.video_id,
                &[VideoStatus::Pending, VideoStatus::Failed],
            )
            .await?;
        if claimed.is_none() {
            return Err(PipelineError::InvalidState {
                video_id: video.id,
                status: video.status,
                action: "processed from the queue",
            });
        }

        match self.generate(item, &video).await {
            Ok(generated) => {
                self.store
                    .update_video(
                        item.user_id,
                        item.video_id,
                        VideoPatch {
                            video_url: Some(generated.video_url),
                            thumbnail_url: Some(generated.thumbnail_url),
                            hashtags: hashtag_field(&generated.caption),
                            caption: Some(generated.caption),
                            status: Some(VideoStatus::Completed),
                            clear_error: true,
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(())
            }
            Err(err) => {
                self.store
                    .update_video(
                        item.user_id,
                        item.video_id,
                        VideoPatch {
                            status: Some(VideoStatus::Failed),
                            error_message: Some(err.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                Err(err)
            }
        }
    }

    async fn generate(&self, item: &QueueItem, video: &Video) -> Result<Generated, PipelineError> {
        let settings = self.store.get_settings(item.user_id).await?;
        let brief = ProductBrief::from_video(video);

        tracing::info!(video_id = video.id, "[queue] generating script");
        let script = generate_script(self.chat.as_ref(), brief).await?;
        let parsed = parse_script(&script);

        tracing::info!(video_id = video.id, "[queue] generating video");
        let request = RenderRequest {
            key_prefix: format!("videos/{}/{}", item.user_id, video.id),
            image: video.product_image.clone(),
            hook: parsed.hook,
            cta: parsed.cta,
            prompt: format!(
                "UGC-style product video for TikTok: {}. Show {}. Make it look authentic and engaging.",
                script, brief.name
            ),
            script: parsed.subtitles,
            duration_secs: settings
                .as_ref()
                .map_or(DEFAULT_VIDEO_LENGTH_SECS, |s| s.video_length),
            quality: settings
                .as_ref()
                .map_or(VideoQuality::Balanced, |s| s.video_quality),
            hf_token: settings.as_ref().and_then(|s| s.hf_token.clone()),
        };
        let video_url = self.renderer.render(&request).await?;

        tracing::info!(video_id = video.id, "[queue] generating thumbnail");
        let thumbnail_url = self
            .images
            .generate(
                &format!(
                    "Product thumbnail for {}. Clean, professional, eye-catching. Show the product clearly with vibrant colors. TikTok cover image.",
                    brief.name
                ),
                &format!("thumbnails/{}/{}.png", item.user_id, video.id),
            )
            .await?;

        tracing::info!(video_id = video.id, "[queue] generating caption");
        let caption = generate_caption(self.chat.as_ref(), brief).await?;

        Ok(Generated {
            video_url,
            thumbnail_url,
            caption,
        })
    }
}
