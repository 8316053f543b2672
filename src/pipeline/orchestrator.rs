//! Interactive generation flow.
//!
//! The client drives each step with its own RPC call:
//! `analyze_product` creates the video row, `generate_script` returns an
//! unsaved script, `generate_video` renders and records the result, and
//! `generate_caption` attaches a caption to the row.

use std::sync::Arc;

use serde::Serialize;

use crate::constants::{
    DEFAULT_PRODUCT_DESCRIPTION, DEFAULT_PRODUCT_NAME, DEFAULT_PRODUCT_PRICE,
    DEFAULT_VIDEO_LENGTH_SECS,
};
use crate::models::{NewVideo, Video, VideoPatch, VideoQuality, VideoStatus};
use crate::services::llm::ChatModel;
use crate::services::render::{RenderRequest, VideoRenderer};
use crate::store::Store;

use super::PipelineError;
use super::caption::{extract_hashtags, generate_caption, hashtag_field};
use super::extractor::{ExtractionSource, ProductExtractor, ProductInfo};
use super::script::{ProductBrief, generate_script, parse_script};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedProduct {
    pub video_id: i64,
    pub product: ProductInfo,
    pub source: ExtractionSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCaption {
    pub caption: String,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlVideo {
    pub video_url: String,
    pub script: String,
    pub product: ProductInfo,
}

fn or_default(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

pub struct Studio {
    store: Arc<dyn Store>,
    extractor: ProductExtractor,
    chat: Arc<dyn ChatModel>,
    renderer: Arc<dyn VideoRenderer>,
}

impl Studio {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: ProductExtractor,
        chat: Arc<dyn ChatModel>,
        renderer: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            store,
            extractor,
            chat,
            renderer,
        }
    }

    pub fn extractor(&self) -> &ProductExtractor {
        &self.extractor
    }

    async fn load(&self, user_id: i64, video_id: i64) -> Result<Video, PipelineError> {
        self.store
            .get_video(user_id, video_id)
            .await?
            .ok_or(PipelineError::VideoNotFound(video_id))
    }

    fn render_request(key_prefix: String, image: &str, script: &str) -> RenderRequest {
        let parsed = parse_script(script);
        RenderRequest {
            key_prefix,
            image: Some(image.to_string()),
            hook: parsed.hook,
            cta: parsed.cta,
            script: parsed.subtitles,
            prompt: String::new(),
            duration_secs: DEFAULT_VIDEO_LENGTH_SECS,
            quality: VideoQuality::Balanced,
            hf_token: None,
        }
    }

    /// Extract product data and create a `pending` video for it.
    pub async fn analyze_product(
        &self,
        user_id: i64,
        url: &str,
    ) -> Result<AnalyzedProduct, PipelineError> {
        let extraction = self.extractor.extract(url).await?;
        let product = extraction.product;

        let video = self
            .store
            .create_video(NewVideo {
                user_id,
                product_url: url.trim().to_string(),
                product_name: or_default(product.name.clone(), DEFAULT_PRODUCT_NAME),
                product_price: or_default(product.price.clone(), DEFAULT_PRODUCT_PRICE),
                product_description: or_default(
                    product.description.clone(),
                    DEFAULT_PRODUCT_DESCRIPTION,
                ),
                product_image: product.images.first().cloned(),
            })
            .await?;

        tracing::info!(
            user_id,
            video_id = video.id,
            source = ?extraction.source,
            "[studio] product analyzed"
        );

        Ok(AnalyzedProduct {
            video_id: video.id,
            product,
            source: extraction.source,
        })
    }

    /// Script for the stored product fields. Nothing is persisted.
    pub async fn generate_script(&self, user_id: i64, video_id: i64) -> Result<String, PipelineError> {
        let video = self.load(user_id, video_id).await?;
        Ok(generate_script(self.chat.as_ref(), ProductBrief::from_video(&video)).await?)
    }

    /// Render the video for `script` and record the outcome on the row.
    ///
    /// A render error marks the video `failed` and is returned to the caller.
    pub async fn generate_video(
        &self,
        user_id: i64,
        video_id: i64,
        script: &str,
        regenerate: bool,
    ) -> Result<GeneratedVideo, PipelineError> {
        let video = self.load(user_id, video_id).await?;
        if !video.status.can_start_render(regenerate) {
            return Err(PipelineError::InvalidState {
                video_id,
                status: video.status,
                action: "rendered",
            });
        }

        let image = match video.product_image.clone() {
            Some(image) => image,
            None => self
                .extractor
                .extract(&video.product_url)
                .await?
                .product
                .images
                .into_iter()
                .next()
                .ok_or(PipelineError::MissingProductImage)?,
        };

        let from: &[VideoStatus] = if regenerate {
            &[
                VideoStatus::Pending,
                VideoStatus::Failed,
                VideoStatus::Processing,
                VideoStatus::Completed,
            ]
        } else {
            &[VideoStatus::Pending, VideoStatus::Failed]
        };
        if self
            .store
            .begin_processing(user_id, video_id, from)
            .await?
            .is_none()
        {
            let current = self.load(user_id, video_id).await?;
            return Err(PipelineError::InvalidState {
                video_id,
                status: current.status,
                action: "rendered",
            });
        }

        tracing::info!(user_id, video_id, renderer = self.renderer.name(), "[studio] rendering video");
        let request = Self::render_request(format!("videos/{}/{}", user_id, video_id), &image, script);

        match self.renderer.render(&request).await {
            Ok(video_url) => {
                self.store
                    .update_video(
                        user_id,
                        video_id,
                        VideoPatch {
                            video_url: Some(video_url.clone()),
                            thumbnail_url: Some(image.clone()),
                            status: Some(VideoStatus::Completed),
                            clear_error: true,
                            ..Default::default()
                        },
                    )
                    .await?;

                Ok(GeneratedVideo {
                    video_url,
                    thumbnail_url: Some(image),
                })
            }
            Err(err) => {
                tracing::warn!(user_id, video_id, error = %err, "[studio] render failed");
                self.store
                    .update_video(
                        user_id,
                        video_id,
                        VideoPatch {
                            status: Some(VideoStatus::Failed),
                            error_message: Some(err.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                Err(err.into())
            }
        }
    }

    /// Caption the video. The status is left untouched either way.
    pub async fn generate_caption(
        &self,
        user_id: i64,
        video_id: i64,
    ) -> Result<GeneratedCaption, PipelineError> {
        let video = self.load(user_id, video_id).await?;
        let caption = generate_caption(self.chat.as_ref(), ProductBrief::from_video(&video)).await?;

        self.store
            .update_video(
                user_id,
                video_id,
                VideoPatch {
                    caption: Some(caption.clone()),
                    hashtags: hashtag_field(&caption),
                    ..Default::default()
                },
            )
            .await?;

        Ok(GeneratedCaption {
            hashtags: extract_hashtags(&caption),
            caption,
        })
    }

    /// Extract, script and render in one go without touching the store.
    pub async fn generate_from_url(
        &self,
        url: &str,
        script: Option<String>,
    ) -> Result<UrlVideo, PipelineError> {
        let product = self.extractor.extract(url).await?.product;
        let image = product
            .images
            .first()
            .cloned()
            .ok_or(PipelineError::MissingProductImage)?;

        let script = match script.filter(|s| !s.trim().is_empty()) {
            Some(script) => script,
            None => generate_script(self.chat.as_ref(), ProductBrief::from_product(&product)).await?,
        };

        let key_prefix = format!("videos/adhoc/{}", chrono::Utc::now().timestamp_millis());
        let video_url = self
            .renderer
            .render(&Self::render_request(key_prefix, &image, &script))
            .await?;

        Ok(UrlVideo {
            video_url,
            script,
            product,
        })
    }
}
