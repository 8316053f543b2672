//! Video performance metrics

use serde::Serialize;

use crate::constants::TOP_PERFORMER_COUNT;
use crate::models::Video;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetrics {
    pub video_id: i64,
    pub product_name: Option<String>,
    pub tiktok_post_id: Option<String>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub engagement: f64,
}

impl VideoMetrics {
    pub fn new(video_id: i64, views: u64, likes: u64, comments: u64, shares: u64) -> Self {
        Self {
            video_id,
            product_name: None,
            tiktok_post_id: None,
            views,
            likes,
            comments,
            shares,
            engagement: engagement(likes, comments, shares, views),
        }
    }

    /// No platform metrics are collected yet, so every counter starts at zero.
    pub fn for_video(video: &Video) -> Self {
        Self {
            product_name: video.product_name.clone(),
            tiktok_post_id: video.tiktok_post_id.clone(),
            ..Self::new(video.id, 0, 0, 0, 0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingMetrics {
    pub top_performers: Vec<VideoMetrics>,
    pub average_engagement: f64,
    pub total_views: u64,
    pub total_likes: u64,
}

/// Interactions per hundred views; zero when there are no views.
pub fn engagement(likes: u64, comments: u64, shares: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    (likes + comments + shares) as f64 * 100.0 / views as f64
}

pub fn trending_metrics(mut metrics: Vec<VideoMetrics>) -> TrendingMetrics {
    let total_views = metrics.iter().map(|m| m.views).sum();
    let total_likes = metrics.iter().map(|m| m.likes).sum();
    let average_engagement = if metrics.is_empty() {
        0.0
    } else {
        metrics.iter().map(|m| m.engagement).sum::<f64>() / metrics.len() as f64
    };

    // sort_by is stable: equal view counts keep their input order
    metrics.sort_by(|a, b| b.views.cmp(&a.views));
    metrics.truncate(TOP_PERFORMER_COUNT);

    TrendingMetrics {
        top_performers: metrics,
        average_engagement,
        total_views,
        total_likes,
    }
}

/// `1.5K`, `2.0M`, or the plain number below a thousand. Halves round up.
pub fn format_metric(value: u64) -> String {
    if value >= 1_000_000 {
        one_decimal(value, 1_000_000, 'M')
    } else if value >= 1_000 {
        one_decimal(value, 1_000, 'K')
    } else {
        value.to_string()
    }
}

fn one_decimal(value: u64, unit: u64, suffix: char) -> String {
    let tenths = value / unit * 10 + ((value % unit) * 10 + unit / 2) / unit;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}
