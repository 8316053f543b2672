//! Shared data models used across modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Authentication identity keyed by the OAuth provider's open id
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Fields written on sign-in. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UpsertUser {
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Option<Role>,
    pub last_signed_in: Option<DateTime<Utc>>,
}

// ============================================================================
// Videos
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Posted,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
            VideoStatus::Posted => "posted",
        }
    }

    /// Whether a render may be (re)started from this status.
    ///
    /// Failed renders may always be retried. A completed or stuck processing
    /// video is only restarted when the caller explicitly asks to regenerate.
    /// Posted videos are final.
    pub fn can_start_render(self, regenerate: bool) -> bool {
        match self {
            VideoStatus::Pending | VideoStatus::Failed => true,
            VideoStatus::Processing | VideoStatus::Completed => regenerate,
            VideoStatus::Posted => false,
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated generation request
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: i64,
    pub user_id: i64,
    pub product_url: String,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub product_price: Option<String>,
    pub product_description: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<String>,
    pub status: VideoStatus,
    pub tiktok_post_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: i64,
    pub product_url: String,
    pub product_name: String,
    pub product_price: String,
    pub product_description: String,
    pub product_image: Option<String>,
}

/// Partial update for a video row. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub product_name: Option<String>,
    pub product_price: Option<String>,
    pub product_description: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<String>,
    pub status: Option<VideoStatus>,
    pub error_message: Option<String>,
    /// Clears `error_message` when set; applied before `error_message`.
    pub clear_error: bool,
}

// ============================================================================
// Queue
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred generation request awaiting the queue driver
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: i64,
    pub user_id: i64,
    pub video_id: i64,
    pub product_url: String,
    pub status: QueueStatus,
    pub priority: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub user_id: i64,
    pub video_id: i64,
    pub product_url: String,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QueueStats {
    pub total: i64,
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl QueueStats {
    pub fn from_statuses(statuses: impl IntoIterator<Item = QueueStatus>) -> Self {
        statuses.into_iter().fold(Self::default(), |mut acc, status| {
            acc.total += 1;
            match status {
                QueueStatus::Queued => acc.queued += 1,
                QueueStatus::Processing => acc.processing += 1,
                QueueStatus::Completed => acc.completed += 1,
                QueueStatus::Failed => acc.failed += 1,
            }
            acc
        })
    }
}

/// Result of a user-initiated queue delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDeleteOutcome {
    Deleted,
    NotFound,
    NotQueued(QueueStatus),
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Fast,
    Balanced,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyLevel {
    PublicToEveryone,
    MutualFollowFriends,
    SelfOnly,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub id: i64,
    pub user_id: i64,
    pub hf_token: Option<String>,
    pub tiktok_client_id: Option<String>,
    pub tiktok_client_secret: Option<String>,
    pub tiktok_access_token: Option<String>,
    pub tiktok_refresh_token: Option<String>,
    pub tiktok_token_expiry: Option<DateTime<Utc>>,
    pub video_length: i32,
    pub video_quality: VideoQuality,
    pub default_privacy: PrivacyLevel,
    pub enable_comments: bool,
    pub enable_duets: bool,
    pub enable_stitch: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings fields a user may change. Omitted fields keep their stored value
/// (or the column default on first save).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub hf_token: Option<String>,
    pub tiktok_client_id: Option<String>,
    pub tiktok_client_secret: Option<String>,
    pub video_length: Option<i32>,
    pub video_quality: Option<VideoQuality>,
    pub default_privacy: Option<PrivacyLevel>,
    pub enable_comments: Option<bool>,
    pub enable_duets: Option<bool>,
    pub enable_stitch: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_restart_rules() {
        assert!(VideoStatus::Pending.can_start_render(false));
        assert!(VideoStatus::Failed.can_start_render(false));
        assert!(!VideoStatus::Completed.can_start_render(false));
        assert!(VideoStatus::Completed.can_start_render(true));
        assert!(!VideoStatus::Posted.can_start_render(true));
    }

    #[test]
    fn status_text_matches_serde_names() {
        assert_eq!(VideoStatus::Completed.to_string(), "completed");
        assert_eq!(QueueStatus::Queued.as_str(), "queued");
        assert_eq!(
            serde_json::to_string(&PrivacyLevel::MutualFollowFriends).unwrap(),
            "\"MUTUAL_FOLLOW_FRIENDS\""
        );
        assert!(serde_json::from_str::<QueueStatus>("\"archived\"").is_err());
    }

    #[test]
    fn queue_stats_total_is_sum_of_buckets() {
        let stats = QueueStats::from_statuses([
            QueueStatus::Queued,
            QueueStatus::Queued,
            QueueStatus::Processing,
            QueueStatus::Failed,
            QueueStatus::Completed,
        ]);
        assert_eq!(stats.total, 5);
        assert_eq!(
            stats.total,
            stats.queued + stats.processing + stats.completed + stats.failed
        );
        assert_eq!(stats.queued, 2);
    }
}
