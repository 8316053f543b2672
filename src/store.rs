//! Persistence handle injected into routes and the queue driver.
//!
//! `PgStore` delegates to the SQL in `crate::domain`; `MemoryStore` keeps the
//! same semantics in process memory for running without a database and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::domain::{queue, settings, users, videos};
use crate::models::{
    NewQueueItem, NewVideo, PrivacyLevel, QueueDeleteOutcome, QueueItem, QueueStats, QueueStatus,
    Role, SettingsUpdate, UpsertUser, User, UserSettings, Video, VideoPatch, VideoQuality,
    VideoStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>>;
    async fn upsert_user(&self, user: UpsertUser) -> StoreResult<User>;
}

#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(&self, video: NewVideo) -> StoreResult<Video>;
    async fn get_video(&self, user_id: i64, video_id: i64) -> StoreResult<Option<Video>>;
    async fn list_videos(&self, user_id: i64) -> StoreResult<Vec<Video>>;
    async fn update_video(
        &self,
        user_id: i64,
        video_id: i64,
        patch: VideoPatch,
    ) -> StoreResult<Option<Video>>;
    /// Conditional move to `processing`; `None` if missing or not in one of `from`.
    async fn begin_processing(
        &self,
        user_id: i64,
        video_id: i64,
        from: &[VideoStatus],
    ) -> StoreResult<Option<Video>>;
    async fn delete_video(&self, user_id: i64, video_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn add_queue_item(&self, item: NewQueueItem) -> StoreResult<QueueItem>;
    async fn list_queue_items(&self, user_id: i64) -> StoreResult<Vec<QueueItem>>;
    async fn delete_queue_item(&self, user_id: i64, item_id: i64)
    -> StoreResult<QueueDeleteOutcome>;
    /// Atomically move the next `queued` item (any user) to `processing`.
    async fn claim_next_queue_item(&self) -> StoreResult<Option<QueueItem>>;
    async fn finish_queue_item(
        &self,
        item_id: i64,
        status: QueueStatus,
        error_message: Option<String>,
    ) -> StoreResult<()>;
    async fn queue_stats(&self, user_id: i64) -> StoreResult<QueueStats>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, user_id: i64) -> StoreResult<Option<UserSettings>>;
    async fn upsert_settings(
        &self,
        user_id: i64,
        update: SettingsUpdate,
    ) -> StoreResult<UserSettings>;
}

pub trait Store: UserStore + VideoStore + QueueStore + SettingsStore {}

impl<T: UserStore + VideoStore + QueueStore + SettingsStore> Store for T {}

// ============================================================================
// Postgres
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>> {
        Ok(users::get_user_by_open_id(&self.db, open_id).await?)
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(users::get_user_by_id(&self.db, user_id).await?)
    }

    async fn upsert_user(&self, user: UpsertUser) -> StoreResult<User> {
        Ok(users::upsert_user(&self.db, &user).await?)
    }
}

#[async_trait]
impl VideoStore for PgStore {
    async fn create_video(&self, video: NewVideo) -> StoreResult<Video> {
        Ok(videos::create_video(&self.db, &video).await?)
    }

    async fn get_video(&self, user_id: i64, video_id: i64) -> StoreResult<Option<Video>> {
        Ok(videos::get_video(&self.db, user_id, video_id).await?)
    }

    async fn list_videos(&self, user_id: i64) -> StoreResult<Vec<Video>> {
        Ok(videos::list_videos(&self.db, user_id).await?)
    }

    async fn update_video(
        &self,
        user_id: i64,
        video_id: i64,
        patch: VideoPatch,
    ) -> StoreResult<Option<Video>> {
        Ok(videos::update_video(&self.db, user_id, video_id, &patch).await?)
    }

    async fn begin_processing(
        &self,
        user_id: i64,
        video_id: i64,
        from: &[VideoStatus],
    ) -> StoreResult<Option<Video>> {
        Ok(videos::begin_processing(&self.db, user_id, video_id, from).await?)
    }

    async fn delete_video(&self, user_id: i64, video_id: i64) -> StoreResult<bool> {
        Ok(videos::delete_video(&self.db, user_id, video_id).await?)
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn add_queue_item(&self, item: NewQueueItem) -> StoreResult<QueueItem> {
        Ok(queue::add_item(&self.db, &item).await?)
    }

    async fn list_queue_items(&self, user_id: i64) -> StoreResult<Vec<QueueItem>> {
        Ok(queue::list_items(&self.db, user_id).await?)
    }

    async fn delete_queue_item(
        &self,
        user_id: i64,
        item_id: i64,
    ) -> StoreResult<QueueDeleteOutcome> {
        if queue::delete_queued_item(&self.db, user_id, item_id).await? {
            return Ok(QueueDeleteOutcome::Deleted);
        }

        Ok(match queue::get_item(&self.db, user_id, item_id).await? {
            Some(item) => QueueDeleteOutcome::NotQueued(item.status),
            None => QueueDeleteOutcome::NotFound,
        })
    }

    async fn claim_next_queue_item(&self) -> StoreResult<Option<QueueItem>> {
        Ok(queue::claim_next(&self.db).await?)
    }

    async fn finish_queue_item(
        &self,
        item_id: i64,
        status: QueueStatus,
        error_message: Option<String>,
    ) -> StoreResult<()> {
        Ok(queue::finish_item(&self.db, item_id, status, error_message.as_deref()).await?)
    }

    async fn queue_stats(&self, user_id: i64) -> StoreResult<QueueStats> {
        Ok(queue::stats(&self.db, user_id).await?)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_settings(&self, user_id: i64) -> StoreResult<Option<UserSettings>> {
        Ok(settings::get_settings(&self.db, user_id).await?)
    }

    async fn upsert_settings(
        &self,
        user_id: i64,
        update: SettingsUpdate,
    ) -> StoreResult<UserSettings> {
        Ok(settings::upsert_settings(&self.db, user_id, &update).await?)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    videos: Vec<Video>,
    queue: Vec<QueueItem>,
    settings: HashMap<i64, UserSettings>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Each operation holds the lock for its whole
/// read-modify-write, which gives the same atomicity as the SQL statements.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_by_open_id(&self, open_id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.open_id == open_id).cloned())
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn upsert_user(&self, user: UpsertUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let last_signed_in = user.last_signed_in.unwrap_or(now);

        if let Some(existing) = tables.users.iter_mut().find(|u| u.open_id == user.open_id) {
            if user.name.is_some() {
                existing.name = user.name;
            }
            if user.email.is_some() {
                existing.email = user.email;
            }
            if user.login_method.is_some() {
                existing.login_method = user.login_method;
            }
            if let Some(role) = user.role {
                existing.role = role;
            }
            existing.last_signed_in = last_signed_in;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let id = tables.next_id();
        let created = User {
            id,
            open_id: user.open_id,
            name: user.name,
            email: user.email,
            login_method: user.login_method,
            role: user.role.unwrap_or(Role::User),
            created_at: now,
            updated_at: now,
            last_signed_in,
        };
        tables.users.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn create_video(&self, video: NewVideo) -> StoreResult<Video> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let id = tables.next_id();

        let created = Video {
            id,
            user_id: video.user_id,
            product_url: video.product_url,
            product_name: Some(video.product_name),
            product_image: video.product_image,
            product_price: Some(video.product_price),
            product_description: Some(video.product_description),
            video_url: None,
            thumbnail_url: None,
            caption: None,
            hashtags: None,
            status: VideoStatus::Pending,
            tiktok_post_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.videos.push(created.clone());
        Ok(created)
    }

    async fn get_video(&self, user_id: i64, video_id: i64) -> StoreResult<Option<Video>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .videos
            .iter()
            .find(|v| v.id == video_id && v.user_id == user_id)
            .cloned())
    }

    async fn list_videos(&self, user_id: i64) -> StoreResult<Vec<Video>> {
        let tables = self.tables.lock().await;
        let mut list: Vec<Video> = tables
            .videos
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn update_video(
        &self,
        user_id: i64,
        video_id: i64,
        patch: VideoPatch,
    ) -> StoreResult<Option<Video>> {
        let mut tables = self.tables.lock().await;
        let Some(video) = tables
            .videos
            .iter_mut()
            .find(|v| v.id == video_id && v.user_id == user_id)
        else {
            return Ok(None);
        };

        if patch.product_name.is_some() {
            video.product_name = patch.product_name;
        }
        if patch.product_price.is_some() {
            video.product_price = patch.product_price;
        }
        if patch.product_description.is_some() {
            video.product_description = patch.product_description;
        }
        if patch.video_url.is_some() {
            video.video_url = patch.video_url;
        }
        if patch.thumbnail_url.is_some() {
            video.thumbnail_url = patch.thumbnail_url;
        }
        if patch.caption.is_some() {
            video.caption = patch.caption;
        }
        if patch.hashtags.is_some() {
            video.hashtags = patch.hashtags;
        }
        if let Some(status) = patch.status {
            video.status = status;
        }
        if patch.clear_error || patch.error_message.is_some() {
            video.error_message = patch.error_message;
        }
        video.updated_at = Utc::now();

        Ok(Some(video.clone()))
    }

    async fn begin_processing(
        &self,
        user_id: i64,
        video_id: i64,
        from: &[VideoStatus],
    ) -> StoreResult<Option<Video>> {
        let mut tables = self.tables.lock().await;
        let Some(video) = tables
            .videos
            .iter_mut()
            .find(|v| v.id == video_id && v.user_id == user_id && from.contains(&v.status))
        else {
            return Ok(None);
        };

        video.status = VideoStatus::Processing;
        video.error_message = None;
        video.updated_at = Utc::now();
        Ok(Some(video.clone()))
    }

    async fn delete_video(&self, user_id: i64, video_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.videos.len();
        tables
            .videos
            .retain(|v| !(v.id == video_id && v.user_id == user_id));
        let deleted = tables.videos.len() < before;
        if deleted {
            // Mirrors ON DELETE CASCADE
            tables.queue.retain(|q| q.video_id != video_id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn add_queue_item(&self, item: NewQueueItem) -> StoreResult<QueueItem> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let id = tables.next_id();

        let created = QueueItem {
            id,
            user_id: item.user_id,
            video_id: item.video_id,
            product_url: item.product_url,
            status: QueueStatus::Queued,
            priority: item.priority,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.queue.push(created.clone());
        Ok(created)
    }

    async fn list_queue_items(&self, user_id: i64) -> StoreResult<Vec<QueueItem>> {
        let tables = self.tables.lock().await;
        let mut items: Vec<QueueItem> = tables
            .queue
            .iter()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(queue_order);
        Ok(items)
    }

    async fn delete_queue_item(
        &self,
        user_id: i64,
        item_id: i64,
    ) -> StoreResult<QueueDeleteOutcome> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables
            .queue
            .iter()
            .position(|q| q.id == item_id && q.user_id == user_id)
        else {
            return Ok(QueueDeleteOutcome::NotFound);
        };

        match tables.queue[pos].status {
            QueueStatus::Queued => {
                tables.queue.remove(pos);
                Ok(QueueDeleteOutcome::Deleted)
            }
            other => Ok(QueueDeleteOutcome::NotQueued(other)),
        }
    }

    async fn claim_next_queue_item(&self) -> StoreResult<Option<QueueItem>> {
        let mut tables = self.tables.lock().await;
        let next = tables
            .queue
            .iter_mut()
            .filter(|q| q.status == QueueStatus::Queued)
            .min_by(|a, b| queue_order(a, b));

        Ok(next.map(|item| {
            item.status = QueueStatus::Processing;
            item.error_message = None;
            item.updated_at = Utc::now();
            item.clone()
        }))
    }

    async fn finish_queue_item(
        &self,
        item_id: i64,
        status: QueueStatus,
        error_message: Option<String>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(item) = tables.queue.iter_mut().find(|q| q.id == item_id) {
            item.status = status;
            item.error_message = error_message;
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn queue_stats(&self, user_id: i64) -> StoreResult<QueueStats> {
        let tables = self.tables.lock().await;
        Ok(QueueStats::from_statuses(
            tables
                .queue
                .iter()
                .filter(|q| q.user_id == user_id)
                .map(|q| q.status),
        ))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self, user_id: i64) -> StoreResult<Option<UserSettings>> {
        let tables = self.tables.lock().await;
        Ok(tables.settings.get(&user_id).cloned())
    }

    async fn upsert_settings(
        &self,
        user_id: i64,
        update: SettingsUpdate,
    ) -> StoreResult<UserSettings> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if !tables.settings.contains_key(&user_id) {
            let id = tables.next_id();
            tables.settings.insert(
                user_id,
                UserSettings {
                    id,
                    user_id,
                    hf_token: None,
                    tiktok_client_id: None,
                    tiktok_client_secret: None,
                    tiktok_access_token: None,
                    tiktok_refresh_token: None,
                    tiktok_token_expiry: None,
                    video_length: crate::constants::DEFAULT_VIDEO_LENGTH_SECS,
                    video_quality: VideoQuality::Balanced,
                    default_privacy: PrivacyLevel::PublicToEveryone,
                    enable_comments: true,
                    enable_duets: true,
                    enable_stitch: true,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        let row = tables
            .settings
            .get_mut(&user_id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        if update.hf_token.is_some() {
            row.hf_token = update.hf_token;
        }
        if update.tiktok_client_id.is_some() {
            row.tiktok_client_id = update.tiktok_client_id;
        }
        if update.tiktok_client_secret.is_some() {
            row.tiktok_client_secret = update.tiktok_client_secret;
        }
        if let Some(length) = update.video_length {
            row.video_length = length;
        }
        if let Some(quality) = update.video_quality {
            row.video_quality = quality;
        }
        if let Some(privacy) = update.default_privacy {
            row.default_privacy = privacy;
        }
        if let Some(enabled) = update.enable_comments {
            row.enable_comments = enabled;
        }
        if let Some(enabled) = update.enable_duets {
            row.enable_duets = enabled;
        }
        if let Some(enabled) = update.enable_stitch {
            row.enable_stitch = enabled;
        }
        row.updated_at = now;

        Ok(row.clone())
    }
}

/// Claim order: priority descending, then oldest, then lowest id
fn queue_order(a: &QueueItem, b: &QueueItem) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_video(user_id: i64) -> NewVideo {
        NewVideo {
            user_id,
            product_url: "https://shop.example.com/p/1".to_string(),
            product_name: "Lamp".to_string(),
            product_price: "$10".to_string(),
            product_description: "A lamp".to_string(),
            product_image: None,
        }
    }

    fn new_item(user_id: i64, video_id: i64, priority: i32) -> NewQueueItem {
        NewQueueItem {
            user_id,
            video_id,
            product_url: "https://shop.example.com/p/1".to_string(),
            priority,
        }
    }

    #[tokio::test]
    async fn videos_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let video = store.create_video(new_video(1)).await.unwrap();

        assert!(store.get_video(2, video.id).await.unwrap().is_none());
        assert!(!store.delete_video(2, video.id).await.unwrap());
        assert!(store.get_video(1, video.id).await.unwrap().is_some());
        assert!(store.list_videos(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begin_processing_requires_allowed_status() {
        let store = MemoryStore::new();
        let video = store.create_video(new_video(1)).await.unwrap();

        let started = store
            .begin_processing(1, video.id, &[VideoStatus::Pending])
            .await
            .unwrap();
        assert_eq!(started.map(|v| v.status), Some(VideoStatus::Processing));

        // A second start from pending must not claim it again
        let again = store
            .begin_processing(1, video.id, &[VideoStatus::Pending])
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn claim_honours_priority_then_age() {
        let store = MemoryStore::new();
        let low = store.add_queue_item(new_item(1, 10, 0)).await.unwrap();
        let high = store.add_queue_item(new_item(2, 11, 5)).await.unwrap();

        let first = store.claim_next_queue_item().await.unwrap().unwrap();
        assert_eq!(first.id, high.id);
        assert_eq!(first.status, QueueStatus::Processing);

        let second = store.claim_next_queue_item().await.unwrap().unwrap();
        assert_eq!(second.id, low.id);

        assert!(store.claim_next_queue_item().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_only_removes_queued_items() {
        let store = MemoryStore::new();
        let item = store.add_queue_item(new_item(1, 10, 0)).await.unwrap();
        let other = store.add_queue_item(new_item(1, 11, 0)).await.unwrap();

        assert_eq!(
            store.delete_queue_item(1, item.id).await.unwrap(),
            QueueDeleteOutcome::Deleted
        );
        assert!(
            store
                .list_queue_items(1)
                .await
                .unwrap()
                .iter()
                .all(|q| q.id != item.id)
        );

        store.claim_next_queue_item().await.unwrap();
        assert_eq!(
            store.delete_queue_item(1, other.id).await.unwrap(),
            QueueDeleteOutcome::NotQueued(QueueStatus::Processing)
        );
        assert_eq!(
            store.delete_queue_item(2, other.id).await.unwrap(),
            QueueDeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn queue_stats_total_matches_buckets() {
        let store = MemoryStore::new();
        for video_id in 0..4 {
            store.add_queue_item(new_item(1, video_id, 0)).await.unwrap();
        }
        let claimed = store.claim_next_queue_item().await.unwrap().unwrap();
        store
            .finish_queue_item(claimed.id, QueueStatus::Failed, Some("boom".into()))
            .await
            .unwrap();
        store.claim_next_queue_item().await.unwrap();

        let stats = store.queue_stats(1).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(
            stats.total,
            stats.queued + stats.processing + stats.completed + stats.failed
        );
    }

    #[tokio::test]
    async fn settings_upsert_keeps_unspecified_fields() {
        let store = MemoryStore::new();
        let first = store
            .upsert_settings(
                1,
                SettingsUpdate {
                    hf_token: Some("hf_abc".into()),
                    video_length: Some(15),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.video_quality, VideoQuality::Balanced);

        let second = store
            .upsert_settings(
                1,
                SettingsUpdate {
                    enable_duets: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.hf_token.as_deref(), Some("hf_abc"));
        assert_eq!(second.video_length, 15);
        assert!(!second.enable_duets);
        assert!(second.enable_comments);
    }

    #[tokio::test]
    async fn upsert_user_preserves_role_unless_given() {
        let store = MemoryStore::new();
        let admin = store
            .upsert_user(UpsertUser {
                open_id: "abc".into(),
                role: Some(Role::Admin),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let again = store
            .upsert_user(UpsertUser {
                open_id: "abc".into(),
                name: Some("Ada".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(again.id, admin.id);
        assert_eq!(again.role, Role::Admin);
        assert_eq!(again.name.as_deref(), Some("Ada"));
    }
}
