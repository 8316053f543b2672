//! Settings domain - per-user preferences

use sqlx::{Executor, Postgres};

use crate::models::{SettingsUpdate, UserSettings};

const SETTINGS_COLUMNS: &str = r#"
    id, user_id, hf_token, tiktok_client_id, tiktok_client_secret,
    tiktok_access_token, tiktok_refresh_token, tiktok_token_expiry,
    video_length, video_quality, default_privacy,
    enable_comments, enable_duets, enable_stitch, created_at, updated_at
"#;

pub async fn get_settings<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<UserSettings>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM user_settings WHERE user_id = $1",
        SETTINGS_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Single-statement upsert keyed by user id.
///
/// On insert, unspecified fields take the column defaults; on conflict they
/// keep the stored value.
pub async fn upsert_settings<'e, E>(
    executor: E,
    user_id: i64,
    update: &SettingsUpdate,
) -> Result<UserSettings, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO user_settings (
            user_id, hf_token, tiktok_client_id, tiktok_client_secret,
            video_length, video_quality, default_privacy,
            enable_comments, enable_duets, enable_stitch
        )
        VALUES (
            $1, $2, $3, $4,
            COALESCE($5, 8), COALESCE($6, 'balanced'), COALESCE($7, 'PUBLIC_TO_EVERYONE'),
            COALESCE($8, TRUE), COALESCE($9, TRUE), COALESCE($10, TRUE)
        )
        ON CONFLICT (user_id) DO UPDATE SET
            hf_token = COALESCE($2, user_settings.hf_token),
            tiktok_client_id = COALESCE($3, user_settings.tiktok_client_id),
            tiktok_client_secret = COALESCE($4, user_settings.tiktok_client_secret),
            video_length = COALESCE($5, user_settings.video_length),
            video_quality = COALESCE($6, user_settings.video_quality),
            default_privacy = COALESCE($7, user_settings.default_privacy),
            enable_comments = COALESCE($8, user_settings.enable_comments),
            enable_duets = COALESCE($9, user_settings.enable_duets),
            enable_stitch = COALESCE($10, user_settings.enable_stitch)
        RETURNING {}
        "#,
        SETTINGS_COLUMNS
    ))
    .bind(user_id)
    .bind(&update.hf_token)
    .bind(&update.tiktok_client_id)
    .bind(&update.tiktok_client_secret)
    .bind(update.video_length)
    .bind(update.video_quality)
    .bind(update.default_privacy)
    .bind(update.enable_comments)
    .bind(update.enable_duets)
    .bind(update.enable_stitch)
    .fetch_one(executor)
    .await
}
