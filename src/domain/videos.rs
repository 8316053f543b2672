//! Video domain - DB queries for generated video records
//!
//! Every read and write is scoped by `user_id` so one user can never touch
//! another user's rows.

use sqlx::{Executor, Postgres};

use crate::models::{NewVideo, Video, VideoPatch, VideoStatus};

const VIDEO_COLUMNS: &str = r#"
    id, user_id, product_url, product_name, product_image, product_price,
    product_description, video_url, thumbnail_url, caption, hashtags, status,
    tiktok_post_id, error_message, created_at, updated_at
"#;

pub async fn create_video<'e, E>(executor: E, video: &NewVideo) -> Result<Video, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO videos
            (user_id, product_url, product_name, product_price, product_description, product_image, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING {}
        "#,
        VIDEO_COLUMNS
    ))
    .bind(video.user_id)
    .bind(&video.product_url)
    .bind(&video.product_name)
    .bind(&video.product_price)
    .bind(&video.product_description)
    .bind(&video.product_image)
    .fetch_one(executor)
    .await
}

pub async fn get_video<'e, E>(
    executor: E,
    user_id: i64,
    video_id: i64,
) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM videos WHERE id = $1 AND user_id = $2",
        VIDEO_COLUMNS
    ))
    .bind(video_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// List a user's videos, newest first
pub async fn list_videos<'e, E>(executor: E, user_id: i64) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM videos WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        VIDEO_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Apply a partial update. Returns `None` when the row does not exist for this user.
pub async fn update_video<'e, E>(
    executor: E,
    user_id: i64,
    video_id: i64,
    patch: &VideoPatch,
) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE videos SET
            product_name = COALESCE($3, product_name),
            product_price = COALESCE($4, product_price),
            product_description = COALESCE($5, product_description),
            video_url = COALESCE($6, video_url),
            thumbnail_url = COALESCE($7, thumbnail_url),
            caption = COALESCE($8, caption),
            hashtags = COALESCE($9, hashtags),
            status = COALESCE($10, status),
            error_message = CASE WHEN $11 THEN $12 ELSE COALESCE($12, error_message) END
        WHERE id = $1 AND user_id = $2
        RETURNING {}
        "#,
        VIDEO_COLUMNS
    ))
    .bind(video_id)
    .bind(user_id)
    .bind(&patch.product_name)
    .bind(&patch.product_price)
    .bind(&patch.product_description)
    .bind(&patch.video_url)
    .bind(&patch.thumbnail_url)
    .bind(&patch.caption)
    .bind(&patch.hashtags)
    .bind(patch.status)
    .bind(patch.clear_error)
    .bind(&patch.error_message)
    .fetch_optional(executor)
    .await
}

/// Move a video into `processing` only if its current status is one of `from`.
///
/// Returns `None` when the row is missing or its status did not match, so two
/// concurrent renders of the same video cannot both start.
pub async fn begin_processing<'e, E>(
    executor: E,
    user_id: i64,
    video_id: i64,
    from: &[VideoStatus],
) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();

    sqlx::query_as(&format!(
        r#"
        UPDATE videos
        SET status = 'processing', error_message = NULL
        WHERE id = $1 AND user_id = $2 AND status = ANY($3)
        RETURNING {}
        "#,
        VIDEO_COLUMNS
    ))
    .bind(video_id)
    .bind(user_id)
    .bind(&from)
    .fetch_optional(executor)
    .await
}

pub async fn delete_video<'e, E>(executor: E, user_id: i64, video_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM videos WHERE id = $1 AND user_id = $2")
        .bind(video_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
