//! Queue domain - DB queries for deferred generation requests

use sqlx::{Executor, Postgres};

use crate::models::{NewQueueItem, QueueItem, QueueStats, QueueStatus};

const QUEUE_COLUMNS: &str =
    "id, user_id, video_id, product_url, status, priority, error_message, created_at, updated_at";

pub async fn add_item<'e, E>(executor: E, item: &NewQueueItem) -> Result<QueueItem, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        INSERT INTO video_queue (user_id, video_id, product_url, priority, status)
        VALUES ($1, $2, $3, $4, 'queued')
        RETURNING {}
        "#,
        QUEUE_COLUMNS
    ))
    .bind(item.user_id)
    .bind(item.video_id)
    .bind(&item.product_url)
    .bind(item.priority)
    .fetch_one(executor)
    .await
}

/// A user's queue items, highest priority first then oldest first
pub async fn list_items<'e, E>(executor: E, user_id: i64) -> Result<Vec<QueueItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        SELECT {} FROM video_queue
        WHERE user_id = $1
        ORDER BY priority DESC, created_at ASC, id ASC
        "#,
        QUEUE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn get_item<'e, E>(
    executor: E,
    user_id: i64,
    item_id: i64,
) -> Result<Option<QueueItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM video_queue WHERE id = $1 AND user_id = $2",
        QUEUE_COLUMNS
    ))
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Delete an item only while it is still `queued`. Returns whether a row was removed.
pub async fn delete_queued_item<'e, E>(
    executor: E,
    user_id: i64,
    item_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "DELETE FROM video_queue WHERE id = $1 AND user_id = $2 AND status = 'queued'",
    )
    .bind(item_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically claim the next queued item across all users.
///
/// The row lock plus `SKIP LOCKED` lets any number of workers poll at once
/// without two of them claiming the same item.
pub async fn claim_next<'e, E>(executor: E) -> Result<Option<QueueItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        r#"
        UPDATE video_queue
        SET status = 'processing', error_message = NULL
        WHERE id = (
            SELECT id FROM video_queue
            WHERE status = 'queued'
            ORDER BY priority DESC, created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING {}
        "#,
        QUEUE_COLUMNS
    ))
    .fetch_optional(executor)
    .await
}

pub async fn finish_item<'e, E>(
    executor: E,
    item_id: i64,
    status: QueueStatus,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE video_queue SET status = $2, error_message = $3 WHERE id = $1")
        .bind(item_id)
        .bind(status)
        .bind(error_message)
        .execute(executor)
        .await?;

    Ok(())
}

pub async fn stats<'e, E>(executor: E, user_id: i64) -> Result<QueueStats, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'queued') AS queued,
            COUNT(*) FILTER (WHERE status = 'processing') AS processing,
            COUNT(*) FILTER (WHERE status = 'completed') AS completed,
            COUNT(*) FILTER (WHERE status = 'failed') AS failed
        FROM video_queue
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}
