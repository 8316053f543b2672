//! User domain - DB queries for users
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use chrono::Utc;
use sqlx::{Executor, Postgres};

use crate::models::{UpsertUser, User};

const USER_COLUMNS: &str =
    "id, open_id, name, email, login_method, role, created_at, updated_at, last_signed_in";

pub async fn get_user_by_open_id<'e, E>(
    executor: E,
    open_id: &str,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE open_id = $1",
        USER_COLUMNS
    ))
    .bind(open_id)
    .fetch_optional(executor)
    .await
}

pub async fn get_user_by_id<'e, E>(executor: E, user_id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Insert or update a user keyed by open id.
///
/// Optional fields left as `None` keep the stored value. A new row without an
/// explicit role is created as `user`.
pub async fn upsert_user<'e, E>(executor: E, user: &UpsertUser) -> Result<User, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let last_signed_in = user.last_signed_in.unwrap_or_else(Utc::now);

    sqlx::query_as(&format!(
        r#"
        INSERT INTO users (open_id, name, email, login_method, role, last_signed_in)
        VALUES ($1, $2, $3, $4, COALESCE($5, 'user'), $6)
        ON CONFLICT (open_id) DO UPDATE SET
            name = COALESCE(EXCLUDED.name, users.name),
            email = COALESCE(EXCLUDED.email, users.email),
            login_method = COALESCE(EXCLUDED.login_method, users.login_method),
            role = COALESCE($5, users.role),
            last_signed_in = EXCLUDED.last_signed_in
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&user.open_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.login_method)
    .bind(user.role)
    .bind(last_signed_in)
    .fetch_one(executor)
    .await
}
