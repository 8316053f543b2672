//! Request authentication: session token -> local user

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::AppState;
use crate::constants::COOKIE_NAME;
use crate::models::{Role, UpsertUser, User};
use crate::services::oauth::{OAuthError, OAuthUserInfo};
use crate::services::session::{self, SessionError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to sync user info: {0}")]
    Sync(#[from] OAuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session token from `Authorization: Bearer` or the session cookie, bearer first
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(COOKIE_NAME)
            .map(|c| c.value().to_string())
    })
}

/// Upsert a user from OAuth profile data. The configured owner becomes admin.
pub async fn sync_user(state: &AppState, info: &OAuthUserInfo) -> Result<User, StoreError> {
    let is_owner = state.config.owner_open_id.as_deref() == Some(info.open_id.as_str());

    state
        .store
        .upsert_user(UpsertUser {
            open_id: info.open_id.clone(),
            name: info.name.clone(),
            email: info.email.clone(),
            login_method: info.login_method.clone(),
            role: is_owner.then_some(Role::Admin),
            last_signed_in: Some(Utc::now()),
        })
        .await
}

/// Verify the session token and resolve the local user.
///
/// Unknown open ids are fetched from the OAuth server and created. Every
/// successful call stamps `last_signed_in`.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AuthError> {
    let claims = session::verify_session_token(token, &state.config.jwt_secret)?;

    if state.store.get_user_by_open_id(&claims.open_id).await?.is_none() {
        let info = state.oauth.get_user_info_with_jwt(token).await?;
        sync_user(state, &info).await?;
    }

    let user = state
        .store
        .upsert_user(UpsertUser {
            open_id: claims.open_id,
            last_signed_in: Some(Utc::now()),
            ..Default::default()
        })
        .await?;

    Ok(user)
}
