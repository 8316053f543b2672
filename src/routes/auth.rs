//! Session endpoints and the request extractors that resolve the caller

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::SET_COOKIE, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::rpc::{Rpc, Success};
use crate::AppState;
use crate::models::{Role, User};
use crate::services::auth::{self, AuthError};
use crate::services::cookies;
use crate::services::error::AppError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trpc/auth.me", get(rpc_me))
        .route("/api/trpc/auth.logout", post(rpc_logout))
        .route("/api/auth/me", get(get_me))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", post(establish_session))
}

// ============================================================================
// Extractors
// ============================================================================

/// Resolve the caller from the request headers. Missing or invalid sessions
/// are `None`; only store failures are errors.
async fn resolve_user(headers: &HeaderMap, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(token) = auth::session_token(headers) else {
        return Ok(None);
    };

    match auth::authenticate(state, &token).await {
        Ok(user) => Ok(Some(user)),
        Err(AuthError::Store(e)) => Err(AppError::Store(e)),
        Err(e) => {
            tracing::debug!(error = %e, "[auth] session rejected");
            Ok(None)
        }
    }
}

/// Signed-in caller; rejects with 401 otherwise
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(&parts.headers, state)
            .await?
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Caller if signed in
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(&parts.headers, state).await?))
    }
}

/// Signed-in admin; 401 without a session, 403 for other roles
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

// ============================================================================
// Responses
// ============================================================================

/// User fields exposed to the mobile client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub last_signed_in: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            open_id: u.open_id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            login_method: u.login_method.clone(),
            last_signed_in: u.last_signed_in,
        }
    }
}

fn with_cookie(mut response: Response, cookie: axum::http::HeaderValue) -> Response {
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

// ============================================================================
// Handlers
// ============================================================================

/// auth.me - the caller, or null
async fn rpc_me(MaybeUser(user): MaybeUser) -> Rpc<Option<User>> {
    Rpc(user)
}

/// auth.logout - clear the session cookie
async fn rpc_logout(State(state): State<Arc<AppState>>) -> Response {
    with_cookie(
        Success::ok().into_response(),
        cookies::build_clear_session_cookie(state.config.secure_cookies),
    )
}

/// GET /api/auth/me
async fn get_me(MaybeUser(user): MaybeUser) -> Response {
    match user {
        Some(user) => Json(json!({ "user": UserResponse::from(&user) })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated", "user": null })),
        )
            .into_response(),
    }
}

/// POST /api/auth/logout
async fn logout(State(state): State<Arc<AppState>>) -> Response {
    with_cookie(
        Json(json!({ "success": true })).into_response(),
        cookies::build_clear_session_cookie(state.config.secure_cookies),
    )
}

/// POST /api/auth/session - exchange a bearer token for the session cookie
async fn establish_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let user = auth::authenticate(&state, token).await.map_err(|e| match e {
        AuthError::Store(e) => {
            tracing::error!(error = %e, "[auth] store error during session exchange");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        other => {
            tracing::debug!(error = %other, "[auth] bearer token rejected");
            StatusCode::UNAUTHORIZED
        }
    })?;

    let cookie = cookies::build_session_cookie(token, state.config.secure_cookies)?;
    Ok(with_cookie(
        Json(json!({ "success": true, "user": UserResponse::from(&user) })).into_response(),
        cookie,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::test_support::{body_json, signed_in, test_state};

    #[tokio::test]
    async fn rpc_me_is_null_without_session() {
        let state = test_state();
        let app = routes().with_state(state);

        let response = app
            .oneshot(Request::get("/api/trpc/auth.me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"]["data"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn me_returns_signed_in_user() {
        let state = test_state();
        let (user, token) = signed_in(&state, "open-1").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["id"], user.id);
        assert_eq!(body["user"]["openId"], "open-1");
    }

    #[tokio::test]
    async fn me_without_session_is_401() {
        let app = routes().with_state(test_state());
        let response = app
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_exchange_sets_cookie() {
        let state = test_state();
        let (_, token) = signed_in(&state, "open-2").await;
        let app = routes().with_state(state);

        let response = app
            .oneshot(
                Request::post("/api/auth/session")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("app_session_id={};", token)));
    }

    #[tokio::test]
    async fn session_exchange_requires_bearer() {
        let app = routes().with_state(test_state());
        let response = app
            .oneshot(Request::post("/api/auth/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let app = routes().with_state(test_state());
        let response = app
            .oneshot(Request::post("/api/trpc/auth.logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert_eq!(body_json(response).await["result"]["data"]["success"], true);
    }
}
