//! OAuth callback endpoints (/api/oauth/*)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::auth::UserResponse;
use crate::AppState;
use crate::models::User;
use crate::services::{auth, cookies, session};

pub fn routes() -> Router<Arc<AppState>> {
    // 5 requests burst per IP, then one every 12 seconds
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish();

    match rate_limit_config {
        Some(config) => router().layer(GovernorLayer {
            config: config.into(),
        }),
        None => {
            tracing::error!("[oauth] invalid rate limit config, serving without rate limiting");
            router()
        }
    }
}

fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/oauth/callback", get(callback))
        .route("/api/oauth/mobile", get(mobile_callback))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Exchange the code, sync the user, and mint a session token
async fn complete_login(state: &AppState, code: &str, oauth_state: &str) -> Result<(User, String), String> {
    let token = state
        .oauth
        .exchange_code(code, oauth_state)
        .await
        .map_err(|e| e.to_string())?;
    let info = state
        .oauth
        .get_user_info(&token.access_token)
        .await
        .map_err(|e| e.to_string())?;
    let user = auth::sync_user(state, &info).await.map_err(|e| e.to_string())?;

    let name = user.name.clone().unwrap_or_else(|| user.open_id.clone());
    let session_token = session::create_session_token(
        &user.open_id,
        &state.config.app_id,
        &name,
        None,
        &state.config.jwt_secret,
    )
    .map_err(|e| e.to_string())?;

    Ok((user, session_token))
}

fn required(params: &CallbackParams) -> Option<(&str, &str)> {
    let code = params.code.as_deref().filter(|c| !c.is_empty())?;
    let state = params.state.as_deref().filter(|s| !s.is_empty())?;
    Some((code, state))
}

/// GET /api/oauth/callback - web login; sets the cookie and redirects to the app
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some((code, oauth_state)) = required(&params) else {
        return error(StatusCode::BAD_REQUEST, "code and state are required");
    };

    let (user, token) = match complete_login(&state, code, oauth_state).await {
        Ok(done) => done,
        Err(e) => {
            tracing::error!(error = %e, "[oauth] callback failed");
            return error(StatusCode::INTERNAL_SERVER_ERROR, "OAuth callback failed");
        }
    };

    let cookie = match cookies::build_session_cookie(&token, state.config.secure_cookies) {
        Ok(cookie) => cookie,
        Err(status) => return status.into_response(),
    };

    tracing::info!(user_id = user.id, "[oauth] web login complete");
    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    match state.config.frontend_url.parse() {
        Ok(location) => {
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(_) => error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid frontend URL"),
    }
}

/// GET /api/oauth/mobile - native login; returns the token in the body
async fn mobile_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some((code, oauth_state)) = required(&params) else {
        return error(StatusCode::BAD_REQUEST, "code and state are required");
    };

    match complete_login(&state, code, oauth_state).await {
        Ok((user, token)) => {
            tracing::info!(user_id = user.id, "[oauth] mobile login complete");
            let body = Json(json!({
                "app_session_id": token,
                "user": UserResponse::from(&user),
            }));
            match cookies::build_session_cookie(&token, state.config.secure_cookies) {
                Ok(cookie) => ([(SET_COOKIE, cookie)], body).into_response(),
                Err(status) => status.into_response(),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "[oauth] mobile exchange failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to exchange OAuth token")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::Config;
    use crate::test_support::{body_json, test_state_with};

    #[tokio::test]
    async fn missing_code_is_rejected() {
        let app = router().with_state(crate::test_support::test_state());
        let response = app
            .oneshot(Request::get("/api/oauth/mobile?state=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mobile_login_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webdev.v1.WebDevAuthPublicService/ExchangeToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "at" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webdev.v1.WebDevAuthPublicService/GetUserInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "openId": "owner-open-id",
                "name": "Owner",
                "platforms": ["REGISTERED_PLATFORM_GOOGLE"],
            })))
            .mount(&server)
            .await;

        let config = Config {
            oauth_server_url: server.uri(),
            ..Config::for_tests()
        };
        let state = test_state_with(config);
        let app = router().with_state(state.clone());

        let redirect = base64::engine::general_purpose::STANDARD.encode("tikagent://oauth");
        let response = app
            .oneshot(
                Request::get(format!("/api/oauth/mobile?code=c1&state={}", redirect))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_some());

        let body = body_json(response).await;
        assert_eq!(body["user"]["openId"], "owner-open-id");
        assert_eq!(body["user"]["loginMethod"], "google");

        let token = body["app_session_id"].as_str().unwrap();
        let claims = session::verify_session_token(token, b"test-secret").unwrap();
        assert_eq!(claims.name, "Owner");
        assert_eq!(claims.app_id, "test-app");

        let user = state
            .store
            .get_user_by_open_id("owner-open-id")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, crate::models::Role::Admin);
    }
}
