//! Cookie building utilities for session management
//!
//! The session cookie is read cross-site by the mobile web preview, so it is
//! always `SameSite=None`; `Secure` is added in production.

use axum::http::{HeaderValue, StatusCode};

use crate::constants::{COOKIE_NAME, SESSION_MAX_AGE_SECS};

/// Build the session Set-Cookie header value
pub fn build_session_cookie(token: &str, secure: bool) -> Result<HeaderValue, StatusCode> {
    let secure = if secure { " Secure;" } else { "" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=None; Path=/; Max-Age={}",
        COOKIE_NAME, token, secure, SESSION_MAX_AGE_SECS
    );
    cookie.parse().map_err(|_| {
        tracing::error!("Failed to parse session cookie header");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build a Set-Cookie header that clears the session cookie
pub fn build_clear_session_cookie(secure: bool) -> HeaderValue {
    let secure = if secure { " Secure;" } else { "" };
    HeaderValue::from_str(&format!(
        "{}=; HttpOnly;{} SameSite=None; Path=/; Max-Age=0",
        COOKIE_NAME, secure
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("app_session_id=; Path=/; Max-Age=0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let cookie = build_session_cookie("tok", true).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("app_session_id=tok;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
        assert!(value.contains("SameSite=None"));
        assert!(value.contains("Max-Age=31536000"));
    }

    #[test]
    fn dev_cookie_is_not_secure() {
        let cookie = build_session_cookie("tok", false).unwrap();
        assert!(!cookie.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = build_clear_session_cookie(false);
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }
}
