//! Session tokens: HS256 JWTs carrying the user's open id

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::constants::SESSION_MAX_AGE_SECS;

/// JWT claims for session tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub open_id: String,
    pub app_id: String,
    pub name: String,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    Expired,
    #[error("Session payload missing required fields")]
    MissingFields,
    #[error("Failed to sign session: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Create a session token for `open_id`, valid for `ttl` (one year when `None`)
pub fn create_session_token(
    open_id: &str,
    app_id: &str,
    name: &str,
    ttl: Option<Duration>,
    secret: &[u8],
) -> Result<String, SessionError> {
    let ttl = ttl.unwrap_or_else(|| Duration::seconds(SESSION_MAX_AGE_SECS));
    let claims = SessionClaims {
        open_id: open_id.to_string(),
        app_id: app_id.to_string(),
        name: name.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

/// Verify a session token and return its claims
pub fn verify_session_token(token: &str, secret: &[u8]) -> Result<SessionClaims, SessionError> {
    // HS256 only, to prevent algorithm confusion
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken,
        })?;

    let claims = data.claims;
    if claims.open_id.is_empty() || claims.app_id.is_empty() || claims.name.is_empty() {
        return Err(SessionError::MissingFields);
    }

    Ok(claims)
}
