//! Client for the platform OAuth server

use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::OAUTH_TIMEOUT_SECS;

const EXCHANGE_TOKEN_PATH: &str = "/webdev.v1.WebDevAuthPublicService/ExchangeToken";
const GET_USER_INFO_PATH: &str = "/webdev.v1.WebDevAuthPublicService/GetUserInfo";
const GET_USER_INFO_WITH_JWT_PATH: &str = "/webdev.v1.WebDevAuthPublicService/GetUserInfoWithJwt";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("OAUTH_SERVER_URL is not configured")]
    NotConfigured,
    #[error("invalid OAuth state")]
    InvalidState,
    #[error("OAuth HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OAuth API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("openId missing from user info")]
    MissingOpenId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserInfo {
    #[serde(default)]
    open_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    platforms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthUserInfo {
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
}

impl From<RawUserInfo> for OAuthUserInfo {
    fn from(raw: RawUserInfo) -> Self {
        let login_method = derive_login_method(&raw.platforms, raw.platform.as_deref());
        Self {
            open_id: raw.open_id,
            name: raw.name.filter(|n| !n.is_empty()),
            email: raw.email,
            login_method,
        }
    }
}

/// Pick a login method: explicit platform first, then a known registered platform.
pub fn derive_login_method(platforms: &[String], fallback: Option<&str>) -> Option<String> {
    if let Some(platform) = fallback.filter(|p| !p.is_empty()) {
        return Some(platform.to_string());
    }

    let has = |name: &str| platforms.iter().any(|p| p == name);
    let known = if has("REGISTERED_PLATFORM_EMAIL") {
        Some("email")
    } else if has("REGISTERED_PLATFORM_GOOGLE") {
        Some("google")
    } else if has("REGISTERED_PLATFORM_APPLE") {
        Some("apple")
    } else if has("REGISTERED_PLATFORM_MICROSOFT") || has("REGISTERED_PLATFORM_AZURE") {
        Some("microsoft")
    } else if has("REGISTERED_PLATFORM_GITHUB") {
        Some("github")
    } else {
        None
    };

    known
        .map(str::to_string)
        .or_else(|| platforms.first().map(|p| p.to_lowercase()))
}

/// The OAuth `state` parameter is the base64-encoded redirect URI
pub fn decode_state(state: &str) -> Result<String, OAuthError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(state)
        .map_err(|_| OAuthError::InvalidState)?;
    String::from_utf8(bytes).map_err(|_| OAuthError::InvalidState)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeTokenRequest<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: String,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    base_url: String,
    app_id: String,
}

impl OAuthClient {
    pub fn new(http: Client, base_url: &str, app_id: &str) -> Self {
        if base_url.is_empty() {
            tracing::error!("[oauth] OAUTH_SERVER_URL is not configured");
        }
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
        }
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, OAuthError> {
        if self.base_url.is_empty() {
            return Err(OAuthError::NotConfigured);
        }

        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .timeout(Duration::from_secs(OAUTH_TIMEOUT_SECS))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<TokenResponse, OAuthError> {
        let body = ExchangeTokenRequest {
            client_id: &self.app_id,
            grant_type: "authorization_code",
            code,
            redirect_uri: decode_state(state)?,
        };
        self.post(EXCHANGE_TOKEN_PATH, &body).await
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<OAuthUserInfo, OAuthError> {
        let raw: RawUserInfo = self
            .post(
                GET_USER_INFO_PATH,
                &serde_json::json!({ "accessToken": access_token }),
            )
            .await?;
        Self::checked(raw)
    }

    /// Look up a user from one of our own session tokens
    pub async fn get_user_info_with_jwt(&self, jwt: &str) -> Result<OAuthUserInfo, OAuthError> {
        let raw: RawUserInfo = self
            .post(
                GET_USER_INFO_WITH_JWT_PATH,
                &serde_json::json!({ "jwtToken": jwt, "projectId": self.app_id }),
            )
            .await?;
        Self::checked(raw)
    }

    fn checked(raw: RawUserInfo) -> Result<OAuthUserInfo, OAuthError> {
        if raw.open_id.is_empty() {
            return Err(OAuthError::MissingOpenId);
        }
        Ok(raw.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn login_method_derivation() {
        assert_eq!(
            derive_login_method(&strings(&["REGISTERED_PLATFORM_GOOGLE"]), Some("apple")),
            Some("apple".into())
        );
        assert_eq!(
            derive_login_method(
                &strings(&["REGISTERED_PLATFORM_GITHUB", "REGISTERED_PLATFORM_EMAIL"]),
                None
            ),
            Some("email".into())
        );
        assert_eq!(
            derive_login_method(&strings(&["REGISTERED_PLATFORM_AZURE"]), None),
            Some("microsoft".into())
        );
        assert_eq!(
            derive_login_method(&strings(&["WECHAT"]), Some("")),
            Some("wechat".into())
        );
        assert_eq!(derive_login_method(&[], None), None);
    }

    #[test]
    fn state_is_base64_redirect_uri() {
        let state = base64::engine::general_purpose::STANDARD.encode("https://app.example.com/cb");
        assert_eq!(decode_state(&state).unwrap(), "https://app.example.com/cb");
        assert!(matches!(decode_state("%%%"), Err(OAuthError::InvalidState)));
    }

    #[tokio::test]
    async fn exchange_then_user_info() {
        let server = MockServer::start().await;
        let state = base64::engine::general_purpose::STANDARD.encode("https://app.example.com/cb");

        Mock::given(method("POST"))
            .and(path(EXCHANGE_TOKEN_PATH))
            .and(body_json(json!({
                "clientId": "app-1",
                "grantType": "authorization_code",
                "code": "c0de",
                "redirectUri": "https://app.example.com/cb"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "at-1", "tokenType": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GET_USER_INFO_PATH))
            .and(body_json(json!({ "accessToken": "at-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "openId": "open-1",
                "name": "Ada",
                "email": "ada@example.com",
                "platforms": ["REGISTERED_PLATFORM_GOOGLE"]
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(Client::new(), &server.uri(), "app-1");
        let token = client.exchange_code("c0de", &state).await.unwrap();
        let info = client.get_user_info(&token.access_token).await.unwrap();

        assert_eq!(info.open_id, "open-1");
        assert_eq!(info.login_method.as_deref(), Some("google"));
    }

    #[tokio::test]
    async fn missing_open_id_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GET_USER_INFO_WITH_JWT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x" })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(Client::new(), &server.uri(), "app-1");
        let err = client.get_user_info_with_jwt("jwt").await.unwrap_err();
        assert!(matches!(err, OAuthError::MissingOpenId));
    }
}
