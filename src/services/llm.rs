//! Chat-completion client for the hosted LLM endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_TOKENS: u32 = 32768;
const THINKING_BUDGET_TOKENS: u32 = 128;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    NotConfigured,
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM invoke failed: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("LLM returned no text content")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Anything that can turn a conversation into a single text reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct Thinking {
    budget_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    thinking: Thinking,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
}

/// Extract the reply text: either a plain string or the first text part of an array.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => parts.iter().find_map(|part| match part {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }),
        _ => None,
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;

        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: MAX_TOKENS,
            thinking: Thinking {
                budget_tokens: THINKING_BUDGET_TOKENS,
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .first()
            .and_then(|choice| content_text(&choice.message.content))
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LlmClient {
        LlmClient::new(Client::new(), &server.uri(), Some("key".into()), "test-model")
    }

    #[test]
    fn reads_string_or_first_text_part() {
        assert_eq!(content_text(&json!("hello")).as_deref(), Some("hello"));
        assert_eq!(
            content_text(&json!([{ "type": "text", "text": "part one" }, { "type": "text", "text": "two" }]))
                .as_deref(),
            Some("part one")
        );
        assert_eq!(content_text(&json!(null)), None);
    }

    #[tokio::test]
    async fn sends_budget_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 32768,
                "thinking": { "budget_tokens": 128 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Buy it now" } }]
            })))
            .mount(&server)
            .await;

        let reply = client(&server)
            .complete(vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "Buy it now");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_request() {
        let client = LlmClient::new(Client::new(), "http://127.0.0.1:9", None, "m");
        let err = client.complete(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
