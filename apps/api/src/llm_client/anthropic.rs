//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::{BackendResponse, CompletionBackend, CompletionError, TokenUsage};
use crate::prompt::PromptSpec;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Anthropic's "overloaded" status; treated like a 503.
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Talks to the Messages API over HTTPS. Retries and timeouts live in
/// `CompletionClient`; this type maps exactly one HTTP exchange.
#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    api_url: String,
}

impl AnthropicBackend {
    pub fn new(api_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()?,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    async fn send(
        &self,
        spec: &PromptSpec,
        api_key: &str,
    ) -> Result<BackendResponse, CompletionError> {
        let request_body = AnthropicRequest {
            model: &spec.model,
            max_tokens: spec.max_tokens,
            temperature: spec.temperature,
            system: &spec.system_prompt,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &spec.user_prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CompletionError::ServiceUnavailable(format!("transport error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            warn!("Completion API returned {}: {}", status, body);
            return Err(map_error_status(status, retry_after, error_message(&body)));
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            CompletionError::InvalidRequest(format!("undecodable completion response: {e}"))
        })?;

        let text = parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                CompletionError::InvalidRequest("completion contained no text".to_string())
            })?
            .to_string();

        Ok(BackendResponse {
            text,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
            model: parsed.model,
        })
    }
}

fn map_error_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> CompletionError {
    match status.as_u16() {
        401 | 403 => CompletionError::Authentication(message),
        429 => CompletionError::RateLimited {
            retry_after,
            message,
        },
        STATUS_OVERLOADED => CompletionError::ServiceUnavailable(message),
        _ if status.is_server_error() => CompletionError::ServiceUnavailable(message),
        code => CompletionError::InvalidRequest(format!("status {code}: {message}")),
    }
}

/// Prefers the API's structured error message, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<AnthropicError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Reads `Retry-After` in its delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn spec() -> PromptSpec {
        PromptSpec {
            system_prompt: "You are terse.".to_string(),
            user_prompt: "Summarize: revenue grew 4%".to_string(),
            model: "claude-test".to_string(),
            temperature: 0.2,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_success_maps_text_usage_and_model() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "sk-test")
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json_body(json!({
                        "model": "claude-test",
                        "max_tokens": 256,
                        "temperature": 0.2,
                        "system": "You are terse.",
                        "messages": [{"role": "user", "content": "Summarize: revenue grew 4%"}]
                    }));
                then.status(200).json_body(json!({
                    "model": "claude-test-20250101",
                    "content": [{"type": "text", "text": "Revenue grew 4%."}],
                    "usage": {"input_tokens": 21, "output_tokens": 6}
                }));
            })
            .await;

        let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
        let response = backend.send(&spec(), "sk-test").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Revenue grew 4%.");
        assert_eq!(response.usage.input_tokens, 21);
        assert_eq!(response.usage.output_tokens, 6);
        assert_eq!(response.model.as_deref(), Some("claude-test-20250101"));
    }

    #[tokio::test]
    async fn test_401_is_authentication_error_with_api_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(401).json_body(json!({
                    "type": "error",
                    "error": {"type": "authentication_error", "message": "invalid x-api-key"}
                }));
            })
            .await;

        let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
        let err = backend.send(&spec(), "bad").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Authentication("invalid x-api-key".to_string())
        );
    }

    #[tokio::test]
    async fn test_429_carries_retry_after() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429).header("retry-after", "7").body("rate limited");
            })
            .await;

        let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
        let err = backend.send(&spec(), "sk-test").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::RateLimited {
                retry_after: Some(Duration::from_secs(7)),
                message: "rate limited".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_overloaded_and_5xx_are_service_unavailable() {
        for status in [500, 503, 529] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path("/v1/messages");
                    then.status(status).body("busy");
                })
                .await;

            let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
            let err = backend.send(&spec(), "sk-test").await.unwrap_err();
            assert!(
                matches!(err, CompletionError::ServiceUnavailable(_)),
                "status {status} mapped to {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_400_is_invalid_request() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(400).json_body(json!({
                    "error": {"type": "invalid_request_error", "message": "max_tokens: too large"}
                }));
            })
            .await;

        let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
        let err = backend.send(&spec(), "sk-test").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::InvalidRequest("status 400: max_tokens: too large".to_string())
        );
    }

    #[tokio::test]
    async fn test_response_without_text_block_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({
                    "content": [{"type": "tool_use"}],
                    "usage": {"input_tokens": 3, "output_tokens": 0}
                }));
            })
            .await;

        let backend = AnthropicBackend::new(server.url("/v1/messages")).unwrap();
        let err = backend.send(&spec(), "sk-test").await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_service_unavailable() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let backend = AnthropicBackend::new("http://127.0.0.1:9/v1/messages").unwrap();
        let err = backend.send(&spec(), "sk-test").await.unwrap_err();
        assert!(matches!(err, CompletionError::ServiceUnavailable(_)));
    }
}
