/// LLM Client: the single point of entry for all completion calls in docpilot.
///
/// ARCHITECTURAL RULE: No other module may talk to the completion service directly.
/// Every call goes through `CompletionClient`, which owns retries, per-attempt
/// timeouts and the cap on outstanding calls.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::prompt::PromptSpec;

pub mod anthropic;
pub mod prompts;
pub mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::AnthropicBackend;
pub use retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited by completion service: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Completion service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Completion request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Completion request rejected: {0}")]
    InvalidRequest(String),
}

impl CompletionError {
    /// Transient failures that the retry policy may absorb.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimited { .. }
                | CompletionError::ServiceUnavailable(_)
                | CompletionError::Timeout(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CompletionError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// What a backend hands back for one successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Model that actually served the request, when the service reports it.
    pub model: Option<String>,
}

/// Raw completion text plus usage metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub text: String,
    pub usage: TokenUsage,
    /// Wall-clock time from first attempt to success, backoff included.
    pub processing_time: Duration,
    pub attempts: u32,
    pub model: String,
}

/// Transport seam for the completion service. `AnthropicBackend` is the
/// production implementation; tests substitute scripted backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn send(&self, spec: &PromptSpec, api_key: &str)
        -> Result<BackendResponse, CompletionError>;
}

/// Explicit client configuration. Built by `Config`, never read from the environment here.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_concurrency: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            max_concurrency: 8,
        }
    }
}

/// The single completion client used by every pipeline in docpilot.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl CompletionClient {
    /// Builds a client that talks to the Anthropic Messages API.
    pub fn new(config: CompletionConfig) -> Result<Self, reqwest::Error> {
        let backend = AnthropicBackend::new(config.api_url.clone())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: CompletionConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            timeout: config.timeout,
            retry: config.retry,
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Completes `spec` with the configured credential.
    pub async fn complete(&self, spec: &PromptSpec) -> Result<CompletionResult, CompletionError> {
        self.complete_with_key(spec, None).await
    }

    /// Completes `spec`, using `api_key` instead of the configured credential when given.
    ///
    /// Retries `RateLimited`, `ServiceUnavailable` and `Timeout` under the retry
    /// policy. Authentication and request errors return after a single attempt.
    pub async fn complete_with_key(
        &self,
        spec: &PromptSpec,
        api_key: Option<&str>,
    ) -> Result<CompletionResult, CompletionError> {
        let key = api_key
            .filter(|k| !k.trim().is_empty())
            .or(self.api_key.as_deref())
            .ok_or_else(|| {
                CompletionError::Authentication("no API key configured".to_string())
            })?;

        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = {
                // Only in-flight attempts hold a permit; backoff sleeps do not.
                let _permit = self.permits.acquire().await.map_err(|_| {
                    CompletionError::ServiceUnavailable("completion client closed".to_string())
                })?;
                match tokio::time::timeout(self.timeout, self.backend.send(spec, key)).await {
                    Ok(result) => result,
                    Err(_) => Err(CompletionError::Timeout(self.timeout)),
                }
            };

            match outcome {
                Ok(response) => {
                    debug!(
                        "Completion succeeded on attempt {}: input_tokens={}, output_tokens={}",
                        attempt, response.usage.input_tokens, response.usage.output_tokens
                    );
                    return Ok(CompletionResult {
                        text: response.text,
                        usage: response.usage,
                        processing_time: started.elapsed(),
                        attempts: attempt,
                        model: response.model.unwrap_or_else(|| spec.model.clone()),
                    });
                }
                Err(e) if e.is_retryable() && self.retry.allows_another_attempt(attempt) => {
                    let delay = self.retry.delay_for(attempt, e.retry_after());
                    warn!(
                        "Completion attempt {}/{} failed ({}), retrying after {}ms",
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("Completion failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

/// Finds a JSON object in a reply that may wrap it in prose.
///
/// Tries the whole text, then the first fenced block, then the span from the
/// first `{` to the last `}`.
pub(crate) fn find_json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    json_object(text)
        .or_else(|| first_fenced_block(text).and_then(json_object))
        .or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            (start < end).then(|| &text[start..=end]).and_then(json_object)
        })
}

fn json_object(candidate: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str(candidate.trim()) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Body of the first ``` block, language tag dropped. An unclosed block runs to the end.
fn first_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")? + 3;
    let rest = &text[open..];
    let rest = rest.find('\n').map_or("", |newline| &rest[newline + 1..]);
    Some(rest.find("```").map_or(rest, |close| &rest[..close]))
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;

    fn spec() -> PromptSpec {
        PromptSpec {
            system_prompt: "system".to_string(),
            user_prompt: "user".to_string(),
            model: "test-model".to_string(),
            temperature: 0.0,
            max_tokens: 64,
        }
    }

    fn client(backend: Arc<ScriptedBackend>) -> CompletionClient {
        let config = CompletionConfig {
            api_key: Some("sk-test".to_string()),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(4, Duration::from_millis(100), Duration::from_secs(1)),
            ..CompletionConfig::default()
        };
        CompletionClient::with_backend(config, backend)
    }

    fn rate_limited() -> CompletionError {
        CompletionError::RateLimited {
            retry_after: None,
            message: "slow down".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success_takes_three_attempts() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok(ScriptedBackend::reply("done")),
        ]));
        let result = client(backend.clone()).complete(&spec()).await.unwrap();

        assert_eq!(result.text, "done");
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls(), 3);
        // 100ms + 200ms of backoff elapsed on the paused clock.
        assert!(result.processing_time >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_error_is_never_retried() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            CompletionError::Authentication("invalid x-api-key".to_string()),
        )));
        let err = client(backend.clone()).complete(&spec()).await.unwrap_err();

        assert!(matches!(err, CompletionError::Authentication(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            CompletionError::InvalidRequest("max_tokens too large".to_string()),
        )));
        let err = client(backend.clone()).complete(&spec()).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_max_attempts() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            CompletionError::ServiceUnavailable("503".to_string()),
        )));
        let err = client(backend.clone()).complete(&spec()).await.unwrap_err();
        assert!(matches!(err, CompletionError::ServiceUnavailable(_)));
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out_each_attempt() {
        let backend = Arc::new(
            ScriptedBackend::repeating(Ok(ScriptedBackend::reply("late")))
                .with_latency(Duration::from_secs(30)),
        );
        let err = client(backend.clone()).complete(&spec()).await.unwrap_err();
        assert_eq!(err, CompletionError::Timeout(Duration::from_secs(5)));
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling_backend() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply("x"))));
        let client = CompletionClient::with_backend(CompletionConfig::default(), backend.clone());
        let err = client.complete(&spec()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Authentication(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_key_override_is_passed_through() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply("x"))));
        let client = client(backend.clone());

        client.complete_with_key(&spec(), Some("sk-user")).await.unwrap();
        client.complete_with_key(&spec(), Some("  ")).await.unwrap();
        assert_eq!(backend.keys_seen(), vec!["sk-user", "sk-test"]);
    }

    #[tokio::test]
    async fn test_model_falls_back_to_spec_model() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply("x"))));
        let result = client(backend).complete(&spec()).await.unwrap();
        assert_eq!(result.model, "test-model");
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_bounds_outstanding_calls() {
        let backend = Arc::new(
            ScriptedBackend::repeating(Ok(ScriptedBackend::reply("ok")))
                .with_latency(Duration::from_millis(50)),
        );
        let config = CompletionConfig {
            api_key: Some("sk-test".to_string()),
            max_concurrency: 2,
            ..CompletionConfig::default()
        };
        let client = CompletionClient::with_backend(config, backend.clone());

        let calls: Vec<_> = (0..6)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.complete(&spec()).await })
            })
            .collect();
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert_eq!(backend.calls(), 6);
        assert_eq!(backend.max_in_flight(), 2);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(rate_limited().is_retryable());
        assert!(CompletionError::ServiceUnavailable(String::new()).is_retryable());
        assert!(CompletionError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!CompletionError::Authentication(String::new()).is_retryable());
        assert!(!CompletionError::InvalidRequest(String::new()).is_retryable());
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_find_json_object_after_preamble() {
        let fenced = "Here is the analysis:\n```json\n{\"key\": \"value\"}\n```\nLet me know.";
        assert_eq!(find_json_object(fenced).unwrap()["key"], "value");

        let bare = "Sure! {\"key\": {\"nested\": 1}} Hope that helps.";
        assert_eq!(find_json_object(bare).unwrap()["key"]["nested"], 1);

        assert!(find_json_object("No braces here, just prose.").is_none());
        assert!(find_json_object("Pick one of {a, b}.").is_none());
        assert!(find_json_object("```json\n[1, 2]\n```").is_none());
    }
}
