use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{
    CompletionConfig, RetryPolicy, DEFAULT_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};

/// Largest upload accepted by the analysis endpoint unless overridden.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub completion_api_url: String,
    pub completion_model: String,
    pub completion_max_tokens: u32,
    pub completion_timeout: Duration,
    pub completion_max_attempts: u32,
    pub completion_backoff_base: Duration,
    pub completion_backoff_max: Duration,
    pub completion_max_concurrency: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let retry = RetryPolicy::default();

        Ok(Config {
            anthropic_api_key: require(&lookup, "ANTHROPIC_API_KEY")?,
            completion_api_url: lookup("COMPLETION_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            completion_model: lookup("COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_max_tokens: parse_or(&lookup, "COMPLETION_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            completion_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COMPLETION_TIMEOUT_SECS",
                60,
            )?),
            completion_max_attempts: parse_or(
                &lookup,
                "COMPLETION_MAX_ATTEMPTS",
                retry.max_attempts,
            )?,
            completion_backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "COMPLETION_BACKOFF_BASE_MS",
                retry.base_delay.as_millis() as u64,
            )?),
            completion_backoff_max: Duration::from_millis(parse_or(
                &lookup,
                "COMPLETION_BACKOFF_MAX_MS",
                retry.max_delay.as_millis() as u64,
            )?),
            completion_max_concurrency: parse_or(&lookup, "COMPLETION_MAX_CONCURRENCY", 8)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Explicit client configuration handed to `CompletionClient::new`.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            api_url: self.completion_api_url.clone(),
            api_key: Some(self.anthropic_api_key.clone()),
            model: self.completion_model.clone(),
            max_tokens: self.completion_max_tokens,
            timeout: self.completion_timeout,
            retry: RetryPolicy::new(
                self.completion_max_attempts,
                self.completion_backoff_base,
                self.completion_backoff_max,
            ),
            max_concurrency: self.completion_max_concurrency,
        }
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
