pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::analysis::handlers::handle_analyze_document;
use crate::generation::handlers::handle_generate_content;
use crate::llm_client::TokenUsage;
use crate::state::AppState;

/// Token usage as reported in every response body.
#[derive(Debug, Serialize)]
pub struct UsageBody {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl From<TokenUsage> for UsageBody {
    fn from(usage: TokenUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/analyze-document",
            post(handle_analyze_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/generate-content", post(handle_generate_content))
        .with_state(state)
}
