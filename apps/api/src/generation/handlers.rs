//! Axum route handlers for the Generation API.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::content::{ContentParams, ContentType};
use crate::generation::generator::ContentRequest;
use crate::pipeline::{PipelineError, Stage};
use crate::routes::UsageBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateContentRequest {
    pub content_type: ContentType,
    #[serde(default = "empty_object")]
    pub parameters: Value,
    /// Overrides the configured credential for this request only.
    pub api_key: Option<String>,
    pub variations: Option<u8>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Serialize)]
pub struct GenerateContentResponse {
    pub request_id: Uuid,
    pub content_type: ContentType,
    pub content: String,
    pub variations: Vec<String>,
    pub usage: UsageBody,
    pub model: String,
}

/// POST /api/v1/generate-content
///
/// Generates a LinkedIn post or email reply from typed parameters.
pub async fn handle_generate_content(
    State(state): State<AppState>,
    body: Result<Json<GenerateContentRequest>, JsonRejection>,
) -> Result<Json<GenerateContentResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let content_request = ContentParams::from_value(request.content_type, request.parameters)
        .and_then(|params| ContentRequest::new(params, request.variations))
        .map_err(|e| PipelineError::new(Stage::PromptBuild, e))?;

    let generated = state
        .generator
        .generate(&content_request, request.api_key.as_deref())
        .await?;

    Ok(Json(GenerateContentResponse {
        request_id: generated.request_id,
        content_type: generated.content_type,
        content: generated.content,
        variations: generated.variations,
        usage: generated.usage.into(),
        model: generated.model,
    }))
}
