//! Content Generator: LinkedIn posts and email replies.
//!
//! Flow: render prompt → complete → parse `{content, variations}`.
//! Shares the completion client (and therefore its retry policy and
//! concurrency cap) with document analysis. Failures are tagged with the
//! same stages the analysis pipeline uses.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::structurer::StructureError;
use crate::generation::content::{ContentParams, ContentType};
use crate::generation::prompts::VARIATION_INSTRUCTION_TEMPLATE;
use crate::llm_client::{find_json_object, strip_json_fences, CompletionClient, TokenUsage};
use crate::pipeline::{PipelineError, Stage};
use crate::prompt::{build, render, PromptError, PromptParams};

pub const DEFAULT_VARIATIONS: u8 = 1;
pub const MAX_VARIATIONS: u8 = 3;

/// A validated generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub params: ContentParams,
    /// Total drafts wanted: the primary `content` plus `variations - 1` alternatives.
    pub variations: u8,
}

impl ContentRequest {
    pub fn new(params: ContentParams, variations: Option<u8>) -> Result<Self, PromptError> {
        let variations = variations.unwrap_or(DEFAULT_VARIATIONS);
        if !(1..=MAX_VARIATIONS).contains(&variations) {
            return Err(PromptError::InvalidParameter {
                name: "variations".to_string(),
                reason: format!("must be between 1 and {MAX_VARIATIONS}, got {variations}"),
            });
        }
        Ok(Self { params, variations })
    }

    fn alternatives(&self) -> usize {
        usize::from(self.variations.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedContent {
    pub request_id: Uuid,
    pub content_type: ContentType,
    pub content: String,
    pub variations: Vec<String>,
    pub usage: TokenUsage,
    pub model: String,
}

#[derive(Clone)]
pub struct ContentGenerator {
    completion: CompletionClient,
    model: String,
    max_tokens: u32,
}

impl ContentGenerator {
    pub fn new(completion: CompletionClient, model: &str, max_tokens: u32) -> Self {
        Self {
            completion,
            model: model.to_string(),
            max_tokens,
        }
    }

    /// Generates content for `request`. `api_key` overrides the configured credential.
    pub async fn generate(
        &self,
        request: &ContentRequest,
        api_key: Option<&str>,
    ) -> Result<GeneratedContent, PipelineError> {
        let request_id = Uuid::new_v4();
        let content_type = request.params.content_type();
        info!(
            "Generation {} started: type={}, variations={}",
            request_id,
            content_type.as_str(),
            request.variations
        );

        let template = request.params.template(&self.model, self.max_tokens);
        let spec = variation_instruction(request.alternatives())
            .and_then(|instruction| {
                let mut params = request.params.prompt_params();
                params.insert("variation_instruction".to_string(), instruction);
                build(&template, &params)
            })
            .map_err(|e| PipelineError::new(Stage::PromptBuild, e))?;

        let completion = self
            .completion
            .complete_with_key(&spec, api_key)
            .await
            .map_err(|e| {
                warn!("Generation {} failed: {}", request_id, e);
                PipelineError::new(Stage::Completion, e)
            })?;

        let (content, variations) = parse_generated(&completion.text, request.alternatives())
            .map_err(|e| PipelineError::new(Stage::Structuring, e))?;

        info!(
            "Generation {} finished in {}ms: {} chars, {} variation(s), {} tokens",
            request_id,
            completion.processing_time.as_millis(),
            content.chars().count(),
            variations.len(),
            completion.usage.total()
        );

        Ok(GeneratedContent {
            request_id,
            content_type,
            content,
            variations,
            usage: completion.usage,
            model: completion.model,
        })
    }
}

fn variation_instruction(alternatives: usize) -> Result<String, PromptError> {
    render(
        VARIATION_INSTRUCTION_TEMPLATE,
        &PromptParams::from([("alternatives".to_string(), alternatives.to_string())]),
    )
}

/// Reads `{"content", "variations"}` from the completion text.
///
/// The object may follow a line of prose. Text holding no JSON object is
/// taken whole as `content` with no variations. Extra variations beyond `alternatives` are dropped.
fn parse_generated(text: &str, alternatives: usize) -> Result<(String, Vec<String>), StructureError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(StructureError::Parse("completion text is empty".to_string()));
    }

    let Some(map) = find_json_object(text) else {
        warn!("Generated content is not JSON, using the raw text");
        return Ok((text.to_string(), Vec::new()));
    };

    let mut drafts: Vec<String> = map
        .get("variations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let content = match map.get("content").and_then(Value::as_str).map(str::trim) {
        Some(content) if !content.is_empty() => content.to_string(),
        // Promote the first alternative when the primary draft is missing.
        _ if !drafts.is_empty() => drafts.remove(0),
        _ => {
            return Err(StructureError::Parse(
                "JSON reply has no content or variations".to_string(),
            ))
        }
    };

    if drafts.len() < alternatives {
        warn!(
            "Asked for {} alternative draft(s), model returned {}",
            alternatives,
            drafts.len()
        );
    }
    drafts.truncate(alternatives);
    Ok((content, drafts))
}
