//! Prompt Builder: renders a `PromptSpec` from a template and parameters.
//!
//! Placeholders are `{name}` with `name` in `[a-z0-9_]`. Any other brace is
//! literal text, so templates can embed JSON examples without escaping.
//! Rendering is a single pass: a substituted value is never re-scanned, so
//! document text containing `{something}` cannot trigger a lookup.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

pub mod params;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Missing template parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Parameter values keyed by placeholder name. Ordered so rendering is deterministic.
pub type PromptParams = BTreeMap<String, String>;

/// A system/user prompt pair with the sampling settings it should run under.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub user: &'static str,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A fully rendered prompt, ready for the completion client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSpec {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Renders `template` with `params`.
///
/// Fails with `MissingParameter` naming the first placeholder (system prompt
/// first, then user prompt) that has no value. Unused params are ignored.
pub fn build(template: &PromptTemplate, params: &PromptParams) -> Result<PromptSpec, PromptError> {
    Ok(PromptSpec {
        system_prompt: render(template.system, params)?,
        user_prompt: render(template.user, params)?,
        model: template.model.clone(),
        temperature: template.temperature,
        max_tokens: template.max_tokens,
    })
}

/// Fills the placeholders of a single template text. Same rules as [`build`].
pub fn render(text: &str, params: &PromptParams) -> Result<String, PromptError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((before, name, after)) = next_placeholder(rest) {
        let value = params
            .get(name)
            .ok_or_else(|| PromptError::MissingParameter(name.to_string()))?;
        out.push_str(before);
        out.push_str(value);
        rest = after;
    }

    out.push_str(rest);
    Ok(out)
}

/// Finds the next `{name}` in `text`, returning (text before, name, text after).
fn next_placeholder(text: &str) -> Option<(&str, &str, &str)> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let open = search_from + offset;
        let tail = &text[open + 1..];
        let name_len = tail
            .bytes()
            .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_')
            .count();
        if name_len > 0 && tail.as_bytes().get(name_len) == Some(&b'}') {
            let name = &tail[..name_len];
            return Some((&text[..open], name, &tail[name_len + 1..]));
        }
        search_from = open + 1;
    }
    None
}
