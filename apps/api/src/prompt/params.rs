//! Enumerated prompt parameters. Requests carry these instead of free-form
//! strings so an invalid tone or length is rejected when the request is parsed.

use serde::{Deserialize, Serialize};

use crate::prompt::PromptError;

/// Hard ceiling on key points for any content request.
pub const MAX_KEY_POINTS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
    Casual,
    Persuasive,
    Empathetic,
}

impl Tone {
    /// Style guidance inserted into the prompt for this tone.
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Professional => "professional: confident, clear, no slang",
            Tone::Friendly => "friendly: warm and approachable, still businesslike",
            Tone::Formal => "formal: polished, precise, no contractions",
            Tone::Casual => "casual: conversational, short sentences, light contractions",
            Tone::Persuasive => "persuasive: benefit-led, end with a clear call to action",
            Tone::Empathetic => "empathetic: acknowledge the reader's situation before anything else",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    /// Target word range (inclusive) for generated content.
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            Length::Short => (40, 80),
            Length::Medium => (100, 180),
            Length::Long => (200, 320),
        }
    }

    /// Most key points that fit the length without turning into a list dump.
    pub fn max_key_points(&self) -> usize {
        match self {
            Length::Short => 3,
            Length::Medium => 6,
            Length::Long => MAX_KEY_POINTS,
        }
    }

    pub fn instruction(&self) -> String {
        let (min, max) = self.word_range();
        format!("between {min} and {max} words")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    General,
    Executives,
    Recruiters,
    Technical,
    Customers,
    Peers,
}

impl Audience {
    pub fn description(&self) -> &'static str {
        match self {
            Audience::General => "a general professional audience",
            Audience::Executives => "senior executives who skim for outcomes and numbers",
            Audience::Recruiters => "recruiters and hiring managers scanning for fit",
            Audience::Technical => "technical practitioners who value specifics",
            Audience::Customers => "existing and prospective customers",
            Audience::Peers => "industry peers and colleagues",
        }
    }
}

/// Rejects blank required text fields.
pub fn require_non_empty(name: &str, value: &str) -> Result<(), PromptError> {
    if value.trim().is_empty() {
        return Err(PromptError::InvalidParameter {
            name: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Checks key points against the requested length.
pub fn validate_key_points(key_points: &[String], length: Length) -> Result<(), PromptError> {
    let invalid = |reason: String| PromptError::InvalidParameter {
        name: "key_points".to_string(),
        reason,
    };

    if key_points.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid("key points must not be blank".to_string()));
    }
    let limit = length.max_key_points();
    if key_points.len() > limit {
        return Err(invalid(format!(
            "{} key points do not fit {:?} length (max {limit})",
            key_points.len(),
            length
        )));
    }
    Ok(())
}

/// Renders key points as a dash list, or a marker when there are none.
pub fn bullet_list(points: &[String]) -> String {
    if points.is_empty() {
        return "(none provided)".to_string();
    }
    points
        .iter()
        .map(|p| format!("- {}", p.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
