//! Typed parameters for each content type.
//!
//! Requests arrive as `{content_type, parameters}`. The parameters object is
//! decoded into the record for that content type; unknown keys and
//! out-of-range values are rejected before any prompt is rendered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::prompts::{
    EMAIL_REPLY_PROMPT_TEMPLATE, EMAIL_REPLY_SYSTEM, HASHTAGS, LINKEDIN_PROMPT_TEMPLATE,
    LINKEDIN_SYSTEM, NO_CALL_TO_ACTION, NO_HASHTAGS, NO_SIGNATURE,
};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::prompt::params::{bullet_list, require_non_empty, validate_key_points, Audience, Length, Tone};
use crate::prompt::{PromptError, PromptParams, PromptTemplate};

const GENERATION_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    LinkedinPost,
    EmailReply,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::LinkedinPost => "linkedin_post",
            ContentType::EmailReply => "email_reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkedinPostParams {
    pub topic: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub length: Length,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub include_hashtags: bool,
    pub call_to_action: Option<String>,
}

impl LinkedinPostParams {
    pub fn validate(&self) -> Result<(), PromptError> {
        require_non_empty("topic", &self.topic)?;
        validate_key_points(&self.key_points, self.length)?;
        if let Some(cta) = &self.call_to_action {
            require_non_empty("call_to_action", cta)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailReplyParams {
    pub original_email: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub length: Length,
    /// Name to sign the reply with.
    pub sender_name: Option<String>,
}

impl EmailReplyParams {
    pub fn validate(&self) -> Result<(), PromptError> {
        require_non_empty("original_email", &self.original_email)?;
        validate_key_points(&self.key_points, self.length)?;
        if let Some(name) = &self.sender_name {
            require_non_empty("sender_name", name)?;
        }
        Ok(())
    }
}

/// Validated parameters for one content request.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentParams {
    LinkedinPost(LinkedinPostParams),
    EmailReply(EmailReplyParams),
}

impl ContentParams {
    /// Decodes and validates the raw `parameters` object for `content_type`.
    pub fn from_value(content_type: ContentType, parameters: Value) -> Result<Self, PromptError> {
        let params = match content_type {
            ContentType::LinkedinPost => {
                ContentParams::LinkedinPost(decode(parameters)?)
            }
            ContentType::EmailReply => ContentParams::EmailReply(decode(parameters)?),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), PromptError> {
        match self {
            ContentParams::LinkedinPost(p) => p.validate(),
            ContentParams::EmailReply(p) => p.validate(),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            ContentParams::LinkedinPost(_) => ContentType::LinkedinPost,
            ContentParams::EmailReply(_) => ContentType::EmailReply,
        }
    }

    pub fn template(&self, model: &str, max_tokens: u32) -> PromptTemplate {
        let (name, system, user) = match self {
            ContentParams::LinkedinPost(_) => {
                ("linkedin_post", LINKEDIN_SYSTEM, LINKEDIN_PROMPT_TEMPLATE)
            }
            ContentParams::EmailReply(_) => {
                ("email_reply", EMAIL_REPLY_SYSTEM, EMAIL_REPLY_PROMPT_TEMPLATE)
            }
        };
        PromptTemplate {
            name,
            system,
            user,
            model: model.to_string(),
            temperature: GENERATION_TEMPERATURE,
            max_tokens,
        }
    }

    /// Parameter map for `template`, minus the variation instruction.
    pub fn prompt_params(&self) -> PromptParams {
        let mut params = PromptParams::new();
        params.insert(
            "json_only_instruction".to_string(),
            JSON_ONLY_INSTRUCTION.to_string(),
        );

        match self {
            ContentParams::LinkedinPost(p) => {
                params.insert("topic".to_string(), p.topic.trim().to_string());
                params.insert("key_points".to_string(), bullet_list(&p.key_points));
                params.insert("tone_instruction".to_string(), p.tone.instruction().to_string());
                params.insert("length_instruction".to_string(), p.length.instruction());
                params.insert("audience".to_string(), p.audience.description().to_string());
                let hashtags = if p.include_hashtags { HASHTAGS } else { NO_HASHTAGS };
                params.insert("hashtag_instruction".to_string(), hashtags.to_string());
                params.insert(
                    "call_to_action".to_string(),
                    p.call_to_action
                        .as_deref()
                        .map(str::trim)
                        .unwrap_or(NO_CALL_TO_ACTION)
                        .to_string(),
                );
            }
            ContentParams::EmailReply(p) => {
                params.insert(
                    "original_email".to_string(),
                    p.original_email.trim().to_string(),
                );
                params.insert("key_points".to_string(), bullet_list(&p.key_points));
                params.insert("tone_instruction".to_string(), p.tone.instruction().to_string());
                params.insert("length_instruction".to_string(), p.length.instruction());
                params.insert(
                    "signature_instruction".to_string(),
                    match &p.sender_name {
                        Some(name) => format!("sign as {}", name.trim()),
                        None => NO_SIGNATURE.to_string(),
                    },
                );
            }
        }
        params
    }
}

fn decode<T: serde::de::DeserializeOwned>(parameters: Value) -> Result<T, PromptError> {
    serde_json::from_value(parameters).map_err(|e| PromptError::InvalidParameter {
        name: "parameters".to_string(),
        reason: e.to_string(),
    })
}
