//! Request pipeline: stage tagging for errors and the analysis orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::analysis::structurer::StructureError;
use crate::extraction::ExtractionError;
use crate::llm_client::CompletionError;
use crate::prompt::PromptError;

pub mod orchestrator;

pub use orchestrator::Orchestrator;

/// Pipeline stage, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    PromptBuild,
    Completion,
    Structuring,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::PromptBuild => "prompt_build",
            Stage::Completion => "completion",
            Stage::Structuring => "structuring",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure kind a pipeline can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    CorruptInput,
    MissingParameter,
    InvalidParameter,
    AuthenticationError,
    RateLimited,
    ServiceUnavailable,
    TimeoutError,
    InvalidRequest,
    ParseError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::CorruptInput => "corrupt_input",
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::AuthenticationError => "authentication_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ParseError => "parse_error",
        }
    }

    /// Kinds a caller may retry under a bounded backoff policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::ServiceUnavailable | ErrorKind::TimeoutError
        )
    }
}

/// The originating error of a failed stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Structure(#[from] StructureError),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Extraction(ExtractionError::UnsupportedFormat(_)) => {
                ErrorKind::UnsupportedFormat
            }
            StageError::Extraction(ExtractionError::CorruptInput { .. }) => ErrorKind::CorruptInput,
            StageError::Prompt(PromptError::MissingParameter(_)) => ErrorKind::MissingParameter,
            StageError::Prompt(PromptError::InvalidParameter { .. }) => {
                ErrorKind::InvalidParameter
            }
            StageError::Completion(e) => match e {
                CompletionError::Authentication(_) => ErrorKind::AuthenticationError,
                CompletionError::RateLimited { .. } => ErrorKind::RateLimited,
                CompletionError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
                CompletionError::Timeout(_) => ErrorKind::TimeoutError,
                CompletionError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            },
            StageError::Structure(StructureError::Parse(_)) => ErrorKind::ParseError,
        }
    }
}

/// A pipeline failure tagged with the stage it came from.
#[derive(Debug, Error)]
#[error("{stage} stage failed ({}): {source}", .source.kind().as_str())]
pub struct PipelineError {
    pub stage: Stage,
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
