//! Request Orchestrator: runs one document through the analysis pipeline.
//!
//! Flow: extract → build prompt → complete → structure.
//! The first failing stage short-circuits the rest; its error is returned
//! tagged with the stage name. Requests share nothing but the completion
//! client, so any number of `process` calls may run concurrently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::schema::{AnalysisType, OutputSchema};
use crate::analysis::structurer::{structure, AnalysisResult};
use crate::analysis::{analysis_params, analysis_template, AnalysisOptions};
use crate::extraction::{extract, Document, DocumentFormat, ExtractedText, ExtractionError};
use crate::llm_client::{CompletionClient, TokenUsage};
use crate::pipeline::{PipelineError, Stage, StageError};
use crate::prompt::{build, PromptTemplate};

/// Everything the façade needs to answer an analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub analysis_type: AnalysisType,
    pub result: AnalysisResult,
    pub usage: TokenUsage,
    pub model: String,
    pub completion_attempts: u32,
    /// End-to-end wall-clock time across all four stages.
    pub processing_time: Duration,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Orchestrator {
    completion: CompletionClient,
    template: PromptTemplate,
}

impl Orchestrator {
    pub fn new(completion: CompletionClient, model: &str, max_tokens: u32) -> Self {
        Self {
            completion,
            template: analysis_template(model, max_tokens),
        }
    }

    /// Runs `document` through extraction, prompting, completion and structuring.
    pub async fn process(
        &self,
        document: Document,
        schema: &OutputSchema,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport, PipelineError> {
        let analysis_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            "Analysis {} started: type={}, declared_format={}, bytes={}",
            analysis_id,
            schema.analysis_type.as_str(),
            document.declared_format(),
            document.bytes().len()
        );

        // Stage 1: Extraction
        let extracted = run_extraction(document)
            .await
            .map_err(|e| stage_failed(analysis_id, Stage::Extraction, e))?;
        info!(
            "Analysis {}: extracted {} chars ({})",
            analysis_id, extracted.char_count, extracted.format
        );

        // Stage 2: Prompt build
        let spec = analysis_params(&extracted, schema, options)
            .and_then(|params| build(&self.template, &params))
            .map_err(|e| stage_failed(analysis_id, Stage::PromptBuild, e))?;

        // Stage 3: Completion
        let completion = self
            .completion
            .complete(&spec)
            .await
            .map_err(|e| stage_failed(analysis_id, Stage::Completion, e))?;
        info!(
            "Analysis {}: completion in {}ms after {} attempt(s)",
            analysis_id,
            completion.processing_time.as_millis(),
            completion.attempts
        );

        // Stage 4: Structuring
        let result = structure(&completion, schema)
            .map_err(|e| stage_failed(analysis_id, Stage::Structuring, e))?;

        info!(
            "Analysis {} finished: {} insights, confidence={:.0}, partial={}",
            analysis_id,
            result.key_insights.len(),
            result.confidence_score,
            result.is_partial()
        );

        Ok(AnalysisReport {
            analysis_id,
            analysis_type: schema.analysis_type,
            result,
            usage: completion.usage,
            model: completion.model,
            completion_attempts: completion.attempts,
            processing_time: started.elapsed(),
            created_at: Utc::now(),
        })
    }
}

/// Decodes on the blocking pool so large PDFs never stall the runtime.
async fn run_extraction(document: Document) -> Result<ExtractedText, ExtractionError> {
    let format = DocumentFormat::from_declared(document.declared_format())?;
    tokio::task::spawn_blocking(move || extract(&document))
        .await
        .unwrap_or_else(|e| {
            Err(ExtractionError::CorruptInput {
                format,
                reason: format!("extraction task failed: {e}"),
            })
        })
}

fn stage_failed(analysis_id: Uuid, stage: Stage, source: impl Into<StageError>) -> PipelineError {
    let err = PipelineError::new(stage, source);
    warn!("Analysis {} failed: {}", analysis_id, err);
    err
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::structurer::ComplianceStatus;
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::{CompletionConfig, CompletionError, RetryPolicy};
    use crate::pipeline::ErrorKind;

    const SUMMARY_REPLY: &str = r#"{
        "extracted_data": {"document_type": "resume", "main_topic": "Python engineering experience"},
        "key_insights": ["Candidate has 5 years of Python experience", "No employers or projects are named"],
        "compliance_status": "unknown",
        "confidence_score": 74
    }"#;

    fn orchestrator(backend: Arc<ScriptedBackend>) -> Orchestrator {
        let config = CompletionConfig {
            api_key: Some("sk-test".to_string()),
            retry: RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40)),
            ..CompletionConfig::default()
        };
        Orchestrator::new(
            CompletionClient::with_backend(config, backend),
            "claude-test",
            1024,
        )
    }

    fn resume() -> Document {
        Document::new(b"Experienced engineer, 5 years Python".to_vec(), "text")
            .with_filename("resume.txt")
    }

    fn summary() -> OutputSchema {
        OutputSchema::for_analysis(AnalysisType::Summary)
    }

    #[tokio::test]
    async fn test_plain_text_resume_summary_end_to_end() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            SUMMARY_REPLY,
        ))));
        let report = orchestrator(backend.clone())
            .process(resume(), &summary(), &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(!report.result.key_insights.is_empty());
        assert_eq!(report.result.compliance_status, ComplianceStatus::Unknown);
        assert_eq!(report.result.confidence_score, 74.0);
        assert_eq!(report.analysis_type, AnalysisType::Summary);
        assert_eq!(report.usage.input_tokens, 120);
        assert_eq!(report.completion_attempts, 1);

        assert_eq!(backend.calls(), 1);
        let prompt = &backend.prompts()[0];
        assert!(prompt
            .user_prompt
            .contains("Experienced engineer, 5 years Python"));
        assert_eq!(prompt.model, "claude-test");
    }

    #[tokio::test]
    async fn test_extraction_failure_never_calls_completion() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            SUMMARY_REPLY,
        ))));
        let orchestrator = orchestrator(backend.clone());

        let err = orchestrator
            .process(
                Document::new(b"x".to_vec(), "xlsx"),
                &summary(),
                &AnalysisOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let err = orchestrator
            .process(
                Document::new(b"not a pdf".to_vec(), "pdf"),
                &summary(),
                &AnalysisOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind(), ErrorKind::CorruptInput);

        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_failure_never_calls_completion() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            SUMMARY_REPLY,
        ))));
        let options = AnalysisOptions {
            job_description: Some("Staff engineer".to_string()),
        };
        let err = orchestrator(backend.clone())
            .process(resume(), &summary(), &options)
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::PromptBuild);
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_completion_failure_is_tagged_with_stage() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            CompletionError::Authentication("invalid x-api-key".to_string()),
        )));
        let err = orchestrator(backend.clone())
            .process(resume(), &summary(), &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Completion);
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert_eq!(backend.calls(), 1);
        assert!(err.to_string().contains("completion stage failed (authentication_error)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_absorbed_by_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(CompletionError::ServiceUnavailable("overloaded".to_string())),
            Ok(ScriptedBackend::reply(SUMMARY_REPLY)),
        ]));
        let report = orchestrator(backend.clone())
            .process(resume(), &summary(), &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(report.completion_attempts, 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_completion_is_structuring_parse_error() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            "I cannot analyze this document.",
        ))));
        let err = orchestrator(backend)
            .process(resume(), &summary(), &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Structuring);
        assert_eq!(err.kind(), ErrorKind::ParseError);
    }

    #[tokio::test]
    async fn test_partial_completion_degrades_instead_of_failing() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            r#"{"key_insights": ["Five years of Python"]}"#,
        ))));
        let report = orchestrator(backend)
            .process(resume(), &summary(), &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(report.result.confidence_score, 0.0);
        assert_eq!(report.result.key_insights, vec!["Five years of Python"]);
        assert!(report.result.is_partial());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let backend = Arc::new(ScriptedBackend::repeating(Ok(ScriptedBackend::reply(
            SUMMARY_REPLY,
        ))));
        let orchestrator = orchestrator(backend.clone());
        let schema = summary();
        let options = AnalysisOptions::default();

        let (a, b, c) = tokio::join!(
            orchestrator.process(resume(), &schema, &options),
            orchestrator.process(Document::new(b"x".to_vec(), "odt"), &schema, &options),
            orchestrator.process(resume(), &schema, &options),
        );

        let (a, c) = (a.unwrap(), c.unwrap());
        assert_ne!(a.analysis_id, c.analysis_id);
        assert_eq!(b.unwrap_err().kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(backend.calls(), 2);
    }
}
