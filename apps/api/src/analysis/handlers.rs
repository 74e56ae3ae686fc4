//! Axum route handlers for the Analysis API.

use std::str::FromStr;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::schema::{AnalysisType, OutputSchema};
use crate::analysis::AnalysisOptions;
use crate::errors::AppError;
use crate::extraction::Document;
use crate::routes::UsageBody;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" | "txt" | "plain" => Ok(OutputFormat::Text),
            other => Err(format!("unknown output_format '{other}' (expected json or text)")),
        }
    }
}

/// Fields collected from the multipart upload.
#[derive(Debug, Default)]
struct AnalyzeForm {
    file: Option<Bytes>,
    file_name: Option<String>,
    file_content_type: Option<String>,
    analysis_type: AnalysisType,
    output_format: OutputFormat,
    document_type: Option<String>,
    job_description: Option<String>,
}

impl AnalyzeForm {
    /// Declared format: explicit `document_type`, else the file extension,
    /// else the part's content type.
    /// Blank candidates are skipped.
    fn declared_format(&self) -> Option<String> {
        let extension = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext);
        [
            self.document_type.as_deref(),
            extension,
            self.file_content_type.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeDocumentResponse {
    pub analysis_id: Uuid,
    pub analysis_type: AnalysisType,
    pub output_format: OutputFormat,
    /// Structured result object for `json`, a rendered string for `text`.
    pub results: Value,
    pub confidence: f64,
    /// Seconds, end to end.
    pub processing_time: f64,
    pub usage: UsageBody,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// POST /api/v1/analyze-document
///
/// Multipart upload: `file` plus optional `analysis_type`, `output_format`,
/// `document_type` and `job_description`. Runs the full analysis pipeline.
pub async fn handle_analyze_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeDocumentResponse>, AppError> {
    let multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;
    let mut form = read_form(multipart).await?;

    let bytes = form
        .file
        .take()
        .ok_or_else(|| AppError::MissingField("file".to_string()))?;
    let declared = form
        .declared_format()
        .ok_or_else(|| AppError::MissingField("document_type".to_string()))?;

    let mut document = Document::new(bytes, declared);
    if let Some(name) = form.file_name {
        document = document.with_filename(name);
    }

    let schema = OutputSchema::for_analysis(form.analysis_type);
    let options = AnalysisOptions {
        job_description: form.job_description,
    };

    let report = state.orchestrator.process(document, &schema, &options).await?;

    let results = match form.output_format {
        OutputFormat::Json => serde_json::to_value(&report.result)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize result: {e}")))?,
        OutputFormat::Text => Value::String(report.result.to_plain_text()),
    };

    Ok(Json(AnalyzeDocumentResponse {
        analysis_id: report.analysis_id,
        analysis_type: report.analysis_type,
        output_format: form.output_format,
        results,
        confidence: report.result.confidence_score,
        processing_time: report.processing_time.as_secs_f64(),
        usage: report.usage.into(),
        model: report.model,
        created_at: report.created_at,
    }))
}

async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, AppError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.file_content_type = field.content_type().map(str::to_string);
                form.file = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "analysis_type" => {
                if let Some(raw) = read_text(field).await? {
                    form.analysis_type = raw.parse().map_err(AppError::Validation)?;
                }
            }
            "output_format" => {
                if let Some(raw) = read_text(field).await? {
                    form.output_format = raw.parse().map_err(AppError::Validation)?;
                }
            }
            "document_type" => form.document_type = read_text(field).await?,
            "job_description" => form.job_description = read_text(field).await?,
            other => debug!("Ignoring unknown multipart field '{other}'"),
        }
    }

    Ok(form)
}

/// A text field that is blank after trimming counts as absent.
async fn read_text(field: Field<'_>) -> Result<Option<String>, AppError> {
    let text = field.text().await.map_err(multipart_error)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}
