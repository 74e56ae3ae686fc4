use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::CompletionError;
use crate::pipeline::{ErrorKind, PipelineError, StageError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// HTTP status for each pipeline error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::CorruptInput => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::MissingParameter | ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::AuthenticationError => StatusCode::UNAUTHORIZED,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ParseError | ErrorKind::InvalidRequest => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, stage) = match &self {
            AppError::Pipeline(e) => {
                let kind = e.kind();
                if status_for(kind).is_server_error() {
                    tracing::error!("Pipeline error: {e}");
                }
                (
                    status_for(kind),
                    kind.as_str(),
                    e.source.to_string(),
                    Some(e.stage.as_str()),
                )
            }
            AppError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::MissingParameter.as_str(),
                format!("'{field}' is required"),
                None,
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidParameter.as_str(),
                msg.clone(),
                None,
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg.clone(),
                None,
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "stage": stage
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(seconds) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl AppError {
    /// Retry-After forwarded from a rate-limited completion call.
    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::Pipeline(PipelineError {
                source:
                    StageError::Completion(CompletionError::RateLimited {
                        retry_after: Some(after),
                        ..
                    }),
                ..
            }) => Some(after.as_secs().max(1)),
            _ => None,
        }
    }
}
