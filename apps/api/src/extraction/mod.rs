//! Document Extractor: converts an uploaded document into normalized plain text.
//!
//! Format dispatch is a direct lookup on the declared format. Bytes are never
//! sniffed: a PDF declared as `text` is decoded as text and fails as such.

use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod docx;
pub mod normalize;

use crate::extraction::normalize::normalize_text;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported document format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Could not decode {format} document: {reason}")]
    CorruptInput {
        format: DocumentFormat,
        reason: String,
    },
}

/// Formats the extractor knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    /// Resolves a declared format (extension, short name, or MIME type).
    pub fn from_declared(declared: &str) -> Result<Self, ExtractionError> {
        let key = declared.trim().trim_start_matches('.').to_ascii_lowercase();
        match key.as_str() {
            "pdf" | "application/pdf" => Ok(DocumentFormat::Pdf),
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(DocumentFormat::Docx)
            }
            "text" | "txt" | "plain" | "md" | "markdown" | "text/plain" | "text/markdown" => {
                Ok(DocumentFormat::Text)
            }
            _ => Err(ExtractionError::UnsupportedFormat(declared.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "text",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded document: raw bytes plus the format the caller declared.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Bytes,
    declared_format: String,
    filename: Option<String>,
}

impl Document {
    pub fn new(bytes: impl Into<Bytes>, declared_format: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_format: declared_format.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_format(&self) -> &str {
        &self.declared_format
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

/// Normalized text pulled out of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub format: DocumentFormat,
    /// File name of the source document, when the upload carried one.
    pub source: Option<String>,
    pub char_count: usize,
}

/// Extracts normalized text from a document.
///
/// Fails with `UnsupportedFormat` before touching the bytes when the declared
/// format is unknown, and with `CorruptInput` when the decoder rejects the
/// bytes or the document holds no text at all.
pub fn extract(document: &Document) -> Result<ExtractedText, ExtractionError> {
    let format = DocumentFormat::from_declared(document.declared_format())?;

    let raw = match format {
        DocumentFormat::Pdf => extract_pdf(document.bytes())?,
        DocumentFormat::Docx => docx::extract_docx(document.bytes())?,
        DocumentFormat::Text => extract_plain(document.bytes())?,
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        return Err(ExtractionError::CorruptInput {
            format,
            reason: "document contains no extractable text".to_string(),
        });
    }

    debug!(
        "Extracted {} chars from {} document {:?}",
        text.chars().count(),
        format,
        document.filename()
    );

    Ok(ExtractedText {
        char_count: text.chars().count(),
        text,
        format,
        source: document.filename().map(String::from),
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let corrupt = |reason: String| ExtractionError::CorruptInput {
        format: DocumentFormat::Pdf,
        reason,
    };

    // pdf-extract panics on some malformed inputs instead of returning an error.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(corrupt(format!("{e:?}"))),
        Err(_) => Err(corrupt("PDF decoder aborted on malformed input".to_string())),
    }
}

fn extract_plain(bytes: &[u8]) -> Result<String, ExtractionError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map(String::from)
        .map_err(|e| ExtractionError::CorruptInput {
            format: DocumentFormat::Text,
            reason: format!("invalid UTF-8: {e}"),
        })
}
