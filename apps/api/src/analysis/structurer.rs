//! Result Structurer: turns raw completion text into a typed `AnalysisResult`.
//!
//! Parsing order:
//! 1. JSON object with `extracted_data`, `key_insights`, `compliance_status`,
//!    `confidence_score`. The object may sit inside a fenced block or after
//!    a line of prose.
//! 2. Labelled plain text: "Extracted data" / "Key insights" sections plus
//!    `Compliance:` and `Confidence:` lines.
//!
//! A partial parse keeps every field that did parse, records a warning per
//! missing field, and reports confidence 0. Only output with nothing usable
//! at all is a `ParseError`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::analysis::schema::OutputSchema;
use crate::llm_client::{find_json_object, strip_json_fences, CompletionResult};

pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("Could not parse completion: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    #[default]
    Unknown,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::Unknown => "unknown",
        }
    }

    /// Reads a model verdict such as "compliant", "Non-Compliant", "not compliant", "pass".
    pub fn parse_verdict(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '*' || c == '.')
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '/')
            .collect();

        if key.starts_with("noncompliant") || key.starts_with("notcompliant") {
            return Some(ComplianceStatus::NonCompliant);
        }
        if key.starts_with("compliant") {
            return Some(ComplianceStatus::Compliant);
        }
        match key.as_str() {
            "pass" | "passed" | "yes" => Some(ComplianceStatus::Compliant),
            "fail" | "failed" | "no" => Some(ComplianceStatus::NonCompliant),
            "unknown" | "undetermined" | "n/a" | "na" => Some(ComplianceStatus::Unknown),
            _ => None,
        }
    }
}

/// Terminal artifact of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub extracted_data: BTreeMap<String, String>,
    pub key_insights: Vec<String>,
    pub compliance_status: ComplianceStatus,
    /// Always within [0, 100]. 0 when the parse was partial.
    pub confidence_score: f64,
    /// One entry per expected field that could not be parsed.
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Plain-text rendering for callers that asked for `output_format=text`.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        if !self.extracted_data.is_empty() {
            out.push_str("Extracted data:\n");
            for (key, value) in &self.extracted_data {
                out.push_str(&format!("- {key}: {value}\n"));
            }
            out.push('\n');
        }
        out.push_str("Key insights:\n");
        for insight in &self.key_insights {
            out.push_str(&format!("- {insight}\n"));
        }
        out.push_str(&format!(
            "\nCompliance: {}\nConfidence: {:.0}\n",
            self.compliance_status.as_str(),
            self.confidence_score
        ));
        out
    }
}

/// Fields recovered from the raw text, before schema checks.
#[derive(Debug, Default)]
struct ParsedFields {
    extracted_data: BTreeMap<String, String>,
    key_insights: Vec<String>,
    compliance: Option<ComplianceStatus>,
    confidence: Option<f64>,
}

/// Structures a completion against `schema`.
pub fn structure(
    result: &CompletionResult,
    schema: &OutputSchema,
) -> Result<AnalysisResult, StructureError> {
    let text = strip_json_fences(&result.text);
    if text.is_empty() {
        return Err(StructureError::Parse("completion text is empty".to_string()));
    }

    let fields = match find_json_object(text) {
        Some(map) => parse_json_fields(&map),
        None => parse_labelled_text(text),
    };

    if fields.key_insights.is_empty()
        && fields.extracted_data.is_empty()
        && fields.confidence.is_none()
    {
        return Err(StructureError::Parse(
            "no insights, extracted data, or confidence score found".to_string(),
        ));
    }

    let mut warnings = Vec::new();
    if fields.confidence.is_none() {
        warnings.push("confidence_score missing".to_string());
    }
    if fields.key_insights.is_empty() {
        warnings.push("key_insights missing".to_string());
    }
    for field in schema.required_fields {
        if !fields.extracted_data.contains_key(*field) {
            warnings.push(format!("extracted_data.{field} missing"));
        }
    }

    let compliance_status = match (&schema.compliance_rule, fields.compliance) {
        (None, _) => ComplianceStatus::Unknown,
        (Some(_), Some(status)) => status,
        (Some(_), None) => {
            warnings.push("compliance_status missing".to_string());
            ComplianceStatus::Unknown
        }
    };

    let confidence_score = if warnings.is_empty() {
        fields.confidence.unwrap_or(MIN_CONFIDENCE)
    } else {
        warn!(
            "Partial {} parse, confidence set to 0: {}",
            schema.analysis_type.as_str(),
            warnings.join("; ")
        );
        MIN_CONFIDENCE
    };

    Ok(AnalysisResult {
        extracted_data: fields.extracted_data,
        key_insights: fields.key_insights,
        compliance_status,
        confidence_score: clamp_confidence(confidence_score),
        warnings,
    })
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    } else {
        MIN_CONFIDENCE
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON output
// ────────────────────────────────────────────────────────────────────────────

fn parse_json_fields(map: &Map<String, Value>) -> ParsedFields {
    let mut fields = ParsedFields::default();

    if let Some(Value::Object(data)) = map.get("extracted_data") {
        for (key, value) in data {
            if let Some(text) = scalar_text(value) {
                fields.extracted_data.insert(normalize_key(key), text);
            }
        }
    }

    fields.key_insights = match map.get("key_insights") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    fields.compliance = map
        .get("compliance_status")
        .and_then(Value::as_str)
        .and_then(ComplianceStatus::parse_verdict);

    fields.confidence = match map.get("confidence_score") {
        Some(Value::Number(n)) => n.as_f64().map(|v| scale_confidence(v, n.is_f64())),
        Some(Value::String(s)) => parse_confidence_text(s),
        _ => None,
    };

    fields
}

/// Renders a JSON value as a flat string. Arrays of scalars are comma-joined.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Labelled plain-text output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Data,
    Insights,
}

fn parse_labelled_text(text: &str) -> ParsedFields {
    let mut fields = ParsedFields::default();
    let mut section = Section::None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let (is_bullet, body) = strip_bullet(line);

        if !is_bullet {
            if let Some(heading) = classify_heading(body) {
                section = heading;
                continue;
            }
        }

        if let Some((key, value)) = split_label(body) {
            match key.as_str() {
                "confidence" | "confidence_score" | "confidence_level" => {
                    fields.confidence = parse_confidence_text(&value).or(fields.confidence);
                    continue;
                }
                "compliance" | "compliance_status" => {
                    fields.compliance = ComplianceStatus::parse_verdict(&value).or(fields.compliance);
                    continue;
                }
                _ if section == Section::Data => {
                    fields.extracted_data.insert(key, value);
                    continue;
                }
                _ => {}
            }
        }

        if section == Section::Insights && is_bullet && !body.is_empty() {
            fields.key_insights.push(body.to_string());
        } else if !is_bullet && line.ends_with(':') {
            // An unrecognised heading closes the current section.
            section = Section::None;
        }
    }

    fields
}

/// Strips a leading `-`, `*`, `•`, or `1.`/`1)` marker.
fn strip_bullet(line: &str) -> (bool, &str) {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return (true, rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return (true, rest.trim());
        }
    }
    (false, line)
}

fn classify_heading(line: &str) -> Option<Section> {
    let heading = line
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_ascii_lowercase();
    match heading.as_str() {
        "key insights" | "insights" | "key findings" | "findings" => Some(Section::Insights),
        "extracted data" | "extracted fields" | "key data" | "data" => Some(Section::Data),
        _ => None,
    }
}

/// Splits `Key: value` (markdown bold allowed) into a normalized key and value.
fn split_label(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = normalize_key(key);
    let value = value.trim().trim_matches('*').trim();
    if key.is_empty() || value.is_empty() || key.len() > 40 {
        return None;
    }
    Some((key, value.to_string()))
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .trim_matches('*')
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Confidence
// ────────────────────────────────────────────────────────────────────────────

/// Parses "85", "85%", "0.85", "85/100", "85 (high)".
fn parse_confidence_text(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_matches('*').trim();
    let numeric: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = numeric.parse().ok()?;
    let rest = raw[numeric.len()..].trim_start();
    if rest.starts_with('%') || rest.starts_with("/100") {
        return Some(value);
    }
    Some(scale_confidence(value, numeric.contains('.')))
}

/// Decimal values at or below 1.0 are read as fractions of 100.
fn scale_confidence(value: f64, has_decimal_point: bool) -> f64 {
    if has_decimal_point && (0.0..=1.0).contains(&value) {
        value * 100.0
    } else {
        value
    }
}
