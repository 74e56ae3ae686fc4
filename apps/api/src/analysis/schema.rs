//! Output schemas: what a structured result must contain for each analysis type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    Summary,
    ResumeReview,
    ComplianceCheck,
    DataExtraction,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Summary => "summary",
            AnalysisType::ResumeReview => "resume_review",
            AnalysisType::ComplianceCheck => "compliance_check",
            AnalysisType::DataExtraction => "data_extraction",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "summary" => Ok(AnalysisType::Summary),
            "resume_review" | "resume" => Ok(AnalysisType::ResumeReview),
            "compliance_check" | "compliance" => Ok(AnalysisType::ComplianceCheck),
            "data_extraction" | "extraction" => Ok(AnalysisType::DataExtraction),
            other => Err(format!(
                "unknown analysis_type '{other}' (expected summary, resume_review, compliance_check, data_extraction)"
            )),
        }
    }
}

/// A named set of requirements the model checks the document against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRule {
    pub name: &'static str,
    pub requirements: &'static [&'static str],
}

/// Fields and shape expected in the structured result for one analysis type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSchema {
    pub analysis_type: AnalysisType,
    /// Keys that must appear in `extracted_data` for a complete parse.
    pub required_fields: &'static [&'static str],
    /// `None` means compliance is always reported as unknown.
    pub compliance_rule: Option<ComplianceRule>,
}

const BUSINESS_DOCUMENT_RULE: ComplianceRule = ComplianceRule {
    name: "business document baseline",
    requirements: &[
        "identifies every party involved by name",
        "states an effective or issue date",
        "states payment or delivery terms when money or goods change hands",
        "includes a signature, approval, or authorization block",
        "contains no sensitive personal data beyond names and business contact details",
    ],
};

impl OutputSchema {
    pub fn for_analysis(analysis_type: AnalysisType) -> Self {
        match analysis_type {
            AnalysisType::Summary => Self {
                analysis_type,
                required_fields: &["document_type", "main_topic"],
                compliance_rule: None,
            },
            AnalysisType::ResumeReview => Self {
                analysis_type,
                required_fields: &["candidate_name", "years_experience", "primary_skills"],
                compliance_rule: None,
            },
            AnalysisType::ComplianceCheck => Self {
                analysis_type,
                required_fields: &["document_type", "parties"],
                compliance_rule: Some(BUSINESS_DOCUMENT_RULE),
            },
            AnalysisType::DataExtraction => Self {
                analysis_type,
                required_fields: &["document_type", "date", "total_amount", "counterparty"],
                compliance_rule: None,
            },
        }
    }
}
