// Document analysis: schemas, prompt parameters, result structuring, HTTP handlers.
// All LLM calls go through llm_client via the pipeline orchestrator.

pub mod handlers;
pub mod prompts;
pub mod schema;
pub mod structurer;

use tracing::warn;

use crate::analysis::prompts::{
    ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM, COMPLIANCE_RULE_TEMPLATE, COMPLIANCE_TASK,
    DATA_EXTRACTION_TASK, JOB_DESCRIPTION_CONTEXT, NO_COMPLIANCE_RULE, RESUME_REVIEW_TASK,
    SUMMARY_TASK,
};
use crate::analysis::schema::{AnalysisType, OutputSchema};
use crate::extraction::ExtractedText;
use crate::llm_client::prompts::{
    CONFIDENCE_INSTRUCTION, GROUNDING_INSTRUCTION, JSON_ONLY_INSTRUCTION,
};
use crate::prompt::params::require_non_empty;
use crate::prompt::{render, PromptError, PromptParams, PromptTemplate};

/// Documents longer than this are cut before prompting.
pub const MAX_DOCUMENT_CHARS: usize = 60_000;
const TRUNCATION_MARKER: &str = "\n[... document truncated ...]";
const ANALYSIS_TEMPERATURE: f32 = 0.2;

/// Optional inputs that refine an analysis beyond the document itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    /// Target role for a resume review.
    pub job_description: Option<String>,
}

impl AnalysisOptions {
    /// Rejects options that make no sense for the requested analysis.
    pub fn validate(&self, analysis_type: AnalysisType) -> Result<(), PromptError> {
        if let Some(jd) = &self.job_description {
            if analysis_type != AnalysisType::ResumeReview {
                return Err(PromptError::InvalidParameter {
                    name: "job_description".to_string(),
                    reason: format!(
                        "only applies to resume_review, not {}",
                        analysis_type.as_str()
                    ),
                });
            }
            require_non_empty("job_description", jd)?;
        }
        Ok(())
    }
}

/// The one template every analysis type renders through.
pub fn analysis_template(model: &str, max_tokens: u32) -> PromptTemplate {
    PromptTemplate {
        name: "document_analysis",
        system: ANALYSIS_SYSTEM,
        user: ANALYSIS_PROMPT_TEMPLATE,
        model: model.to_string(),
        temperature: ANALYSIS_TEMPERATURE,
        max_tokens,
    }
}

/// Assembles the parameters for `analysis_template`.
pub fn analysis_params(
    extracted: &ExtractedText,
    schema: &OutputSchema,
    options: &AnalysisOptions,
) -> Result<PromptParams, PromptError> {
    options.validate(schema.analysis_type)?;

    let task = match schema.analysis_type {
        AnalysisType::Summary => SUMMARY_TASK,
        AnalysisType::ResumeReview => RESUME_REVIEW_TASK,
        AnalysisType::ComplianceCheck => COMPLIANCE_TASK,
        AnalysisType::DataExtraction => DATA_EXTRACTION_TASK,
    };

    let field_schema = schema
        .required_fields
        .iter()
        .map(|f| format!("\"{f}\": \"string\""))
        .collect::<Vec<_>>()
        .join(", ");

    let compliance_instruction = match &schema.compliance_rule {
        None => NO_COMPLIANCE_RULE.to_string(),
        Some(rule) => {
            let requirements = rule
                .requirements
                .iter()
                .map(|r| format!("- {r}"))
                .collect::<Vec<_>>()
                .join("\n");
            render(
                COMPLIANCE_RULE_TEMPLATE,
                &PromptParams::from([
                    ("rule_name".to_string(), rule.name.to_string()),
                    ("requirements".to_string(), requirements),
                ]),
            )?
        }
    };

    let extra_context = match &options.job_description {
        Some(jd) => render(
            JOB_DESCRIPTION_CONTEXT,
            &PromptParams::from([("job_description".to_string(), jd.trim().to_string())]),
        )?,
        None => String::new(),
    };

    let document_text = truncate_document(&extracted.text);

    Ok(PromptParams::from([
        ("grounding_instruction".to_string(), GROUNDING_INSTRUCTION.to_string()),
        ("json_only_instruction".to_string(), JSON_ONLY_INSTRUCTION.to_string()),
        ("task_instruction".to_string(), task.to_string()),
        ("field_schema".to_string(), field_schema),
        ("compliance_instruction".to_string(), compliance_instruction),
        ("confidence_instruction".to_string(), CONFIDENCE_INSTRUCTION.to_string()),
        ("extra_context".to_string(), extra_context),
        ("document_format".to_string(), extracted.format.to_string()),
        ("char_count".to_string(), extracted.char_count.to_string()),
        ("document_text".to_string(), document_text),
    ]))
}

fn truncate_document(text: &str) -> String {
    match text.char_indices().nth(MAX_DOCUMENT_CHARS) {
        Some((cut, _)) => {
            warn!(
                "Document exceeds {} chars, truncating before prompting",
                MAX_DOCUMENT_CHARS
            );
            format!("{}{}", &text[..cut], TRUNCATION_MARKER)
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::DocumentFormat;
    use crate::prompt::build;

    fn extracted(text: &str) -> ExtractedText {
        ExtractedText {
            text: text.to_string(),
            format: DocumentFormat::Text,
            source: None,
            char_count: text.chars().count(),
        }
    }

    #[test]
    fn test_every_analysis_type_renders_without_missing_params() {
        for t in [
            AnalysisType::Summary,
            AnalysisType::ResumeReview,
            AnalysisType::ComplianceCheck,
            AnalysisType::DataExtraction,
        ] {
            let schema = OutputSchema::for_analysis(t);
            let params =
                analysis_params(&extracted("doc body"), &schema, &AnalysisOptions::default())
                    .unwrap();
            let spec = build(&analysis_template("m", 1024), &params).unwrap();
            assert!(spec.user_prompt.contains("doc body"), "{t:?}");
            assert!(!spec.system_prompt.contains('{'), "{t:?}");
        }
    }

    #[test]
    fn test_field_schema_and_rule_reach_the_prompt() {
        let schema = OutputSchema::for_analysis(AnalysisType::ComplianceCheck);
        let params =
            analysis_params(&extracted("contract"), &schema, &AnalysisOptions::default()).unwrap();
        let spec = build(&analysis_template("m", 1024), &params).unwrap();
        assert!(spec
            .user_prompt
            .contains("\"extracted_data\": { \"document_type\": \"string\", \"parties\": \"string\" }"));
        assert!(spec.user_prompt.contains("COMPLIANCE RULE (business document baseline)"));
        assert!(spec.user_prompt.contains("- includes a signature"));
    }

    #[test]
    fn test_summary_prompt_says_compliance_is_unknown() {
        let schema = OutputSchema::for_analysis(AnalysisType::Summary);
        let params =
            analysis_params(&extracted("memo"), &schema, &AnalysisOptions::default()).unwrap();
        assert_eq!(params["compliance_instruction"], NO_COMPLIANCE_RULE);
        assert_eq!(params["extra_context"], "");
    }

    #[test]
    fn test_job_description_only_for_resume_review() {
        let options = AnalysisOptions {
            job_description: Some("Senior Rust engineer".to_string()),
        };
        let summary = OutputSchema::for_analysis(AnalysisType::Summary);
        assert!(matches!(
            analysis_params(&extracted("cv"), &summary, &options),
            Err(PromptError::InvalidParameter { .. })
        ));

        let review = OutputSchema::for_analysis(AnalysisType::ResumeReview);
        let params = analysis_params(&extracted("cv"), &review, &options).unwrap();
        assert!(params["extra_context"].contains("TARGET JOB DESCRIPTION:\nSenior Rust engineer"));
    }

    #[test]
    fn test_blank_job_description_is_invalid() {
        let options = AnalysisOptions {
            job_description: Some("   ".to_string()),
        };
        let review = OutputSchema::for_analysis(AnalysisType::ResumeReview);
        assert!(analysis_params(&extracted("cv"), &review, &options).is_err());
    }

    #[test]
    fn test_long_documents_are_truncated_on_char_boundary() {
        let text = "é".repeat(MAX_DOCUMENT_CHARS + 10);
        let truncated = truncate_document(&text);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.trim_end_matches(TRUNCATION_MARKER).chars().count(),
            MAX_DOCUMENT_CHARS
        );
        assert_eq!(truncate_document("short"), "short");
    }
}
