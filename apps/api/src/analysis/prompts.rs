// All LLM prompt text for document analysis.
// Shared fragments (grounding, JSON-only, confidence) are passed in as parameters.

/// System prompt for every analysis type.
/// Placeholders: {grounding_instruction}, {json_only_instruction}
pub const ANALYSIS_SYSTEM: &str = "You are a meticulous business document analyst \
working for a small-business automation service. {grounding_instruction} \
{json_only_instruction}";

/// Analysis prompt template.
/// Placeholders: {task_instruction}, {field_schema}, {compliance_instruction},
///               {confidence_instruction}, {extra_context}, {document_format},
///               {char_count}, {document_text}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"{task_instruction}

Return a JSON object with this EXACT schema (no extra top-level fields):
{
  "extracted_data": { {field_schema} },
  "key_insights": ["3 to 7 short, specific findings, each a single sentence"],
  "compliance_status": "compliant" | "non_compliant" | "unknown",
  "confidence_score": 0-100
}

{compliance_instruction}

{confidence_instruction}
{extra_context}
DOCUMENT ({document_format}, {char_count} characters):
{document_text}"#;

pub const SUMMARY_TASK: &str = "Summarize the following business document. \
Identify what kind of document it is, its main topic, and the findings a busy \
owner-operator needs to act on.";

pub const RESUME_REVIEW_TASK: &str = "Review the following resume as a hiring \
consultant. Extract the candidate's name, total years of experience and primary \
skills, then list concrete, actionable improvements (quantified impact, missing \
keywords, structure). When a target job description is given, judge fit against it.";

pub const COMPLIANCE_TASK: &str = "Check the following business document against \
the compliance rule below. Extract the document type and the parties involved, and \
make each key insight name a satisfied or violated requirement.";

pub const DATA_EXTRACTION_TASK: &str = "Extract the structured business data from \
the following document (invoice, receipt, purchase order, or similar). Values must be \
copied exactly as written, including currency symbols.";

/// Used when the schema has no compliance rule.
pub const NO_COMPLIANCE_RULE: &str =
    "No compliance rule applies to this analysis: set \"compliance_status\" to \"unknown\".";

/// Compliance rule preamble. Placeholders: {rule_name}, {requirements}
pub const COMPLIANCE_RULE_TEMPLATE: &str = "COMPLIANCE RULE ({rule_name}): the document is \
\"compliant\" only if it meets ALL of the following, otherwise \"non_compliant\". Use \
\"unknown\" only when the document is too incomplete to judge.\n{requirements}";

/// Appended for resume reviews that target a specific role. Placeholder: {job_description}
pub const JOB_DESCRIPTION_CONTEXT: &str = "\nTARGET JOB DESCRIPTION:\n{job_description}\n";
