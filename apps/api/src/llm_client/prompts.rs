// Shared prompt fragments.
// Each feature module keeps its own prompts.rs; cross-cutting pieces live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps analysis answers tied to the supplied document.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Use only facts stated in the document provided. \
    Do NOT infer, interpolate, or invent details. \
    If the document does not support a field, leave it out rather than guessing.";

/// Instruction for the self-reported confidence figure the structurer reads back.
pub const CONFIDENCE_INSTRUCTION: &str = "\
    Report `confidence_score` as a number from 0 to 100 describing how well the \
    document supports your answer: 90+ when every field is stated verbatim, \
    50-89 when some fields required interpretation, below 50 when the document \
    is thin, ambiguous, or off-topic.";
