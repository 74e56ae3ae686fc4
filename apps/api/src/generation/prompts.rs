// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for LinkedIn posts.
/// Replace: {json_only_instruction}
pub const LINKEDIN_SYSTEM: &str = "You are an experienced B2B copywriter who writes \
    LinkedIn posts that read like a real person wrote them: concrete, specific, \
    no buzzword chains, no emoji walls. \
    {json_only_instruction}";

/// LinkedIn post template.
/// Replace: {topic}, {key_points}, {tone_instruction}, {length_instruction},
///          {audience}, {hashtag_instruction}, {call_to_action}, {variation_instruction}
pub const LINKEDIN_PROMPT_TEMPLATE: &str = r#"Write a LinkedIn post.

TOPIC:
{topic}

KEY POINTS to cover (in any order, do NOT add claims beyond these):
{key_points}

TONE: {tone_instruction}
LENGTH: {length_instruction}
AUDIENCE: {audience}
HASHTAGS: {hashtag_instruction}
CALL TO ACTION: {call_to_action}

{variation_instruction}"#;

/// System prompt for email replies.
/// Replace: {json_only_instruction}
pub const EMAIL_REPLY_SYSTEM: &str = "You are an assistant drafting business email \
    replies on the user's behalf. Answer what the sender actually asked, \
    commit only to what the key points commit to, and never invent dates, \
    prices, or names. \
    {json_only_instruction}";

/// Email reply template.
/// Replace: {original_email}, {key_points}, {tone_instruction},
///          {length_instruction}, {signature_instruction}, {variation_instruction}
pub const EMAIL_REPLY_PROMPT_TEMPLATE: &str = r#"Draft a reply to the email below.

ORIGINAL EMAIL:
"""
{original_email}
"""

POINTS the reply must make:
{key_points}

TONE: {tone_instruction}
LENGTH: {length_instruction}
SIGN-OFF: {signature_instruction}

Do NOT include a subject line. Do NOT quote the original email back.

{variation_instruction}"#;

/// Output contract shared by both content types.
/// Replace: {alternatives}
pub const VARIATION_INSTRUCTION_TEMPLATE: &str = r#"Return a JSON object with this EXACT schema:
{
  "content": "the primary draft",
  "variations": ["alternative draft", "..."]
}
`variations` must contain exactly {alternatives} alternative draft(s) that differ in opening and structure, not just wording."#;

pub const NO_HASHTAGS: &str = "none";
pub const HASHTAGS: &str = "end with 3 to 5 relevant hashtags on their own line";
pub const NO_CALL_TO_ACTION: &str = "none; end on the strongest point";
pub const NO_SIGNATURE: &str = "close politely without a name";
