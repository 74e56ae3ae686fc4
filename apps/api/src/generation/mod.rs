// Content generation: LinkedIn posts and email replies.
// All LLM calls go through llm_client; no direct Anthropic calls here.

pub mod content;
pub mod generator;
pub mod handlers;
pub mod prompts;

pub use generator::ContentGenerator;
