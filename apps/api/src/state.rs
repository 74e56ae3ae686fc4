use crate::config::Config;
use crate::generation::ContentGenerator;
use crate::pipeline::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The orchestrator and generator hold clones of one `CompletionClient`, so
/// both endpoints draw from the same concurrency cap.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub generator: ContentGenerator,
    pub config: Config,
}
