mod analysis;
mod config;
mod errors;
mod extraction;
mod generation;
mod llm_client;
mod pipeline;
mod prompt;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::ContentGenerator;
use crate::llm_client::CompletionClient;
use crate::pipeline::Orchestrator;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docpilot API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the completion client shared by analysis and generation
    let completion_config = config.completion_config();
    let completion = CompletionClient::new(completion_config.clone())?;
    info!(
        "Completion client initialized (model: {}, max_attempts: {}, max_concurrency: {})",
        completion_config.model,
        completion.retry_policy().max_attempts,
        completion_config.max_concurrency
    );

    let state = AppState {
        orchestrator: Orchestrator::new(
            completion.clone(),
            &config.completion_model,
            config.completion_max_tokens,
        ),
        generator: ContentGenerator::new(
            completion,
            &config.completion_model,
            config.completion_max_tokens,
        ),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr} (max upload {} bytes)", config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
