use std::sync::Arc;

use anyhow::Context;
use apkforge_runner::{BuildPipeline, ExternalToolRunner, InMemoryJobRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod service;
pub mod state;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "apkforge_orchestrator=debug,apkforge_runner=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting APK Forge Orchestrator...");

    let config = config::Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    config.builder.ensure_dirs()?;

    let rules = config.builder.load_rules()?;
    tracing::info!(
        rules = rules.len(),
        project = %config.builder.project_root.display(),
        output = %config.builder.output_dir.display(),
        max_parallel_builds = config.builder.max_parallel_builds,
        "Builder configured"
    );

    let registry = Arc::new(InMemoryJobRegistry::new());
    let pipeline = BuildPipeline::new(
        Arc::new(config.builder.clone()),
        Arc::new(rules),
        registry,
        ExternalToolRunner::new(),
    );
    let state = state::AppState::new(pipeline, config.poll_interval);

    // Build router with all API endpoints
    let app = api::create_router(state, &config);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
