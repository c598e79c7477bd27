//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific concern.

pub mod build;
pub mod error;
pub mod health;
pub mod progress;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Build endpoints
        .route("/build-app", post(build::submit_build))
        .route("/build-progress/{id}", get(progress::stream_progress))
        .route("/download-apk/{id}", get(build::download_artifact));

    // Static web UI
    let router = match &config.web_dir {
        Some(dir) => {
            tracing::info!("Serving web UI from {}", dir.display());
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    };

    // Add state and middleware
    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
