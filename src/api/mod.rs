pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::core::errors::ConfigError;
use crate::orchestration::InspectionOrchestrator;
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `Err` when required secrets or prompts are missing; the analyze
    /// endpoint then answers 500 with the configuration error.
    pub pipeline: Result<Arc<InspectionOrchestrator>, ConfigError>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pipeline: Result<InspectionOrchestrator, ConfigError>, metrics: Metrics) -> Self {
        Self {
            pipeline: pipeline.map(Arc::new),
            metrics,
        }
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/stats", get(handlers::stats_endpoint))
        .route("/api/analyze", post(handlers::analyze))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
}
