// Main entry point for the roof inspection analysis service

use roof_inspect::{api, Config, InspectionOrchestrator, Metrics};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    let filter = EnvFilter::new(format!(
        "roof_inspect={},tower_http=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== ROOF INSPECTION ANALYSIS SERVICE ===");

    let metrics = Metrics::new();

    // Missing secrets do not stop the server; /api/analyze reports them as 500
    let pipeline = config
        .pipeline_settings()
        .and_then(|settings| {
            info!(
                "Model: {} (max {} tokens, timeout {:?}), up to {} images per request",
                settings.model,
                settings.max_output_tokens,
                settings.timeout,
                settings.image.max_images_per_request
            );
            InspectionOrchestrator::from_settings(&settings, metrics.clone())
        });
    if let Err(ref e) = pipeline {
        warn!("Analysis pipeline not configured: {}", e);
    }

    let state = api::AppState::new(pipeline, metrics);
    let app = api::router(state, config.max_body_bytes());

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /             - Root endpoint");
    info!("  GET  /health       - Health check");
    info!("  GET  /metrics      - Prometheus metrics");
    info!("  GET  /stats        - Detailed statistics");
    info!("  POST /api/analyze  - Analyze roof photos (multipart/form-data)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
