// HTTP handlers

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::core::errors::{AnalysisError, ValidationError};
use crate::core::types::{AnalysisRequest, AnalysisSummary, RawImage};
use crate::orchestration::InspectionOrchestrator;

pub async fn root() -> &'static str {
    "Roof Inspection Analysis Service"
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "pipeline_configured": state.pipeline.is_ok(),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
pub async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Analyze roof photos
///
/// # Request Format:
/// - multipart/form-data
/// - Field "address": location of the roof (required, non-blank)
/// - Field "images": 1 to 10 image files
///
/// # Response:
/// - `{"summary": "..."}` on success
/// - `{"error": "..."}` with 400 (bad request) or 500 (configuration or
///   summary failure)
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisSummary>, AnalysisError> {
    state.metrics.record_endpoint_request("/api/analyze");

    let result = run_analysis(&state, multipart).await;
    match &result {
        Ok(_) => {}
        Err(AnalysisError::Summary(_)) => error!("Analysis failed during summary"),
        Err(e) => {
            warn!("Analysis request rejected: {}", e);
            state.metrics.record_request_rejected();
        }
    }
    result
}

async fn run_analysis(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisSummary>, AnalysisError> {
    // Configuration problems outrank anything wrong with the request itself
    let orchestrator: Arc<InspectionOrchestrator> = state.pipeline.clone()?;
    let multipart = multipart.map_err(|_| ValidationError::NotMultipart)?;

    let form = read_form(multipart).await?;
    info!(
        "Received analyze request with {} image part(s)",
        form.images.len()
    );

    let request = AnalysisRequest::new(form.address, form.images, orchestrator.max_images())?;
    let report = orchestrator.process(request).await?;

    Ok(Json(AnalysisSummary {
        summary: report.summary,
    }))
}

#[derive(Debug, Default)]
struct AnalyzeForm {
    address: String,
    images: Vec<RawImage>,
}

/// Collect the `address` text field and every file part named `images`.
///
/// Parts without a filename under `images` and unknown fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, ValidationError> {
    let mut form = AnalyzeForm::default();
    let mut address_seen = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::InvalidMultipart(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "address" if !address_seen => {
                address_seen = true;
                form.address = field
                    .text()
                    .await
                    .map_err(|e| ValidationError::InvalidMultipart(e.to_string()))?;
            }
            "images" => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ValidationError::InvalidMultipart(e.to_string()))?;

                form.images.push(RawImage {
                    name: filename,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}
