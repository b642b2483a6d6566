// Inspection Orchestrator: main workflow coordinator

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::core::config::PipelineSettings;
use crate::core::errors::{AnalysisError, ConfigError};
use crate::core::types::{AnalysisRequest, ImageFinding, InspectionReport, RawImage};
use crate::phases::phase1::Phase1Pipeline;
use crate::phases::phase2::Phase2Pipeline;
use crate::phases::phase3::Phase3Pipeline;
use crate::services::vision::{ApiClient, ChatModel};
use crate::utils::Metrics;

/// Drives one request through normalize → analyze (per image) → summarize
pub struct InspectionOrchestrator {
    max_images: usize,
    phase1: Phase1Pipeline,
    phase2: Phase2Pipeline,
    phase3: Phase3Pipeline,
    metrics: Metrics,
}

impl InspectionOrchestrator {
    /// Build against the real model endpoint described by `settings`
    pub fn from_settings(settings: &PipelineSettings, metrics: Metrics) -> Result<Self, ConfigError> {
        let client = ApiClient::new(settings, Some(metrics.clone()))?;
        Ok(Self::new(settings, Arc::new(client), metrics))
    }

    pub fn new(settings: &PipelineSettings, model: Arc<dyn ChatModel>, metrics: Metrics) -> Self {
        Self {
            max_images: settings.image.max_images_per_request,
            phase1: Phase1Pipeline::new(settings.image.clone(), Some(metrics.clone())),
            phase2: Phase2Pipeline::new(settings, Arc::clone(&model)),
            phase3: Phase3Pipeline::new(settings, model),
            metrics,
        }
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    /// Normalize then analyze one image. Never fails.
    pub async fn analyze_image(&self, raw: RawImage) -> ImageFinding {
        let name = raw.name.clone();
        match self.phase1.execute(raw).await {
            Ok(normalized) => self.phase2.execute(&normalized).await,
            Err(e) => ImageFinding::failure(name, e.to_string()),
        }
    }

    /// Analyze every image strictly one after another, in upload order.
    ///
    /// Always returns exactly one finding per input image.
    pub async fn analyze_images(&self, images: Vec<RawImage>) -> Vec<ImageFinding> {
        let total = images.len();
        let mut findings = Vec::with_capacity(total);

        for (i, raw) in images.into_iter().enumerate() {
            let finding = self.analyze_image(raw).await;
            info!(
                "Image {}/{} ({}): {}",
                i + 1,
                total,
                finding.source_name,
                if finding.is_success() { "analyzed" } else { "failed" }
            );
            findings.push(finding);
        }

        findings
    }

    /// Run the whole pipeline for a validated request.
    ///
    /// Per-image problems end up inside the summary input; only a failed
    /// summary call makes this return an error.
    #[instrument(skip(self, request), fields(images = request.images().len()))]
    pub async fn process(&self, request: AnalysisRequest) -> Result<InspectionReport, AnalysisError> {
        let start = Instant::now();
        let (location, images) = request.into_parts();

        let findings = self.analyze_images(images).await;
        let labeled_lines: Vec<String> = findings.iter().map(ImageFinding::to_labeled_line).collect();

        let summary = match self.phase3.execute(&location, &labeled_lines).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary failed: {}", e);
                self.metrics.record_summary_failed();
                return Err(AnalysisError::Summary(e));
            }
        };

        let failed = findings.iter().filter(|f| !f.is_success()).count();
        info!(
            "Request completed in {:.2}s: {} images ({} failed)",
            start.elapsed().as_secs_f64(),
            findings.len(),
            failed
        );
        self.metrics.record_request_completed(start.elapsed());

        Ok(InspectionReport {
            location,
            findings,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ImageConfig;
    use crate::core::errors::ModelCallError;
    use crate::core::types::{FindingOutcome, MAX_IMAGES};
    use crate::phases::phase2::NO_ANALYSIS_RETURNED;
    use crate::phases::phase3::NO_SUMMARY_RETURNED;
    use crate::services::vision::{ContentPart, MessageContent, ScriptedModel};
    use crate::utils::image_ops::tests::png_bytes;
    use std::time::Duration;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            api_key: "sk-test".to_string(),
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            max_output_tokens: 1000,
            timeout: Duration::from_secs(5),
            analysis_prompt: "Assess roof condition.".to_string(),
            summary_prompt: "Combine these inspections.".to_string(),
            image: ImageConfig::default(),
        }
    }

    fn photo(name: &str) -> RawImage {
        RawImage {
            name: name.to_string(),
            mime_type: "image/png".to_string(),
            bytes: png_bytes(48, 32),
        }
    }

    fn orchestrator(model: Arc<ScriptedModel>) -> InspectionOrchestrator {
        InspectionOrchestrator::new(&settings(), model, Metrics::new())
    }

    fn user_text(model: &ScriptedModel, call: usize) -> String {
        match &model.requests()[call].messages[1].content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::Text { text } => text.clone(),
                other => panic!("unexpected part {other:?}"),
            },
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_photo_two_calls() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Some("**Shingles**: granule loss".to_string())),
            Ok(Some("Replace within two years.".to_string())),
        ]));
        let orchestrator = orchestrator(Arc::clone(&model));
        let request = AnalysisRequest::new("Dallas, TX", vec![photo("front.png")], MAX_IMAGES).unwrap();

        let report = orchestrator.process(request).await.unwrap();

        assert_eq!(report.summary, "Replace within two years.");
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.requests()[0].image_count(), 1);
        assert_eq!(model.requests()[1].image_count(), 0);
        assert_eq!(
            user_text(&model, 1),
            "Combine these inspections.\n\nfront.png: **Shingles**: granule loss"
        );
        match &model.requests()[1].messages[0].content {
            MessageContent::Text(system) => assert!(system.contains("Dallas, TX")),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_image_part_recorded_and_batch_continues() {
        let model = Arc::new(ScriptedModel::always("looks fine"));
        let orchestrator = orchestrator(Arc::clone(&model));
        let mut notes = photo("notes.txt");
        notes.mime_type = "text/plain".to_string();
        let request = AnalysisRequest::new(
            "Denver, CO",
            vec![photo("a.png"), notes, photo("c.png")],
            MAX_IMAGES,
        )
        .unwrap();

        let report = orchestrator.process(request).await.unwrap();

        assert_eq!(report.findings.len(), 3);
        assert_eq!(
            report.findings[1],
            ImageFinding::failure("notes.txt", "unsupported file type")
        );
        // Two per-image calls plus the summary
        assert_eq!(model.call_count(), 3);
        assert_eq!(
            user_text(&model, 2),
            "Combine these inspections.\n\n\
             a.png: looks fine\n\n\
             notes.txt: unsupported file type\n\n\
             c.png: looks fine"
        );
    }

    #[tokio::test]
    async fn test_corrupt_image_reason() {
        let model = Arc::new(ScriptedModel::default());
        let orchestrator = orchestrator(Arc::clone(&model));
        let broken = RawImage {
            name: "broken.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0x00],
        };

        let findings = orchestrator.analyze_images(vec![broken, photo("ok.png")]).await;

        assert_eq!(
            findings[0].to_labeled_line(),
            "broken.jpg: failed to process image"
        );
        assert!(findings[1].is_success());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_isolated_to_one_image() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Some("first".to_string())),
            Err(ModelCallError::Api {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
            Err(ModelCallError::Transport("connection reset".to_string())),
            Ok(None),
        ]));
        let orchestrator = orchestrator(Arc::clone(&model));
        let images = ["1.png", "2.png", "3.png", "4.png"].into_iter().map(photo).collect();

        let findings = orchestrator.analyze_images(images).await;

        let names: Vec<_> = findings.iter().map(|f| f.source_name.as_str()).collect();
        assert_eq!(names, ["1.png", "2.png", "3.png", "4.png"]);
        assert_eq!(findings[0].outcome, FindingOutcome::Success("first".to_string()));
        assert_eq!(
            findings[1].outcome,
            FindingOutcome::Failure("model API error: upstream exploded".to_string())
        );
        assert_eq!(
            findings[2].outcome,
            FindingOutcome::Failure("connection reset".to_string())
        );
        assert_eq!(
            findings[3].outcome,
            FindingOutcome::Success(NO_ANALYSIS_RETURNED.to_string())
        );
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_finding_count_matches_input_when_all_fail() {
        let model = Arc::new(ScriptedModel::default());
        let orchestrator = orchestrator(Arc::clone(&model));
        let images: Vec<RawImage> = (0..MAX_IMAGES)
            .map(|i| RawImage {
                name: format!("{}.heic", i),
                mime_type: "image/heic".to_string(),
                bytes: vec![i as u8; 16],
            })
            .collect();
        let request = AnalysisRequest::new("Tulsa, OK", images, MAX_IMAGES).unwrap();

        let report = orchestrator.process(request).await.unwrap();

        assert_eq!(report.findings.len(), MAX_IMAGES);
        assert!(report.findings.iter().all(|f| !f.is_success()));
        // Only the summary call reached the model
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_summary_failure_is_fatal() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Some("fine".to_string())),
            Err(ModelCallError::Api {
                status: 503,
                body: "overloaded".to_string(),
            }),
        ]));
        let metrics = Metrics::new();
        let orchestrator = InspectionOrchestrator::new(&settings(), model, metrics.clone());
        let request = AnalysisRequest::new("Omaha, NE", vec![photo("roof.png")], MAX_IMAGES).unwrap();

        let err = orchestrator.process(request).await.unwrap_err();

        assert_eq!(err.to_string(), "model API error (summary): overloaded");
        assert_eq!(metrics.snapshot().summaries_failed, 1);
        assert_eq!(metrics.snapshot().requests_completed, 0);
    }

    #[tokio::test]
    async fn test_empty_summary_defaults() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(Some("ok".to_string())), Ok(None)]));
        let orchestrator = orchestrator(model);
        let request = AnalysisRequest::new("Miami, FL", vec![photo("roof.png")], MAX_IMAGES).unwrap();

        let report = orchestrator.process(request).await.unwrap();
        assert_eq!(report.summary, NO_SUMMARY_RETURNED);
    }
}
