// Phase 2: Per-Image Analysis Pipeline

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::config::PipelineSettings;
use crate::core::types::{ImageFinding, NormalizedImage};
use crate::services::vision::{ChatMessage, ChatModel, ChatRequest, ContentPart, ImageUrl};

pub const INSPECTOR_PERSONA: &str = "You are a certified roof inspector with expertise in \
analyzing roof conditions from images. When provided with an image, you should carefully \
examine it and provide detailed, specific analysis based on what you can observe. This tool \
is used by professional roofers for quick analysis, so provide direct technical assessment \
without suggesting to consult other professionals. Format your response with proper bold \
text for section headers.";

pub const NO_ANALYSIS_RETURNED: &str = "No analysis returned.";

/// Phase 2 pipeline: one model call per normalized image
pub struct Phase2Pipeline {
    model: Arc<dyn ChatModel>,
    model_name: String,
    max_tokens: u32,
    prompt: String,
}

impl Phase2Pipeline {
    pub fn new(settings: &PipelineSettings, model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            model_name: settings.model.clone(),
            max_tokens: settings.max_output_tokens,
            prompt: settings.analysis_prompt.clone(),
        }
    }

    pub fn build_request(&self, image: &NormalizedImage) -> ChatRequest {
        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage::system(INSPECTOR_PERSONA),
                ChatMessage::user(vec![
                    ContentPart::Text {
                        text: self.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_uri.clone(),
                        },
                    },
                ]),
            ],
            max_tokens: self.max_tokens,
        }
    }

    /// Analyze one image. Never fails: a model error becomes a failure finding.
    #[instrument(skip(self, image), fields(image = %image.source_name))]
    pub async fn execute(&self, image: &NormalizedImage) -> ImageFinding {
        let request = self.build_request(image);

        match self.model.complete(&request).await {
            Ok(Some(text)) => {
                debug!("Received {} chars of analysis", text.len());
                ImageFinding::success(&image.source_name, text)
            }
            Ok(None) => ImageFinding::success(&image.source_name, NO_ANALYSIS_RETURNED),
            Err(e) => {
                warn!("Analysis failed for {}: {}", image.source_name, e);
                ImageFinding::failure(&image.source_name, e.to_string())
            }
        }
    }
}
