// Phase 3: Summary Pipeline (folds all findings into one recommendation)

use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::config::PipelineSettings;
use crate::core::errors::ModelResult;
use crate::services::vision::{ChatMessage, ChatModel, ChatRequest, ContentPart};

pub const NO_SUMMARY_RETURNED: &str = "No summary returned.";

/// System prompt for the summary call, naming the roof's location
pub fn summary_persona(location: &str) -> String {
    format!(
        "You are a certified roof inspector. Given the following analyses of individual roof \
         images and the location: {}, provide a single, holistic summary and recommendation for \
         the roof as a whole. Consider local weather risks (hail, storms, etc.) in your advice. \
         Do not mention individual images.",
        location
    )
}

/// Phase 3 pipeline: single summary call over every labeled finding
pub struct Phase3Pipeline {
    model: Arc<dyn ChatModel>,
    model_name: String,
    max_tokens: u32,
    prompt: String,
}

impl Phase3Pipeline {
    pub fn new(settings: &PipelineSettings, model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            model_name: settings.model.clone(),
            max_tokens: settings.max_output_tokens,
            prompt: settings.summary_prompt.clone(),
        }
    }

    /// User text is the summary prompt, a blank line, then the findings
    /// separated by blank lines in the order given.
    pub fn build_request(&self, location: &str, labeled_lines: &[String]) -> ChatRequest {
        let text = format!("{}\n\n{}", self.prompt, labeled_lines.join("\n\n"));

        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage::system(summary_persona(location)),
                ChatMessage::user(vec![ContentPart::Text { text }]),
            ],
            max_tokens: self.max_tokens,
        }
    }

    /// Execute Phase 3. A model error here is returned to the caller and
    /// ends the request.
    #[instrument(skip(self, location, labeled_lines), fields(findings = labeled_lines.len()))]
    pub async fn execute(&self, location: &str, labeled_lines: &[String]) -> ModelResult<String> {
        let request = self.build_request(location, labeled_lines);
        let summary = self.model.complete(&request).await?;

        info!("Summary call completed");
        Ok(summary.unwrap_or_else(|| NO_SUMMARY_RETURNED.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ImageConfig;
    use crate::services::vision::{MessageContent, ScriptedModel};
    use std::time::Duration;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            api_key: "sk-test".to_string(),
            api_url: "http://localhost/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            max_output_tokens: 1000,
            timeout: Duration::from_secs(5),
            analysis_prompt: "Describe damage.".to_string(),
            summary_prompt: "Write the report.".to_string(),
            image: ImageConfig::default(),
        }
    }

    #[test]
    fn test_summary_request_text_only() {
        let pipeline = Phase3Pipeline::new(&settings(), Arc::new(ScriptedModel::default()));
        let lines = vec![
            "a.jpg: missing shingles".to_string(),
            "b.jpg: failed to process image".to_string(),
        ];

        let request = pipeline.build_request("Wichita, KS", &lines);

        assert_eq!(request.image_count(), 0);
        assert_eq!(
            request.messages[0].content,
            MessageContent::Text(summary_persona("Wichita, KS"))
        );
        assert_eq!(
            request.messages[1].content,
            MessageContent::Parts(vec![ContentPart::Text {
                text: "Write the report.\n\na.jpg: missing shingles\n\nb.jpg: failed to process image"
                    .to_string()
            }])
        );
    }

    #[test]
    fn test_persona_mentions_weather_and_forbids_per_image() {
        let persona = summary_persona("Dallas, TX");
        assert!(persona.contains("Dallas, TX"));
        assert!(persona.contains("hail"));
        assert!(persona.contains("Do not mention individual images"));
    }
}
