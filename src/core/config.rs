use crate::core::errors::ConfigError;
use crate::core::types::MAX_IMAGES;
use std::env;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub max_body_bytes: usize,
}

/// Model API configuration
#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
}

// Keep the key out of any {:?} output
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Instruction prompts supplied by the operator
#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    pub analysis_prompt: Option<String>,
    pub summary_prompt: Option<String>,
}

/// Image admission configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Bounding box edge (images are fit inside max x max)
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub max_data_uri_chars: usize,
    pub max_images_per_request: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 85,
            max_data_uri_chars: 20_000_000,
            max_images_per_request: MAX_IMAGES,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub prompts: PromptConfig,
    pub image: ImageConfig,
}

/// Everything the pipeline needs, with the secrets known to be present.
#[derive(Clone)]
pub struct PipelineSettings {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout: Duration,
    pub analysis_prompt: String,
    pub summary_prompt: String,
    pub image: ImageConfig,
}

impl std::fmt::Debug for PipelineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSettings")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let defaults = ImageConfig::default();

        Self {
            server: ServerConfig {
                port: parse_var("SERVER_PORT").unwrap_or(3000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
                max_body_bytes: parse_var("MAX_BODY_BYTES").unwrap_or(100 * 1024 * 1024),
            },
            api: ApiConfig {
                api_key: non_empty_var("OPENAI_API_KEY"),
                api_url: env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                max_output_tokens: parse_var("MAX_OUTPUT_TOKENS").unwrap_or(1000),
                timeout_seconds: parse_var("API_TIMEOUT_SECONDS").unwrap_or(120),
            },
            prompts: PromptConfig {
                analysis_prompt: non_empty_var("ROOF_AI_PROMPT"),
                summary_prompt: non_empty_var("SUMMARIZE_AI_PROMPT"),
            },
            image: ImageConfig {
                max_dimension: parse_var("MAX_IMAGE_DIMENSION").unwrap_or(defaults.max_dimension),
                jpeg_quality: parse_var("JPEG_QUALITY").unwrap_or(defaults.jpeg_quality),
                max_data_uri_chars: parse_var("MAX_DATA_URI_CHARS")
                    .unwrap_or(defaults.max_data_uri_chars),
                max_images_per_request: parse_var("MAX_IMAGES_PER_REQUEST")
                    .unwrap_or(defaults.max_images_per_request),
            },
        }
    }

    /// Validate numeric settings. Missing secrets are not checked here; see
    /// [`Config::pipeline_settings`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.max_dimension == 0 {
            return Err(ConfigError::InvalidImageConfig(
                "max_dimension must be > 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.image.jpeg_quality) {
            return Err(ConfigError::InvalidImageConfig(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.image.jpeg_quality
            )));
        }

        if !(1..=MAX_IMAGES).contains(&self.image.max_images_per_request) {
            return Err(ConfigError::InvalidImageConfig(format!(
                "max_images_per_request must be between 1 and {}, got {}",
                MAX_IMAGES, self.image.max_images_per_request
            )));
        }

        if self.api.max_output_tokens == 0 {
            return Err(ConfigError::InvalidApiConfig(
                "max_output_tokens must be > 0".to_string(),
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidApiConfig(
                "timeout_seconds must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the settings the analysis pipeline runs with.
    ///
    /// Checked in the order the analyze endpoint reports them: API key,
    /// per-image prompt, summary prompt.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        let api_key = self.api.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        let analysis_prompt = self
            .prompts
            .analysis_prompt
            .clone()
            .ok_or(ConfigError::MissingAnalysisPrompt)?;
        let summary_prompt = self
            .prompts
            .summary_prompt
            .clone()
            .ok_or(ConfigError::MissingSummaryPrompt)?;

        Ok(PipelineSettings {
            api_key,
            api_url: self.api.api_url.clone(),
            model: self.api.model.clone(),
            max_output_tokens: self.api.max_output_tokens,
            timeout: Duration::from_secs(self.api.timeout_seconds),
            analysis_prompt,
            summary_prompt,
            image: self.image.clone(),
        })
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn max_body_bytes(&self) -> usize {
        self.server.max_body_bytes
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}
