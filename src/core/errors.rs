// Custom error types for the inspection pipeline
//
// Using thiserror for ergonomic error definitions. Per-image errors
// (ImageProcessingError, ModelCallError during analysis) are recovered into
// findings; the request-level AnalysisError is what reaches the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Image normalization errors (recovered per image)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageProcessingError {
    #[error("failed to process image")]
    ProcessingFailed,

    #[error("too large even after resizing")]
    TooLarge,

    #[error("unsupported file type")]
    UnsupportedType,
}

/// Model endpoint errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelCallError {
    #[error("model API error: {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Transport(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ModelCallError {
    fn from(e: reqwest::Error) -> Self {
        ModelCallError::Transport(e.to_string())
    }
}

/// Request validation errors (always 400)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Content-Type must be multipart/form-data")]
    NotMultipart,

    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    #[error("Address is required.")]
    MissingLocation,

    #[error("No images uploaded.")]
    NoImages,

    #[error("Maximum {max} images allowed.")]
    TooManyImages { max: usize, got: usize },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("OpenAI API key not set on server.")]
    MissingApiKey,

    #[error("AI prompt not set on server.")]
    MissingAnalysisPrompt,

    #[error("Summarizing prompt not set on server.")]
    MissingSummaryPrompt,

    #[error("Invalid image config: {0}")]
    InvalidImageConfig(String),

    #[error("Invalid API config: {0}")]
    InvalidApiConfig(String),

    #[error("HTTP client initialization failed: {0}")]
    HttpClient(String),
}

/// Terminal, request-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", summary_message(.0))]
    Summary(ModelCallError),
}

fn summary_message(err: &ModelCallError) -> String {
    match err {
        ModelCallError::Api { body, .. } => format!("model API error (summary): {}", body),
        other => other.to_string(),
    }
}

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::Summary(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

// Convenience type aliases for Results
pub type ImageResult<T> = Result<T, ImageProcessingError>;
pub type ModelResult<T> = Result<T, ModelCallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AnalysisError::from(ConfigError::MissingApiKey).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AnalysisError::from(ValidationError::NoImages).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AnalysisError::Summary(ModelCallError::Transport("reset".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_summary_error_keeps_upstream_text() {
        let err = AnalysisError::Summary(ModelCallError::Api {
            status: 429,
            body: "{\"error\":\"quota exceeded\"}".into(),
        });
        assert_eq!(
            err.to_string(),
            "model API error (summary): {\"error\":\"quota exceeded\"}"
        );

        let err = AnalysisError::Summary(ModelCallError::Transport("connection refused".into()));
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::TooManyImages { max: 10, got: 11 }.to_string(),
            "Maximum 10 images allowed."
        );
        assert_eq!(ValidationError::MissingLocation.to_string(), "Address is required.");
    }
}
