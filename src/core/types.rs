// Request, image and finding types for the inspection workflow

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::errors::ValidationError;

/// Upper bound on images in one request
pub const MAX_IMAGES: usize = 10;

/// One uploaded file, as received
#[derive(Clone)]
pub struct RawImage {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Image resized and encoded for the model endpoint
#[derive(Clone)]
pub struct NormalizedImage {
    pub source_name: String,
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("source_name", &self.source_name)
            .field("data_uri_len", &self.data_uri.len())
            .finish()
    }
}

/// Result of analyzing a single image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingOutcome {
    Success(String),
    Failure(String),
}

/// Labeled outcome for one input image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFinding {
    pub source_name: String,
    pub outcome: FindingOutcome,
}

impl ImageFinding {
    pub fn success(source_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            outcome: FindingOutcome::Success(text.into()),
        }
    }

    pub fn failure(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            outcome: FindingOutcome::Failure(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FindingOutcome::Success(_))
    }

    /// Render as `"<name>: <text or reason>"` for the summary prompt
    pub fn to_labeled_line(&self) -> String {
        let body = match &self.outcome {
            FindingOutcome::Success(text) => text,
            FindingOutcome::Failure(reason) => reason,
        };
        format!("{}: {}", self.source_name, body)
    }
}

/// A validated analysis request
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    location: String,
    images: Vec<RawImage>,
}

impl AnalysisRequest {
    /// Validate location and image count, in that order.
    pub fn new(
        location: impl Into<String>,
        images: Vec<RawImage>,
        max_images: usize,
    ) -> Result<Self, ValidationError> {
        let location = location.into();
        if location.trim().is_empty() {
            return Err(ValidationError::MissingLocation);
        }
        if images.is_empty() {
            return Err(ValidationError::NoImages);
        }
        if images.len() > max_images {
            return Err(ValidationError::TooManyImages {
                max: max_images,
                got: images.len(),
            });
        }
        Ok(Self { location, images })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn images(&self) -> &[RawImage] {
        &self.images
    }

    pub fn into_parts(self) -> (String, Vec<RawImage>) {
        (self.location, self.images)
    }
}

/// Everything one completed request produced
#[derive(Debug, Clone)]
pub struct InspectionReport {
    pub location: String,
    /// One per input image, in upload order
    pub findings: Vec<ImageFinding>,
    pub summary: String,
}

/// Successful response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub summary: String,
}
