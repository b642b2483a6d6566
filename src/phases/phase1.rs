// Phase 1: Image Normalization Pipeline

use tracing::{debug, instrument};

use crate::core::config::ImageConfig;
use crate::core::errors::ImageResult;
use crate::core::types::{NormalizedImage, RawImage};
use crate::utils::image_ops::normalize_image_async;
use crate::utils::Metrics;

/// Phase 1 pipeline: admit one upload and turn it into a model-ready data URI
pub struct Phase1Pipeline {
    config: ImageConfig,
    metrics: Option<Metrics>,
}

impl Phase1Pipeline {
    pub fn new(config: ImageConfig, metrics: Option<Metrics>) -> Self {
        Self { config, metrics }
    }

    /// Execute Phase 1 on a single upload
    ///
    /// # Steps:
    /// 1. Decode the bytes (format sniffed from content)
    /// 2. Shrink to fit the bounding box, never enlarging
    /// 3. Re-encode as JPEG and wrap as a base64 data URI
    /// 4. Reject oversized payloads, then non-image media types
    ///
    /// Failures are per image; the caller records them as findings.
    #[instrument(skip(self, raw), fields(
        image = %raw.name,
        mime = %raw.mime_type,
        bytes = raw.bytes.len()
    ))]
    pub async fn execute(&self, raw: RawImage) -> ImageResult<NormalizedImage> {
        let result = normalize_image_async(raw, self.config.clone()).await;

        match &result {
            Ok(normalized) => {
                debug!("Normalized to {} data URI chars", normalized.data_uri.len());
                if let Some(ref m) = self.metrics {
                    m.record_image_normalized();
                }
            }
            Err(e) => {
                debug!("Rejected: {}", e);
                if let Some(ref m) = self.metrics {
                    m.record_image_rejected();
                }
            }
        }

        result
    }
}
