pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, ImageConfig, PipelineSettings};
pub use errors::{
    AnalysisError, ConfigError, ImageProcessingError, ModelCallError, ValidationError,
};
pub use types::{
    AnalysisRequest, AnalysisSummary, FindingOutcome, ImageFinding, InspectionReport,
    NormalizedImage, RawImage, MAX_IMAGES,
};
