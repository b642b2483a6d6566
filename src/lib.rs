// Library exports for the roof inspection analysis service

pub mod api;
pub mod core;
pub mod orchestration;
pub mod phases;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::{Config, PipelineSettings},
    errors::{AnalysisError, ConfigError, ImageProcessingError, ModelCallError, ValidationError},
    types::{AnalysisRequest, AnalysisSummary, FindingOutcome, ImageFinding, InspectionReport, RawImage},
};

pub use api::{router, AppState};

pub use orchestration::InspectionOrchestrator;

pub use services::vision::{ApiClient, ChatModel, ChatRequest, ScriptedModel};

pub use utils::Metrics;
