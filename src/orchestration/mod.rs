pub mod inspection_orchestrator;

pub use inspection_orchestrator::InspectionOrchestrator;
