pub mod vision;

// Re-export commonly used services
pub use vision::{ApiClient, ChatModel, ScriptedModel};
