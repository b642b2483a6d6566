pub mod api_client;
pub mod chat;
pub mod fake;

pub use api_client::ApiClient;
pub use chat::{ChatMessage, ChatModel, ChatRequest, ContentPart, ImageUrl, MessageContent, Role};
pub use fake::ScriptedModel;
