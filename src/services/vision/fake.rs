use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::core::errors::ModelResult;
use crate::services::vision::chat::{ChatModel, ChatRequest};

/// In-memory stand-in for the model endpoint.
///
/// Replies are served in order from the script; once it runs dry every call
/// gets `fallback`. Every request is recorded for inspection.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelResult<Option<String>>>>,
    fallback: ModelResult<Option<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<ModelResult<Option<String>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Ok(Some("Roof in serviceable condition.".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same text
    pub fn always(text: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(Some(text.to_string())))
    }

    pub fn with_fallback(mut self, fallback: ModelResult<Option<String>>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> ModelResult<Option<String>> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
