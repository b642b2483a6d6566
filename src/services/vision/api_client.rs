use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::PipelineSettings;
use crate::core::errors::{ConfigError, ModelCallError, ModelResult};
use crate::services::vision::chat::{ChatCompletionResponse, ChatModel, ChatRequest};
use crate::utils::Metrics;

/// OpenAI-compatible chat-completions client.
///
/// Makes exactly one HTTP attempt per call. Retries, if wanted, belong to
/// whoever wraps this client.
pub struct ApiClient {
    api_url: String,
    api_key: String,
    http_client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl ApiClient {
    pub fn new(settings: &PipelineSettings, metrics: Option<Metrics>) -> Result<Self, ConfigError> {
        // Create HTTP client with timeout and connection pooling
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            http_client,
            metrics,
        })
    }

    async fn send(&self, request: &ChatRequest) -> ModelResult<ChatCompletionResponse> {
        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) if !text.is_empty() => text,
                _ => format!("HTTP {}", status),
            };
            return Err(ModelCallError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ModelCallError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for ApiClient {
    #[instrument(skip(self, request), fields(model = %request.model, images = request.image_count()))]
    async fn complete(&self, request: &ChatRequest) -> ModelResult<Option<String>> {
        let start = Instant::now();
        let result = self.send(request).await;
        let duration = start.elapsed();

        match result {
            Ok(response) => {
                let (input_tokens, output_tokens) = response
                    .usage
                    .as_ref()
                    .map(|u| (u.prompt_tokens, u.completion_tokens))
                    .unwrap_or((0, 0));

                if let Some(ref m) = self.metrics {
                    m.record_model_call(true, duration, input_tokens, output_tokens);
                }

                debug!(
                    "Model call finished in {}ms ({} in / {} out tokens)",
                    duration.as_millis(),
                    input_tokens,
                    output_tokens
                );
                Ok(response.into_text())
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_model_call(false, duration, 0, 0);
                }
                warn!("Model call failed after {}ms: {}", duration.as_millis(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ImageConfig;
    use crate::services::vision::chat::{ChatMessage, ContentPart};
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Clone)]
    struct MockUpstream {
        status: StatusCode,
        body: Value,
        seen: Arc<parking_lot::Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn mock_completions(
        State(mock): State<MockUpstream>,
        headers: HeaderMap,
        Json(payload): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        mock.seen.lock().push((auth, payload));
        (mock.status, Json(mock.body.clone()))
    }

    async fn spawn_upstream(mock: MockUpstream) -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(mock_completions))
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    // Upstream that answers every call with a fixed plain-text body
    async fn spawn_text_upstream(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || async move { (status, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn settings(api_url: String) -> PipelineSettings {
        PipelineSettings {
            api_key: "sk-test".to_string(),
            api_url,
            model: "gpt-4o".to_string(),
            max_output_tokens: 1000,
            timeout: Duration::from_secs(5),
            analysis_prompt: "Inspect.".to_string(),
            summary_prompt: "Summarize.".to_string(),
            image: ImageConfig::default(),
        }
    }

    fn text_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![
                ChatMessage::system("persona"),
                ChatMessage::user(vec![ContentPart::Text {
                    text: "hello".to_string(),
                }]),
            ],
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mock = MockUpstream {
            status: StatusCode::OK,
            body: json!({
                "choices": [{ "message": { "content": "Roof looks sound." } }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
            }),
            seen: Arc::default(),
        };
        let url = spawn_upstream(mock.clone()).await;
        let metrics = Metrics::new();
        let client = ApiClient::new(&settings(url), Some(metrics.clone())).unwrap();

        let text = client.complete(&text_request()).await.unwrap();
        assert_eq!(text.as_deref(), Some("Roof looks sound."));

        let seen = mock.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer sk-test"));
        assert_eq!(seen[0].1["max_tokens"], 1000);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.model_calls_success, 1);
        assert_eq!(snapshot.model_tokens_output, 4);
    }

    #[tokio::test]
    async fn test_non_success_status_carries_body() {
        let mock = MockUpstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: json!({ "error": { "message": "Rate limit reached" } }),
            seen: Arc::default(),
        };
        let url = spawn_upstream(mock.clone()).await;
        let client = ApiClient::new(&settings(url), None).unwrap();

        let err = client.complete(&text_request()).await.unwrap_err();
        match err {
            ModelCallError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Rate limit reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // One attempt only
        assert_eq!(mock.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_none() {
        let mock = MockUpstream {
            status: StatusCode::OK,
            body: json!({ "choices": [] }),
            seen: Arc::default(),
        };
        let url = spawn_upstream(mock).await;
        let client = ApiClient::new(&settings(url), None).unwrap();

        assert_eq!(client.complete(&text_request()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_error_body_falls_back_to_status() {
        let url = spawn_text_upstream(StatusCode::SERVICE_UNAVAILABLE, "").await;
        let client = ApiClient::new(&settings(url), None).unwrap();

        let err = client.complete(&text_request()).await.unwrap_err();
        assert_eq!(
            err,
            ModelCallError::Api {
                status: 503,
                body: "HTTP 503 Service Unavailable".to_string(),
            }
        );
        assert_eq!(err.to_string(), "model API error: HTTP 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_malformed() {
        let url = spawn_text_upstream(StatusCode::OK, "upstream maintenance page").await;
        let metrics = Metrics::new();
        let client = ApiClient::new(&settings(url), Some(metrics.clone())).unwrap();

        let err = client.complete(&text_request()).await.unwrap_err();
        assert!(matches!(err, ModelCallError::MalformedResponse(_)));
        assert_eq!(metrics.snapshot().model_calls_failed, 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            ApiClient::new(&settings(format!("http://{}/v1/chat/completions", addr)), None)
                .unwrap();
        let err = client.complete(&text_request()).await.unwrap_err();
        assert!(matches!(err, ModelCallError::Transport(_)));
    }
}
