//! Chat-completions client for the tutor model.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol; the default
//! configuration points at OpenRouter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use lexi_core::config::LlmConfig;

use crate::error::ChatError;

/// Sampling temperature for every tutor request.
pub const MODEL_TEMPERATURE: f64 = 0.3;

/// A language model that turns one prompt into raw text.
///
/// One call per turn, no streaming and no retry.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ChatModel`] backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenRouterClient {
    client: Client,
    config: LlmConfig,
}

impl OpenRouterClient {
    /// Build a client whose requests time out after `timeout_secs`.
    pub fn new(config: LlmConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ChatError::ModelCall(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": MODEL_TEMPERATURE
        })
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        if self.config.api_key.is_empty() {
            tracing::warn!("No model API key configured; request will likely be rejected");
        }

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::ModelCall(format!("request timed out: {}", e))
                } else {
                    ChatError::ModelCall(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Model provider returned an error status");
            return Err(ChatError::ModelCall(format!(
                "provider returned HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ModelCall(format!("unreadable provider response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::ModelCall("provider returned no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config_for(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            api_key: "test-key".to_string(),
            model: "test/model".to_string(),
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request.
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}/v1/chat/completions", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_request_body_shape() {
        let client = OpenRouterClient::new(config_for("http://unused".to_string())).unwrap();
        let body = client.request_body("Check this");
        assert_eq!(body["model"], "test/model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Check this");
        assert_eq!(body["temperature"], 0.3);
        assert!(body.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_content() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#,
        )
        .await;
        let client = OpenRouterClient::new(config_for(url)).unwrap();

        let text = client.complete("hello").await.unwrap();
        assert_eq!(text, r#"{"ok":true}"#);

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(lower.contains("authorization: bearer test-key"));
        assert!(lower.contains("http-referer: http://localhost"));
        assert!(lower.contains("x-title: english grammar chatbot"));
        assert!(request.contains("\"temperature\":0.3"));
    }

    #[tokio::test]
    async fn test_complete_non_success_status_is_model_call_error() {
        let (url, _server) =
            one_shot_server("HTTP/1.1 503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let client = OpenRouterClient::new(config_for(url)).unwrap();

        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelCall(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_complete_empty_choices_is_model_call_error() {
        let (url, _server) = one_shot_server("HTTP/1.1 200 OK", r#"{"choices":[]}"#).await;
        let client = OpenRouterClient::new(config_for(url)).unwrap();

        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelCall(_)));
    }

    #[tokio::test]
    async fn test_complete_null_content_is_empty_text() {
        let (url, _server) = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )
        .await;
        let client = OpenRouterClient::new(config_for(url)).unwrap();
        assert_eq!(client.complete("hello").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_complete_connection_refused_is_model_call_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OpenRouterClient::new(config_for(format!("http://{}/", addr))).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelCall(_)));
    }
}
