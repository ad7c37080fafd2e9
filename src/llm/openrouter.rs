//! OpenRouter (OpenAI-compatible) client with automatic retry for transient errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::{LlmError, RetryConfig};
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenAI-compatible chat client; OpenRouter unless another endpoint is given.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    endpoint: String,
    retry_config: RetryConfig,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self::with_retry_config(api_key, RetryConfig::default())
    }

    pub fn with_retry_config(api_key: String, retry_config: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: OPENROUTER_API_URL.to_string(),
            retry_config,
        }
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "NextUp")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network_error(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body, retry_after));
        }

        parse_chat_body(&body, &request.model)
    }

    /// Execute a request, retrying transient failures within the retry budget.
    async fn execute_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            "LLM request succeeded after {} retries ({:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(response);
                }
                Err(error) if self.retry_config.should_retry(&error, attempt) => {
                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);
                    if delay.is_zero() {
                        tracing::warn!("No retry time left after attempt {}: {}", attempt + 1, error);
                        return Err(error);
                    }
                    tracing::warn!(
                        "LLM attempt {} failed with {}, retrying in {:?}: {}",
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!("LLM request failed after {} retries: {}", attempt, error);
                    return Err(error);
                }
            }
        }
    }
}

/// Decode an OpenAI-style completion body into a `ChatResponse`.
fn parse_chat_body(body: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionBody = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(500).collect();
        LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, preview))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))?;

    Ok(ChatResponse {
        content: choice.message.content,
        finish_reason: choice.finish_reason,
        usage: parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        model: parsed.model.or_else(|| Some(requested_model.to_string())),
    })
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_response.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        tracing::debug!("Sending chat request: model={} endpoint={}", model, self.endpoint);

        self.execute_with_retry(&request).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    #[test]
    fn parses_openai_style_body() {
        let body = r#"{
            "model": "google/gemini-2.0-flash-001",
            "choices": [{"message": {"role": "assistant", "content": "[]"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let response = parse_chat_body(body, "fallback").unwrap();
        assert_eq!(response.content.as_deref(), Some("[]"));
        assert_eq!(response.usage, Some(TokenUsage::new(10, 2)));
        assert_eq!(response.model.as_deref(), Some("google/gemini-2.0-flash-001"));
    }

    #[test]
    fn empty_choices_is_parse_error() {
        let err = parse_chat_body(r#"{"choices": []}"#, "m").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ParseError);
    }

    #[test]
    fn json_response_format_is_serialized_only_when_requested() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
            max_tokens: None,
            response_format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
