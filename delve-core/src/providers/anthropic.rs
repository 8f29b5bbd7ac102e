//! Anthropic Messages API provider implementation.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `x-api-key` header (not `Authorization: Bearer`)
//! - Required `anthropic-version` header
//! - System message is a top-level `system` field, not in the messages array

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from configuration.
    ///
    /// Reads the API key from the environment variable specified in `config.api_key_env`.
    /// Returns `LlmError::AuthFailed` if the environment variable is not set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::AuthFailed {
            provider: format!("Anthropic (env var '{}' not set)", config.api_key_env),
        })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Anthropic provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Build the JSON request body for the Anthropic Messages API.
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);

        let (system_text, non_system_messages) = Self::extract_system_message(&request.messages);

        let messages_json: Vec<Value> = non_system_messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "assistant",
                    Role::User | Role::System => "user",
                };
                serde_json::json!({
                    "role": role,
                    "content": [{ "type": "text", "text": msg.content }],
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
            "messages": messages_json,
        });

        if let Some(system) = system_text {
            body["system"] = Value::String(system);
        }

        body
    }

    /// Split system messages out of the list; multiple are joined with blank lines.
    fn extract_system_message(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            if msg.role == Role::System {
                system_parts.push(&msg.content);
            } else {
                non_system.push(msg);
            }
        }

        let system_text = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_text, non_system)
    }

    fn parse_response(body: &Value) -> Result<CompletionResponse, LlmError> {
        let model = body["model"].as_str().unwrap_or("unknown").to_string();
        let finish_reason = body["stop_reason"].as_str().map(|s| s.to_string());

        let usage = TokenUsage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
        };

        let content_blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'content' array in response".to_string(),
            })?;

        // Only text blocks carry completion output here.
        let text = content_blocks
            .iter()
            .filter(|block| block["type"].as_str() == Some("text"))
            .filter_map(|block| block["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            message: Message::assistant(text),
            usage,
            model,
            finish_reason,
        })
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 => LlmError::AuthFailed {
                provider: "Anthropic".to_string(),
            },
            429 => {
                let retry_after = serde_json::from_str::<Value>(body_text)
                    .ok()
                    .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                    .unwrap_or(30);
                LlmError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Anthropic API: {}", status, body_text),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = self.model.as_str(),
            url = url.as_str(),
            "Sending Anthropic completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LlmError::ApiRequest {
                        message: format!("Request to Anthropic API failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        Self::parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> AnthropicProvider {
        AnthropicProvider::new_with_key(&LlmConfig::default(), "sk-ant-test-key-12345".into())
            .expect("Provider creation should succeed")
    }

    #[test]
    fn test_new_missing_env_returns_auth_failed() {
        let config = LlmConfig {
            api_key_env: "DELVE_ANTHROPIC_MISSING_KEY_XYZ".to_string(),
            ..Default::default()
        };
        match AnthropicProvider::new(&config) {
            Err(LlmError::AuthFailed { provider }) => {
                assert!(provider.contains("DELVE_ANTHROPIC_MISSING_KEY_XYZ"));
            }
            Err(other) => panic!("Expected AuthFailed, got {:?}", other),
            Ok(_) => panic!("Expected AuthFailed, got a provider"),
        }
    }

    #[test]
    fn test_new_custom_base_url() {
        let config = LlmConfig {
            base_url: Some("https://my-proxy.example.com/v1".to_string()),
            ..Default::default()
        };
        let provider = AnthropicProvider::new_with_key(&config, "test-key".into()).unwrap();
        assert_eq!(provider.base_url, "https://my-proxy.example.com/v1");
        assert_eq!(make_provider().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_build_request_body_lifts_system_message() {
        let provider = make_provider();
        let request = CompletionRequest {
            messages: vec![
                Message::system("You are a research assistant."),
                Message::user("Find the gaps."),
            ],
            max_tokens: Some(1000),
            ..Default::default()
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["system"], "You are a research assistant.");
        assert_eq!(body["max_tokens"], 1000);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"][0]["text"], "Find the gaps.");
    }

    #[test]
    fn test_build_request_body_defaults_and_override() {
        let provider = make_provider();
        let mut request = CompletionRequest::from_prompt("hi");
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("system").is_none());

        request.model = Some("claude-haiku".to_string());
        let body = provider.build_request_body(&request);
        assert_eq!(body["model"], "claude-haiku");
    }

    #[test]
    fn test_parse_text_response() {
        let body = serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "content": [
                { "type": "text", "text": "{\"queries\": " },
                { "type": "text", "text": "[\"rust async\"]}" }
            ],
            "usage": { "input_tokens": 25, "output_tokens": 10 }
        });
        let response = AnthropicProvider::parse_response(&body).unwrap();
        assert_eq!(response.message.content, "{\"queries\": [\"rust async\"]}");
        assert_eq!(response.usage.total(), 35);
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn test_parse_response_missing_content() {
        let body = serde_json::json!({ "model": "claude" });
        assert!(matches!(
            AnthropicProvider::parse_response(&body),
            Err(LlmError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_http_error_mapping() {
        let err = AnthropicProvider::map_http_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Invalid API key"}}"#,
        );
        assert!(matches!(err, LlmError::AuthFailed { .. }));

        let err = AnthropicProvider::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limited","retry_after_secs":60}}"#,
        );
        match err {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 60),
            other => panic!("Expected RateLimited, got {:?}", other),
        }

        let err = AnthropicProvider::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "not json",
        );
        assert!(matches!(
            err,
            LlmError::RateLimited {
                retry_after_secs: 30
            }
        ));

        let err = AnthropicProvider::map_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        );
        match err {
            LlmError::ApiRequest { message } => {
                assert!(message.contains("500"));
                assert!(message.contains("Internal server error"));
            }
            other => panic!("Expected ApiRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_properties() {
        let provider = make_provider();
        assert_eq!(provider.model_name(), "claude-sonnet-4-20250514");
        assert!(!provider.supports_structured_output());
    }
}
