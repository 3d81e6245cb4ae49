//! Google Gemini `generateContent` provider.
//!
//! The key travels in the `x-goog-api-key` header, system messages become the
//! top-level `system_instruction`, and assistant turns use the `model` role.

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration.
    ///
    /// Reads the API key from the environment variable specified in `config.api_key_env`.
    /// Returns `LlmError::AuthFailed` if the environment variable is not set.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| LlmError::AuthFailed {
                provider: format!("Gemini (env var '{}' not set)", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Gemini provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Build the JSON request body for the Gemini API.
    ///
    /// System messages become the top-level `system_instruction`; everything
    /// else is converted to Gemini `contents`.
    fn build_request_body(request: &CompletionRequest) -> Value {
        let max_tokens = request.max_tokens.unwrap_or(4096);
        let (system_text, turns) = Self::extract_system_instruction(&request.messages);
        let contents = Self::merge_turns(&turns);

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": request.temperature,
            },
        });

        if let Some(system) = &system_text {
            body["system_instruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        body
    }

    /// Split system messages from the conversation.
    fn extract_system_instruction(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let (system, rest): (Vec<&Message>, Vec<&Message>) =
            messages.iter().partition(|m| m.role == Role::System);

        let system_text = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };
        (system_text, rest)
    }

    /// Convert messages to Gemini turns, merging consecutive turns of the same role.
    ///
    /// Gemini rejects two adjacent `user` (or `model`) turns.
    fn merge_turns(messages: &[&Message]) -> Vec<Value> {
        let mut contents: Vec<Value> = Vec::new();
        let mut last_role: Option<&str> = None;

        for msg in messages {
            let role = match msg.role {
                Role::Assistant => "model",
                _ => "user",
            };
            let part = serde_json::json!({"text": msg.content});
            if last_role == Some(role) {
                if let Some(parts) = contents
                    .last_mut()
                    .and_then(|c| c["parts"].as_array_mut())
                {
                    parts.push(part);
                    continue;
                }
            }
            contents.push(serde_json::json!({"role": role, "parts": [part]}));
            last_role = Some(role);
        }

        contents
    }

    /// Parse a `generateContent` response body.
    fn parse_response(body_text: &str) -> Result<CompletionResponse, LlmError> {
        let body: GenerateContentResponse =
            serde_json::from_str(body_text).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Gemini returned no candidates".to_string(),
            })?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        let usage = body.usage_metadata.unwrap_or_default();
        Ok(CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
            model: body.model_version.unwrap_or_else(|| "gemini".to_string()),
            finish_reason: candidate.finish_reason,
        })
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => LlmError::RateLimited {
                retry_after_secs: 30,
            },
            500..=599 => LlmError::Connection {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    /// Map a transport-level reqwest failure.
    ///
    /// The URL is stripped so request details never end up in error text.
    fn map_send_error(err: reqwest::Error) -> LlmError {
        let err = err.without_url();
        if err.is_timeout() {
            LlmError::Timeout { timeout_secs: 120 }
        } else if err.is_connect() {
            LlmError::Connection {
                message: err.to_string(),
            }
        } else {
            LlmError::ApiRequest {
                message: format!("Request to Gemini API failed: {}", err),
            }
        }
    }

    fn endpoint_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = Self::build_request_body(&request);
        let url = self.endpoint_url(model, "generateContent");

        debug!(model, "Sending Gemini completion request");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        Self::parse_response(&body_text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
