//! Brain module: text-generation provider abstraction.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions and the
//! `Brain` wrapper the workflow talks to. `Brain` adds the per-call timeout,
//! transient-error retry, and running token accounting on top of a provider.

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::providers::with_retry;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Trait for text-generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Estimate the token count for a set of messages (~4 chars per token).
    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

/// The workflow's handle on a text-generation provider.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    timeout: Duration,
    temperature: f32,
    max_tokens: Option<usize>,
    total_usage: Mutex<TokenUsage>,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            timeout,
            temperature: 0.7,
            max_tokens: None,
            total_usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Build a brain using the generation settings from the LLM config section.
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &LlmConfig, timeout: Duration) -> Self {
        Self {
            retry: config.retry.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            ..Self::new(provider, timeout)
        }
    }

    /// Override the retry policy.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Send a single prompt and return the generated text.
    ///
    /// Each attempt is bounded by the configured timeout; timeouts and other
    /// transient failures are retried with exponential backoff.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            max_tokens: self.max_tokens,
            ..CompletionRequest::from_prompt(prompt, self.temperature)
        };
        debug!(
            model = self.provider.model_name(),
            estimated_tokens = self.provider.estimate_tokens(&request.messages),
            "Sending completion request"
        );

        let timeout = self.timeout;
        let response = with_retry(&self.retry, || {
            let request = request.clone();
            let provider = Arc::clone(&self.provider);
            async move {
                match tokio::time::timeout(timeout, provider.complete(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            }
        })
        .await?;

        if let Ok(mut usage) = self.total_usage.lock() {
            usage.accumulate(&response.usage);
        }
        Ok(response.message.content)
    }

    /// Get total token usage across all calls.
    pub fn total_usage(&self) -> TokenUsage {
        self.total_usage
            .lock()
            .map(|usage| *usage)
            .unwrap_or_default()
    }
}

/// A mock LLM provider for testing and development.
///
/// Responses (or errors) are returned in the order they were queued. Every
/// prompt received is recorded so tests can assert on which stages ran.
pub struct MockLlmProvider {
    model: String,
    responses: std::sync::Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: std::sync::Mutex::new(Vec::new()),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push(Ok(response));
    }

    /// Queue a plain text reply.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push(Err(error));
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            ))
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_provider_default_response() {
        let provider = MockLlmProvider::new();
        let response = provider
            .complete(CompletionRequest::from_prompt("hello", 0.7))
            .await
            .unwrap();
        assert!(response.text().contains("mock LLM"));
    }

    #[tokio::test]
    async fn test_mock_provider_queued_responses() {
        let provider = MockLlmProvider::new();
        provider.queue_text("first");
        provider.queue_text("second");

        let r1 = provider
            .complete(CompletionRequest::from_prompt("a", 0.7))
            .await
            .unwrap();
        assert_eq!(r1.text(), "first");

        let r2 = provider
            .complete(CompletionRequest::from_prompt("b", 0.7))
            .await
            .unwrap();
        assert_eq!(r2.text(), "second");
        assert_eq!(provider.prompts(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_brain_generate_accumulates_usage() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_text("one");
        provider.queue_text("two");
        let brain = Brain::new(provider.clone(), Duration::from_secs(5));

        assert_eq!(brain.generate("p1").await.unwrap(), "one");
        assert_eq!(brain.generate("p2").await.unwrap(), "two");
        assert_eq!(brain.total_usage().total(), 300);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_brain_surfaces_permanent_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(LlmError::AuthFailed {
            provider: "Gemini".into(),
        });
        let brain = Brain::new(provider, Duration::from_secs(5)).with_retry_config(no_retry());

        let err = brain.generate("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_brain_retries_transient_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(LlmError::Connection {
            message: "reset".into(),
        });
        provider.queue_text("recovered");
        let retry = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 1.0,
            jitter: false,
        };
        let brain = Brain::new(provider.clone(), Duration::from_secs(5)).with_retry_config(retry);

        assert_eq!(brain.generate("retry me").await.unwrap(), "recovered");
        assert_eq!(provider.call_count(), 2);
    }

    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(MockLlmProvider::text_response("too late"))
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_brain_times_out() {
        let brain =
            Brain::new(Arc::new(SlowProvider), Duration::from_secs(2)).with_retry_config(no_retry());
        let err = brain.generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { timeout_secs: 2 }));
    }
}
