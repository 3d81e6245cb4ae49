//! Text-generation providers and the retry policy `Brain` applies to them.

pub mod gemini;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub use crate::config::RetryConfig;
pub use gemini::GeminiProvider;

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        other => Err(LlmError::ApiRequest {
            message: format!("Unsupported LLM provider '{}'", other),
        }),
    }
}

/// Run `operation`, retrying transient failures until `config.max_retries`
/// retries have been spent. Permanent errors are returned at once.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut backoff = Backoff::new(config);
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !err.is_transient() || backoff.exhausted() {
            return Err(err);
        }

        let delay = backoff.next_delay(&err);
        tracing::warn!(
            attempt = backoff.attempt,
            max = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient provider error, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Exponential delay schedule for one retried call.
struct Backoff<'a> {
    config: &'a RetryConfig,
    /// Retries scheduled so far.
    attempt: u32,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.config.max_retries
    }

    /// Delay before the next retry. A rate-limit hint from the server is a floor.
    fn next_delay(&mut self, err: &LlmError) -> Duration {
        let mut delay = self.base_delay_ms(self.attempt);
        if self.config.jitter {
            delay += (delay as f64 * 0.25 * clock_fraction()) as u64;
        }
        if let LlmError::RateLimited { retry_after_secs } = err {
            delay = delay.max(retry_after_secs.saturating_mul(1000));
        }
        self.attempt += 1;
        Duration::from_millis(delay)
    }

    fn base_delay_ms(&self, attempt: u32) -> u64 {
        let grown = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        grown.min(self.config.max_backoff_ms as f64) as u64
    }
}

/// A value in [0, 1) taken from the wall clock's sub-second part.
fn clock_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}
