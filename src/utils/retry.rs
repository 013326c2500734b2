//! Retry utilities with exponential backoff for provider searches.
//!
//! These bound a single provider call. The artifact tracker never goes
//! through here: its only ceiling is the overall tracking timeout.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::sources::ProviderError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on retries (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_delay;
        }
        let exp_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powf(attempt as f64 - 1.0);
        Duration::from_secs_f64(exp_delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded
    RateLimit,
    /// Service unavailable (503) or other 5xx
    ServiceUnavailable,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a ProviderError represents a transient error
    pub fn from_provider_error(err: &ProviderError) -> Option<Self> {
        match err {
            ProviderError::RateLimit => Some(TransientError::RateLimit),
            ProviderError::Network(msg) => {
                if msg.to_lowercase().contains("timed out") {
                    Some(TransientError::Timeout)
                } else {
                    Some(TransientError::Network)
                }
            }
            ProviderError::Api(msg) => {
                let msg_lower = msg.to_lowercase();
                if msg_lower.contains("timeout") {
                    Some(TransientError::Timeout)
                } else if msg_lower.contains("service unavailable")
                    || msg_lower.contains("temporarily unavailable")
                    || msg_lower.contains("bad gateway")
                {
                    Some(TransientError::ServiceUnavailable)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Get the recommended delay for this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::RateLimit => Duration::from_secs(5),
            TransientError::ServiceUnavailable => Duration::from_secs(3),
            TransientError::Timeout => Duration::from_secs(2),
            TransientError::Network => Duration::from_secs(2),
        }
    }
}

/// Execute an async provider operation with retry logic
///
/// Permanent errors are returned immediately; transient ones are retried with
/// exponential backoff until `max_attempts` or `max_total_time` is reached.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;

    loop {
        attempts += 1;

        let error = match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "Provider call succeeded after retrying");
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => ProviderError::Network("Operation timed out".to_string()),
        };

        let Some(transient) = TransientError::from_provider_error(&error) else {
            return Err(error);
        };

        let delay = std::cmp::max(config.backoff(attempts), transient.recommended_delay());
        total_elapsed += delay;

        if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
            tracing::debug!(
                attempts,
                ?total_elapsed,
                error = %error,
                "Provider call failed after retries"
            );
            return Err(error);
        }

        tracing::debug!(attempts, ?transient, ?delay, "Transient provider error, retrying");
        sleep(delay).await;
    }
}

/// Retry configuration used by the bundled provider adapters
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(20),
        backoff_multiplier: 2.0,
        max_total_time: Duration::from_secs(90),
    }
}
