//! Utility modules shared by the provider adapters and the gateway client.
//!
//! - [`HttpClient`]: shared reqwest client with user agent and timeouts
//! - [`RetryConfig`]: configuration for retry logic with exponential backoff
//! - [`with_retry`]: run a provider call, retrying transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paper_talker::sources::ProviderError;
//! use paper_talker::utils::{api_retry_config, with_retry};
//!
//! # async fn fetch() -> Result<String, ProviderError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), ProviderError> {
//! let body = with_retry(api_retry_config(), || fetch()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;

pub use http::{HttpClient, DEFAULT_REQUEST_TIMEOUT};
pub use retry::{api_retry_config, with_retry, RetryConfig, TransientError};
