//! Search provider adapters behind a common trait.
//!
//! Each adapter wraps one external backend and maps its native response
//! shape onto [`SearchRecord`] at the boundary. Adapters are built through the
//! [`ProviderRegistry`], which maps provider names to constructor functions:
//!
//! - `arxiv` - arXiv Atom API
//! - `pubmed` - NCBI E-utilities (esearch + efetch)
//! - `biorxiv` / `medrxiv` - the shared details API of both preprint servers
//! - `google_scholar` - HTML scraping, only when `GOOGLE_SCHOLAR_ENABLED=true`
//! - `iacr` - IACR Cryptology ePrint Archive search page
//! - `semantic_scholar` - Semantic Scholar Graph API
//! - `crossref` - CrossRef `/works` API
//!
//! Providers never share state and can be searched concurrently.

mod arxiv;
mod biorxiv;
mod crossref;
mod google_scholar;
mod iacr;
pub mod mock;
mod pubmed;
mod registry;
mod semantic;

pub use arxiv::ArxivProvider;
pub use biorxiv::{PreprintProvider, PreprintServer};
pub use crossref::CrossRefProvider;
pub use google_scholar::{GoogleScholarProvider, GOOGLE_SCHOLAR_ENABLED_ENV};
pub use iacr::IacrProvider;
pub use mock::{FailingProvider, MockProvider};
pub use pubmed::PubMedProvider;
pub use registry::{Constructor, ProviderRegistry, ProviderSettings, ProviderSpec};
pub use semantic::SemanticScholarProvider;

use crate::models::{ProviderId, SearchQuery, SearchRecord};
use async_trait::async_trait;

/// A single search backend.
///
/// Implementations must normalize every result through
/// [`RecordBuilder`](crate::models::RecordBuilder) so that missing fields end
/// up empty rather than absent.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Which provider this is; stamped onto every record it returns
    fn id(&self) -> ProviderId;

    /// Human-readable name of this provider
    fn name(&self) -> &str {
        "unknown"
    }

    /// Search for records matching the query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError>;
}

/// Errors that can occur when interacting with a provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be constructed (unknown name, disabled, bad client)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// API error from the provider
    #[error("API error: {0}")]
    Api(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for ProviderError {
    fn from(err: quick_xml::DeError) -> Self {
        ProviderError::Parse(format!("XML: {}", err))
    }
}

/// Turn a non-success HTTP status into the matching provider error
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode) -> ProviderError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimit
    } else {
        ProviderError::Api(format!("{} returned status: {}", provider, status))
    }
}
