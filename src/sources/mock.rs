//! Mock providers for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{Provider, ProviderError};

/// A mock provider that returns predefined records.
#[derive(Debug)]
pub struct MockProvider {
    id: ProviderId,
    records: Mutex<Vec<SearchRecord>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with no records.
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::from_name(id),
            records: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock provider that returns `count` generated records.
    pub fn with_records(id: &str, count: usize) -> Self {
        let provider = Self::new(id);
        let records = (0..count)
            .map(|i| make_record(&provider.id, &format!("{} paper {}", id, i + 1)))
            .collect();
        provider.set_records(records);
        provider
    }

    /// Make every search sleep before answering
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the records to return.
    pub fn set_records(&self, records: Vec<SearchRecord>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    /// Number of times `search` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn name(&self) -> &str {
        "Mock Provider"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().take(query.max_results).cloned().collect())
    }
}

/// A provider whose every search fails with an API error.
#[derive(Debug)]
pub struct FailingProvider {
    id: ProviderId,
    message: String,
}

impl FailingProvider {
    pub fn new(id: &str, message: impl Into<String>) -> Self {
        Self {
            id: ProviderId::from_name(id),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn name(&self) -> &str {
        "Failing Provider"
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        Err(ProviderError::Api(self.message.clone()))
    }
}

/// Helper function to create a record for testing.
pub fn make_record(origin: &ProviderId, title: &str) -> SearchRecord {
    let slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    RecordBuilder::new(origin.clone())
        .title(title)
        .authors(["Test Author"])
        .url(format!("http://example.com/{}", slug))
        .build()
}
