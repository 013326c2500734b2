//! Concurrent fan-out search across providers.

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{SearchQuery, SearchRecord};
use crate::sources::{Provider, ProviderRegistry};

/// How one requested provider fared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    /// The name as requested
    pub provider: String,
    /// Records contributed (zero on failure)
    pub count: usize,
    /// Construction or search error, if any
    pub error: Option<String>,
}

impl ProviderReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Merged records plus one report per requested provider
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    pub records: Vec<SearchRecord>,
    pub reports: Vec<ProviderReport>,
}

impl Aggregation {
    pub fn failed_providers(&self) -> usize {
        self.reports.iter().filter(|r| !r.succeeded()).count()
    }
}

/// Search every named provider concurrently and concatenate the results.
///
/// `limit` applies to each provider separately. Providers that cannot be
/// built or whose search fails contribute nothing; this never errors.
pub async fn aggregate(
    registry: &ProviderRegistry,
    query: &str,
    providers: &[String],
    limit: usize,
    year: Option<i32>,
) -> Vec<SearchRecord> {
    aggregate_with_report(registry, query, providers, limit, year)
        .await
        .records
}

/// Like [`aggregate`], also reporting per-provider counts and errors
pub async fn aggregate_with_report(
    registry: &ProviderRegistry,
    query: &str,
    providers: &[String],
    limit: usize,
    year: Option<i32>,
) -> Aggregation {
    let search_query = SearchQuery::new(query).max_results(limit).year(year);

    let mut reports = Vec::with_capacity(providers.len());
    let mut active: Vec<(usize, Arc<dyn Provider>)> = Vec::new();

    for name in providers {
        let index = reports.len();
        match registry.create(name) {
            Ok(provider) => active.push((index, provider)),
            Err(e) => {
                tracing::warn!(provider = %name, "Skipping provider: {}", e);
                reports.push(ProviderReport {
                    provider: name.clone(),
                    count: 0,
                    error: Some(e.to_string()),
                });
                continue;
            }
        }
        reports.push(ProviderReport {
            provider: name.clone(),
            count: 0,
            error: None,
        });
    }

    let searches = active.iter().map(|(_, provider)| {
        let search_query = &search_query;
        async move { provider.search(search_query).await }
    });
    let results = join_all(searches).await;

    let mut records = Vec::new();
    for ((index, provider), result) in active.iter().zip(results) {
        let report = &mut reports[*index];
        match result {
            Ok(found) => {
                tracing::info!(provider = %provider.id(), count = found.len(), "Provider search finished");
                report.count = found.len();
                records.extend(found);
            }
            Err(e) => {
                tracing::warn!(provider = %provider.id(), "Search failed: {}", e);
                report.error = Some(e.to_string());
            }
        }
    }

    Aggregation { records, reports }
}
