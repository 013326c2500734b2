//! bioRxiv/medRxiv search provider.
//!
//! Both servers expose the same details API with a different server prefix,
//! so one adapter serves both. The API has no keyword search: we page through
//! a date interval and filter client-side.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const BIORXIV_API_URL: &str = "https://api.biorxiv.org";
/// Window searched when no year filter is given
const DEFAULT_LOOKBACK_DAYS: i64 = 30;
/// The details API returns at most this many records per page
const PAGE_SIZE: usize = 100;
/// Upper bound on pages scanned per search
const MAX_PAGES: usize = 5;

/// Which preprint server a [`PreprintProvider`] talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprintServer {
    BioRxiv,
    MedRxiv,
}

impl PreprintServer {
    fn slug(&self) -> &'static str {
        match self {
            PreprintServer::BioRxiv => "biorxiv",
            PreprintServer::MedRxiv => "medrxiv",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            PreprintServer::BioRxiv => "bioRxiv",
            PreprintServer::MedRxiv => "medRxiv",
        }
    }

    fn provider_id(&self) -> ProviderId {
        match self {
            PreprintServer::BioRxiv => ProviderId::BioRxiv,
            PreprintServer::MedRxiv => ProviderId::MedRxiv,
        }
    }

    fn landing_url(&self, doi: &str, version: &str) -> String {
        format!("https://www.{}.org/content/{}v{}", self.slug(), doi, version)
    }

    fn pdf_url(&self, doi: &str, version: &str) -> String {
        format!("{}.full.pdf", self.landing_url(doi, version))
    }
}

/// Shared provider for bioRxiv and medRxiv
#[derive(Debug, Clone)]
pub struct PreprintProvider {
    client: Arc<HttpClient>,
    server: PreprintServer,
    base_url: String,
}

impl PreprintProvider {
    pub fn new(server: PreprintServer) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            server,
            base_url: BIORXIV_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `YYYY-MM-DD/YYYY-MM-DD` interval for the details endpoint
    fn interval(query: &SearchQuery) -> String {
        match query.year {
            Some(year) => format!("{year}-01-01/{year}-12-31"),
            None => {
                let end = Utc::now().date_naive();
                let start = end - ChronoDuration::days(DEFAULT_LOOKBACK_DAYS);
                format!("{}/{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }

    async fn fetch_page(&self, interval: &str, cursor: usize) -> Result<ApiResponse, ProviderError> {
        let url = format!(
            "{}/details/{}/{}/{}",
            self.base_url,
            self.server.slug(),
            interval,
            cursor
        );
        let client = Arc::clone(&self.client);
        let display_name = self.server.display_name();

        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to fetch from {}: {}", display_name, e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error(display_name, response.status()));
                }

                response
                    .json::<ApiResponse>()
                    .await
                    .map_err(|e| ProviderError::Parse(format!("Failed to parse JSON: {}", e)))
            }
        })
        .await
    }

    fn to_record(&self, paper: ApiPaper) -> SearchRecord {
        let doi = paper.doi.unwrap_or_default();
        let version = paper.version.unwrap_or_else(|| "1".to_string());
        let (url, pdf_url) = if doi.is_empty() {
            (String::new(), String::new())
        } else {
            (
                self.server.landing_url(&doi, &version),
                self.server.pdf_url(&doi, &version),
            )
        };

        let authors = paper.authors.unwrap_or_default();

        RecordBuilder::new(self.server.provider_id())
            .title(paper.title.unwrap_or_default())
            .authors(authors.split(';'))
            .abstract_text(paper.r#abstract.unwrap_or_default())
            .doi(doi)
            .url(url)
            .pdf_url(pdf_url)
            .published_date(paper.date.unwrap_or_default())
            .build()
    }
}

/// Every whitespace-separated query term must appear in the title or abstract
fn matches_terms(paper: &ApiPaper, terms: &[String]) -> bool {
    let haystack = format!(
        "{} {}",
        paper.title.as_deref().unwrap_or_default(),
        paper.r#abstract.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    terms.iter().all(|t| haystack.contains(t.as_str()))
}

#[async_trait]
impl Provider for PreprintProvider {
    fn id(&self) -> ProviderId {
        self.server.provider_id()
    }

    fn name(&self) -> &str {
        self.server.display_name()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let interval = Self::interval(query);
        let terms: Vec<String> = query
            .query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        let mut records = Vec::new();
        let mut cursor = 0;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(&interval, cursor).await?;
            let fetched = page.collection.len();

            records.extend(
                page.collection
                    .into_iter()
                    .filter(|p| matches_terms(p, &terms))
                    .filter(|p| query.matches_year(p.date.as_deref().unwrap_or_default()))
                    .map(|p| self.to_record(p)),
            );

            if records.len() >= query.max_results || fetched < PAGE_SIZE {
                break;
            }
            cursor += fetched;
        }

        records.truncate(query.max_results);
        tracing::debug!(
            provider = self.server.slug(),
            interval = %interval,
            count = records.len(),
            "Filtered preprint results"
        );
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    collection: Vec<ApiPaper>,
}

#[derive(Debug, Deserialize)]
struct ApiPaper {
    doi: Option<String>,
    title: Option<String>,
    authors: Option<String>,
    date: Option<String>,
    version: Option<String>,
    r#abstract: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(papers: &[(&str, &str, &str)]) -> String {
        let collection: Vec<serde_json::Value> = papers
            .iter()
            .enumerate()
            .map(|(i, (title, abstract_text, date))| {
                serde_json::json!({
                    "doi": format!("10.1101/2024.01.{:02}.5000{}", i + 1, i),
                    "title": title,
                    "authors": "Smith, J.; Doe, A.",
                    "date": date,
                    "version": "2",
                    "category": "neuroscience",
                    "abstract": abstract_text,
                    "server": "bioRxiv"
                })
            })
            .collect();
        serde_json::json!({
            "messages": [{"status": "ok", "count": papers.len()}],
            "collection": collection
        })
        .to_string()
    }

    #[test]
    fn test_interval_for_year() {
        let query = SearchQuery::new("x").year(Some(2023));
        assert_eq!(PreprintProvider::interval(&query), "2023-01-01/2023-12-31");
    }

    #[tokio::test]
    async fn test_search_filters_by_terms() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/details/medrxiv/2024-01-01/2024-12-31/0")
            .with_status(200)
            .with_body(page(&[
                ("Gut microbiome and sleep", "We study the microbiome.", "2024-01-03"),
                ("Unrelated cardiology", "Hearts.", "2024-01-04"),
                ("Sleep quality", "A microbiome cohort.", "2024-01-05"),
            ]))
            .create_async()
            .await;

        let provider = PreprintProvider::new(PreprintServer::MedRxiv)
            .unwrap()
            .with_base_url(server.url());
        let records = provider
            .search(&SearchQuery::new("Microbiome sleep").year(Some(2024)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title(), "Gut microbiome and sleep");
        assert_eq!(records[0].authors(), "Smith, J., Doe, A.");
        assert_eq!(records[0].origin_provider(), &ProviderId::MedRxiv);
        assert!(records[0]
            .pdf_url()
            .starts_with("https://www.medrxiv.org/content/10.1101/"));
        assert!(records[0].pdf_url().ends_with("v2.full.pdf"));
    }

    #[tokio::test]
    async fn test_search_truncates_to_max_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/details/biorxiv/2024-01-01/2024-12-31/0")
            .with_body(page(&[
                ("Protein one", "", "2024-02-01"),
                ("Protein two", "", "2024-02-02"),
                ("Protein three", "", "2024-02-03"),
            ]))
            .create_async()
            .await;

        let provider = PreprintProvider::new(PreprintServer::BioRxiv)
            .unwrap()
            .with_base_url(server.url());
        let records = provider
            .search(&SearchQuery::new("protein").year(Some(2024)).max_results(2))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
    }
}
