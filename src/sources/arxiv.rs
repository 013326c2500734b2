//! arXiv search provider.

use async_trait::async_trait;
use feed_rs::parser;
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";
/// arXiv refuses pages larger than this
const ARXIV_MAX_RESULTS: usize = 200;

/// arXiv provider over the Atom query API
#[derive(Debug, Clone)]
pub struct ArxivProvider {
    client: Arc<HttpClient>,
    base_url: String,
}

impl ArxivProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: ARXIV_API_URL.to_string(),
        })
    }

    /// Point the provider at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `search_query` expression for the arXiv API
    fn build_search_query(query: &SearchQuery) -> String {
        let mut parts = Vec::new();

        if !query.query.trim().is_empty() {
            parts.push(format!("all:{}", query.query.trim()));
        }

        if let Some(year) = query.year {
            parts.push(format!("submittedDate:[{year}01010000 TO {year}12312359]"));
        }

        if parts.is_empty() {
            "all:*".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    /// Map one Atom entry onto a search record
    fn to_record(entry: &feed_rs::model::Entry) -> SearchRecord {
        let paper_id = entry
            .id
            .rsplit("/abs/")
            .next()
            .unwrap_or_default()
            .trim();
        let paper_id = strip_version(paper_id);

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_default();

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();

        let pdf_url = entry
            .links
            .iter()
            .find(|l| l.media_type.as_deref() == Some("application/pdf"))
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}/{}", ARXIV_PDF_URL, paper_id));

        let published = entry
            .published
            .or(entry.updated)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        RecordBuilder::new(ProviderId::Arxiv)
            .title(title)
            .authors(entry.authors.iter().map(|a| a.name.as_str()))
            .abstract_text(abstract_text)
            .url(entry.id.clone())
            .pdf_url(pdf_url)
            .published_date(published)
            .build()
    }
}

/// Drop a trailing `vN` version suffix from an arXiv identifier
fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos) if pos + 1 < id.len() && id[pos + 1..].chars().all(|c| c.is_ascii_digit()) => {
            &id[..pos]
        }
        _ => id,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Provider for ArxivProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Arxiv
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let search_query = Self::build_search_query(query);
        let max_results = query.max_results.min(ARXIV_MAX_RESULTS);

        let url = format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
            self.base_url,
            urlencoding::encode(&search_query),
            max_results,
        );

        let client = Arc::clone(&self.client);

        let feed = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await
                    .map_err(|e| {
                        ProviderError::Network(format!("Failed to fetch arXiv results: {}", e))
                    })?;

                if !response.status().is_success() {
                    return Err(status_error("arXiv", response.status()));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))?;

                parser::parse(bytes.as_ref())
                    .map_err(|e| ProviderError::Parse(format!("Failed to parse Atom feed: {}", e)))
            }
        })
        .await?;

        Ok(feed.entries.iter().map(Self::to_record).collect())
    }
}
