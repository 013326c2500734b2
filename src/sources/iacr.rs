//! IACR Cryptology ePrint Archive search provider.
//!
//! The archive has no search API, so results are scraped from the HTML
//! search page.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const IACR_BASE_URL: &str = "https://eprint.iacr.org";

/// IACR ePrint provider
#[derive(Debug, Clone)]
pub struct IacrProvider {
    client: Arc<HttpClient>,
    base_url: String,
}

impl IacrProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: IACR_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse the search results page into records.
    ///
    /// Each hit is a block holding an `a.paperlink` (the `YYYY/NNNN` id), a
    /// `<strong>` title, an italic author line and an optional abstract.
    fn parse_results(&self, html: &str) -> Result<Vec<SearchRecord>, ProviderError> {
        let document = Html::parse_document(html);
        let entry_selector = selector("div.mb-4")?;
        let link_selector = selector("a.paperlink")?;

        let records = document
            .select(&entry_selector)
            .filter_map(|entry| {
                let link = entry.select(&link_selector).next()?;
                self.to_record(&entry, &link)
            })
            .collect();

        Ok(records)
    }

    fn to_record(&self, entry: &ElementRef, link: &ElementRef) -> Option<SearchRecord> {
        let paper_id = text_of(link);
        let href = link.value().attr("href").unwrap_or_default();
        let path = if href.is_empty() {
            format!("/{}", paper_id)
        } else {
            href.to_string()
        };

        let title = first_text(entry, "strong")?;
        let authors = first_text(entry, ".fst-italic").unwrap_or_default();
        let abstract_text = first_text(entry, "p.search-abstract").unwrap_or_default();
        let year = paper_id.split('/').next().unwrap_or_default().to_string();

        Some(
            RecordBuilder::new(ProviderId::Iacr)
                .title(title)
                .authors(authors.split(','))
                .abstract_text(abstract_text)
                .url(format!("{}{}", self.base_url, path))
                .pdf_url(format!("{}{}.pdf", self.base_url, path))
                .published_date(year)
                .build(),
        )
    }
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("Invalid selector '{}': {}", css, e)))
}

fn text_of(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(element: &ElementRef, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let text = text_of(&element.select(&selector).next()?);
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Provider for IacrProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Iacr
    }

    fn name(&self) -> &str {
        "IACR ePrint"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let url = format!(
            "{}/search?q={}",
            self.base_url,
            urlencoding::encode(&query.query)
        );
        let client = Arc::clone(&self.client);

        let html = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to search IACR: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("IACR", response.status()));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await?;

        let records = self
            .parse_results(&html)?
            .into_iter()
            .filter(|r| query.matches_year(r.published_date()))
            .take(query.max_results)
            .collect();

        Ok(records)
    }
}
