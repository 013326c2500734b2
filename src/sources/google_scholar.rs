//! Google Scholar search provider.
//!
//! Google Scholar has no public API; this scrapes the results page, which
//! may violate Google's Terms of Service. The provider therefore refuses to
//! construct unless `GOOGLE_SCHOLAR_ENABLED=true`.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const GOOGLE_SCHOLAR_URL: &str = "https://scholar.google.com/scholar";

/// Environment variable that opts in to Google Scholar scraping
pub const GOOGLE_SCHOLAR_ENABLED_ENV: &str = "GOOGLE_SCHOLAR_ENABLED";

/// Scholar serves at most this many hits per page
const SCHOLAR_PAGE_SIZE: usize = 10;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Google Scholar provider
#[derive(Debug, Clone)]
pub struct GoogleScholarProvider {
    client: Arc<HttpClient>,
    base_url: String,
}

impl GoogleScholarProvider {
    /// Create the provider; fails with a configuration error unless enabled
    pub fn new(enabled: bool) -> Result<Self, ProviderError> {
        if !enabled {
            return Err(ProviderError::Configuration(format!(
                "Google Scholar is disabled. Set {}=true to enable.",
                GOOGLE_SCHOLAR_ENABLED_ENV
            )));
        }
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(BROWSER_USER_AGENT)?),
            base_url: GOOGLE_SCHOLAR_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}?hl=en&q={}&num={}",
            self.base_url,
            urlencoding::encode(&query.query),
            query.max_results.min(SCHOLAR_PAGE_SIZE)
        );
        if let Some(year) = query.year {
            url.push_str(&format!("&as_ylo={year}&as_yhi={year}"));
        }
        url
    }

    fn parse_results(html: &str) -> Result<Vec<SearchRecord>, ProviderError> {
        let document = Html::parse_document(html);
        let result_selector = Selector::parse("div.gs_r")
            .map_err(|e| ProviderError::Parse(format!("Invalid selector: {}", e)))?;

        Ok(document
            .select(&result_selector)
            .filter_map(|result| Self::to_record(&result))
            .collect())
    }

    fn to_record(result: &ElementRef) -> Option<SearchRecord> {
        let title_link = select_first(result, "h3.gs_rt a");
        let title = match title_link {
            Some(link) => text_of(&link),
            // Citation-only hits have a title but no link
            None => strip_markers(&text_of(&select_first(result, "h3.gs_rt")?)),
        };
        if title.is_empty() {
            return None;
        }
        let url = title_link
            .and_then(|l| l.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        // "A Author, B Author - Journal, 2021 - publisher.com"
        let byline = select_first(result, "div.gs_a")
            .map(|e| text_of(&e))
            .unwrap_or_default();
        let authors = byline.split(" - ").next().unwrap_or_default();
        let year = year_regex()
            .and_then(|re| re.find(&byline))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let abstract_text = select_first(result, "div.gs_rs")
            .map(|e| text_of(&e))
            .unwrap_or_default();

        let pdf_url = select_first(result, "div.gs_or_ggsm a")
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let citations = select_all_text(result, "div.gs_fl a")
            .into_iter()
            .find_map(|t| t.strip_prefix("Cited by ").and_then(|n| n.trim().parse().ok()))
            .unwrap_or(0);

        Some(
            RecordBuilder::new(ProviderId::GoogleScholar)
                .title(title)
                .authors(authors.split(',').map(|a| a.trim_end_matches('…')))
                .abstract_text(abstract_text)
                .url(url)
                .pdf_url(pdf_url)
                .published_date(year)
                .citations(citations)
                .build(),
        )
    }
}

fn year_regex() -> Option<&'static Regex> {
    static YEAR: OnceLock<Option<Regex>> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").ok()).as_ref()
}

/// Drop Scholar's bracketed type markers such as `[CITATION]`
fn strip_markers(title: &str) -> String {
    let mut rest = title.trim();
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => rest = stripped[end + 1..].trim_start(),
            None => break,
        }
    }
    rest.to_string()
}

fn select_first<'a>(element: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

fn select_all_text(element: &ElementRef, css: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).map(|e| text_of(&e)).collect(),
        Err(_) => Vec::new(),
    }
}

fn text_of(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Provider for GoogleScholarProvider {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleScholar
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let url = self.search_url(query);
        let client = Arc::clone(&self.client);

        let html = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to search Google Scholar: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("Google Scholar", response.status()));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await?;

        let mut records = Self::parse_results(&html)?;
        records.truncate(query.max_results);
        Ok(records)
    }
}
