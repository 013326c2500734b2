//! CrossRef search provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef provider over the REST `/works` endpoint
#[derive(Debug, Clone)]
pub struct CrossRefProvider {
    client: Arc<HttpClient>,
    base_url: String,
}

impl CrossRefProvider {
    pub fn new() -> Result<Self, ProviderError> {
        // CrossRef routes identified clients to its "polite" pool
        let user_agent = format!(
            "{}/{} (mailto:crossref@crossref.org)",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
            base_url: CROSSREF_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}/works?query={}&rows={}",
            self.base_url,
            urlencoding::encode(&query.query),
            query.max_results
        );
        if let Some(year) = query.year {
            url.push_str(&format!(
                "&filter=from-pub-date:{year},until-pub-date:{year}"
            ));
        }
        url
    }

    fn to_record(item: CRItem) -> SearchRecord {
        let authors = item.author.iter().map(|a| a.display_name()).filter(|n| !n.is_empty());

        let doi = item.doi.unwrap_or_default();
        let url = item.url.unwrap_or_else(|| {
            if doi.is_empty() {
                String::new()
            } else {
                format!("https://doi.org/{}", doi)
            }
        });

        let pdf_url = item
            .link
            .iter()
            .find(|l| l.content_type.as_deref() == Some("application/pdf"))
            .map(|l| l.url.clone())
            .unwrap_or_default();

        let published = item
            .published
            .or(item.published_print)
            .or(item.published_online)
            .map(|d| d.to_iso())
            .unwrap_or_default();

        RecordBuilder::new(ProviderId::CrossRef)
            .title(item.title.into_iter().next().unwrap_or_default())
            .authors(authors)
            .abstract_text(strip_jats(&item.r#abstract.unwrap_or_default()))
            .doi(doi)
            .url(url)
            .pdf_url(pdf_url)
            .published_date(published)
            .citations(item.is_referenced_by_count.unwrap_or(0))
            .build()
    }
}

/// Remove the JATS XML tags CrossRef wraps abstracts in
fn strip_jats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Provider for CrossRefProvider {
    fn id(&self) -> ProviderId {
        ProviderId::CrossRef
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let url = self.search_url(query);
        let client = Arc::clone(&self.client);

        let data: CRResponse = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to search CrossRef: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("CrossRef", response.status()));
                }

                response
                    .json::<CRResponse>()
                    .await
                    .map_err(|e| ProviderError::Parse(format!("Failed to parse JSON: {}", e)))
            }
        })
        .await?;

        Ok(data.message.items.into_iter().map(Self::to_record).collect())
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    r#abstract: Option<String>,
    published: Option<CRDate>,
    published_print: Option<CRDate>,
    published_online: Option<CRDate>,
    #[serde(default)]
    link: Vec<CRLink>,
    is_referenced_by_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

impl CRAuthor {
    fn display_name(&self) -> String {
        match (&self.given, &self.family, &self.name) {
            (Some(given), Some(family), _) => format!("{} {}", given, family),
            (None, Some(family), _) => family.clone(),
            (_, _, Some(name)) => name.clone(),
            (Some(given), None, None) => given.clone(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRLink {
    #[serde(rename = "URL")]
    url: String,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CRDate {
    #[serde(default)]
    date_parts: Vec<Vec<Option<u32>>>,
}

impl CRDate {
    /// Render `[[2024, 3, 1]]` as `2024-03-01`, keeping only the parts present
    fn to_iso(&self) -> String {
        let parts: Vec<u32> = self
            .date_parts
            .first()
            .map(|p| p.iter().map_while(|v| *v).collect())
            .unwrap_or_default();
        match parts.as_slice() {
            [y, m, d, ..] => format!("{:04}-{:02}-{:02}", y, m, d),
            [y, m] => format!("{:04}-{:02}", y, m),
            [y] => format!("{:04}", y),
            [] => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const RESPONSE: &str = r#"{
        "status": "ok",
        "message": {
            "total-results": 1,
            "items": [{
                "title": ["Deep Learning"],
                "DOI": "10.1038/nature14539",
                "URL": "https://doi.org/10.1038/nature14539",
                "author": [
                    {"given": "Yann", "family": "LeCun"},
                    {"family": "Bengio"},
                    {"name": "The Consortium"}
                ],
                "abstract": "<jats:p>Deep learning allows\n models.</jats:p>",
                "published": {"date-parts": [[2015, 5, 28]]},
                "link": [
                    {"URL": "https://example.org/x.xml", "content-type": "text/xml"},
                    {"URL": "https://example.org/x.pdf", "content-type": "application/pdf"}
                ],
                "is-referenced-by-count": 50000
            }]
        }
    }"#;

    #[tokio::test]
    async fn test_search_maps_items() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "deep learning".into()),
                Matcher::UrlEncoded("rows".into(), "3".into()),
                Matcher::UrlEncoded(
                    "filter".into(),
                    "from-pub-date:2015,until-pub-date:2015".into(),
                ),
            ]))
            .with_status(200)
            .with_body(RESPONSE)
            .create_async()
            .await;

        let provider = CrossRefProvider::new().unwrap().with_base_url(server.url());
        let records = provider
            .search(&SearchQuery::new("deep learning").max_results(3).year(Some(2015)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title(), "Deep Learning");
        assert_eq!(record.authors(), "Yann LeCun, Bengio, The Consortium");
        assert_eq!(record.abstract_text(), "Deep learning allows models.");
        assert_eq!(record.doi(), "10.1038/nature14539");
        assert_eq!(record.pdf_url(), "https://example.org/x.pdf");
        assert_eq!(record.published_date(), "2015-05-28");
        assert_eq!(record.citation_count(), 50000);
    }

    #[test]
    fn test_partial_dates() {
        let date = CRDate {
            date_parts: vec![vec![Some(2020), Some(7)]],
        };
        assert_eq!(date.to_iso(), "2020-07");
        let empty = CRDate { date_parts: vec![] };
        assert_eq!(empty.to_iso(), "");
    }
}
