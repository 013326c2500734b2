//! Semantic Scholar search provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested from the paper search endpoint
const SEARCH_FIELDS: &str =
    "title,authors,abstract,year,publicationDate,externalIds,url,openAccessPdf,citationCount";

/// The Graph API caps `limit` at this value
const SEMANTIC_MAX_RESULTS: usize = 100;

/// Semantic Scholar provider over the Graph API
#[derive(Debug, Clone)]
pub struct SemanticScholarProvider {
    client: Arc<HttpClient>,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarProvider {
    /// Create a provider; the API key is optional and only raises rate limits
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            api_key,
            base_url: SEMANTIC_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn to_record(data: S2Paper) -> SearchRecord {
        let doi = data
            .external_ids
            .and_then(|ids| ids.doi)
            .unwrap_or_default();

        let url = data.url.unwrap_or_else(|| {
            if doi.is_empty() {
                String::new()
            } else {
                format!("https://doi.org/{}", doi)
            }
        });

        let published = data
            .publication_date
            .or_else(|| data.year.map(|y| y.to_string()))
            .unwrap_or_default();

        RecordBuilder::new(ProviderId::SemanticScholar)
            .title(data.title.unwrap_or_default())
            .authors(data.authors.iter().filter_map(|a| a.name.as_deref()))
            .abstract_text(data.r#abstract.unwrap_or_default())
            .doi(doi)
            .url(url)
            .pdf_url(data.open_access_pdf.and_then(|p| p.url).unwrap_or_default())
            .published_date(published)
            .citations(data.citation_count.unwrap_or(0))
            .build()
    }
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn id(&self) -> ProviderId {
        ProviderId::SemanticScholar
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let mut url = format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&query.query),
            query.max_results.min(SEMANTIC_MAX_RESULTS),
            SEARCH_FIELDS,
        );
        if let Some(year) = query.year {
            url.push_str(&format!("&year={}", year));
        }

        let client = Arc::clone(&self.client);
        let api_key = self.api_key.clone();

        let data: S2SearchResponse = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let api_key = api_key.clone();
            async move {
                let mut request = client.get(&url);
                if let Some(key) = api_key {
                    request = request.header("x-api-key", key);
                }

                let response = request.send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to search Semantic Scholar: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("Semantic Scholar", response.status()));
                }

                response
                    .json::<S2SearchResponse>()
                    .await
                    .map_err(|e| ProviderError::Parse(format!("Failed to parse JSON: {}", e)))
            }
        })
        .await?;

        Ok(data.data.into_iter().map(Self::to_record).collect())
    }
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    r#abstract: Option<String>,
    year: Option<i32>,
    publication_date: Option<String>,
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    citation_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const RESPONSE: &str = r#"{
        "total": 2,
        "data": [
            {
                "paperId": "abc",
                "title": "Attention Is All You Need",
                "authors": [{"name": "Ashish Vaswani"}, {"name": null}, {"name": "Noam Shazeer"}],
                "abstract": "Transformers.",
                "year": 2017,
                "publicationDate": "2017-06-12",
                "externalIds": {"DOI": "10.48550/arXiv.1706.03762"},
                "url": "https://www.semanticscholar.org/paper/abc",
                "openAccessPdf": {"url": "https://arxiv.org/pdf/1706.03762"},
                "citationCount": 100000
            },
            {
                "paperId": "def",
                "title": "Sparse Paper",
                "authors": [],
                "abstract": null,
                "year": 2020,
                "externalIds": {"DOI": "10.1/sparse"},
                "url": null,
                "openAccessPdf": null,
                "citationCount": null
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_search_maps_papers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "transformers".into()),
                Matcher::UrlEncoded("year".into(), "2017".into()),
            ]))
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RESPONSE)
            .create_async()
            .await;

        let provider = SemanticScholarProvider::new(Some("secret".to_string()))
            .unwrap()
            .with_base_url(server.url());
        let records = provider
            .search(&SearchQuery::new("transformers").year(Some(2017)))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].authors(), "Ashish Vaswani, Noam Shazeer");
        assert_eq!(records[0].pdf_url(), "https://arxiv.org/pdf/1706.03762");
        assert_eq!(records[0].published_date(), "2017-06-12");
        assert_eq!(records[0].citation_count(), 100000);

        assert_eq!(records[1].url(), "https://doi.org/10.1/sparse");
        assert_eq!(records[1].abstract_text(), "");
        assert_eq!(records[1].published_date(), "2020");
        assert_eq!(records[1].citation_count(), 0);
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let provider = SemanticScholarProvider::new(None)
            .unwrap()
            .with_base_url(server.url());
        let err = provider.search(&SearchQuery::new("x")).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
