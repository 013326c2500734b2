//! PubMed search provider using the NCBI E-utilities API.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{ProviderId, RecordBuilder, SearchQuery, SearchRecord};
use crate::sources::{status_error, Provider, ProviderError};
use crate::utils::{api_retry_config, with_retry, HttpClient};

/// E-utilities base URL; `esearch.fcgi` and `efetch.fcgi` hang off it
const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const PUBMED_ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// PubMed provider: esearch for ids, then efetch for the records
#[derive(Debug, Clone)]
pub struct PubMedProvider {
    client: Arc<HttpClient>,
    base_url: String,
}

impl PubMedProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: EUTILS_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_search_url(&self, query: &SearchQuery) -> String {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.query.clone()),
            ("retmax", query.max_results.to_string()),
            ("retmode", "xml".to_string()),
        ];

        if let Some(year) = query.year {
            params.push(("datetype", "pdat".to_string()));
            params.push(("mindate", format!("{}/01/01", year)));
            params.push(("maxdate", format!("{}/12/31", year)));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}/esearch.fcgi?{}", self.base_url, query_string)
    }

    fn build_fetch_url(&self, ids: &[String]) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.base_url,
            ids.join(",")
        )
    }

    fn parse_search_response(xml: &str) -> Result<Vec<String>, ProviderError> {
        let result: ESearchResult = from_str(xml)?;
        Ok(result
            .id_list
            .map(|list| list.ids)
            .unwrap_or_default())
    }

    fn parse_fetch_response(xml: &str) -> Result<Vec<SearchRecord>, ProviderError> {
        let result: PubmedArticleSet = from_str(xml)?;
        Ok(result.articles.into_iter().map(Self::to_record).collect())
    }

    fn to_record(article: PubmedArticle) -> SearchRecord {
        let citation = article.medline_citation;
        let pmid = citation.pmid.map(|p| p.value).unwrap_or_default();
        let details = citation.article.unwrap_or_default();

        let authors = details
            .author_list
            .map(|list| list.authors)
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.display_name());

        let abstract_text = details
            .r#abstract
            .map(|ab| {
                ab.texts
                    .into_iter()
                    .map(|t| t.value)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let doi = article
            .pubmed_data
            .and_then(|d| d.article_id_list)
            .map(|list| list.ids)
            .unwrap_or_default()
            .into_iter()
            .find(|id| id.id_type == "doi")
            .map(|id| id.value)
            .unwrap_or_default();

        let published = details
            .journal
            .and_then(|j| j.journal_issue)
            .and_then(|i| i.pub_date)
            .map(|d| d.render())
            .unwrap_or_default();

        let url = if pmid.is_empty() {
            String::new()
        } else {
            format!("{}/{}/", PUBMED_ARTICLE_URL, pmid)
        };

        RecordBuilder::new(ProviderId::PubMed)
            .title(details.article_title.unwrap_or_default())
            .authors(authors)
            .abstract_text(abstract_text)
            .doi(doi)
            .url(url)
            .published_date(published)
            .build()
    }

    async fn fetch_text(&self, url: String) -> Result<String, ProviderError> {
        let client = Arc::clone(&self.client);
        with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await.map_err(|e| {
                    ProviderError::Network(format!("Failed to query PubMed: {}", e))
                })?;

                if !response.status().is_success() {
                    return Err(status_error("PubMed", response.status()));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ProviderError::Network(format!("Failed to read response: {}", e)))
            }
        })
        .await
    }
}

#[async_trait]
impl Provider for PubMedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::PubMed
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchRecord>, ProviderError> {
        let search_xml = self.fetch_text(self.build_search_url(query)).await?;
        let ids = Self::parse_search_response(&search_xml)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetch_xml = self.fetch_text(self.build_fetch_url(&ids)).await?;
        Self::parse_fetch_response(&fetch_xml)
    }
}

// ===== E-utilities XML Types =====

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(rename = "IdList")]
    id_list: Option<IdList>,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PubmedArticle {
    medline_citation: MedlineCitation,
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: Option<Text>,
    article: Option<Article>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Article {
    journal: Option<Journal>,
    article_title: Option<String>,
    r#abstract: Option<Abstract>,
    author_list: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Journal {
    journal_issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JournalIssue {
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PubDate {
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
    medline_date: Option<String>,
}

impl PubDate {
    fn render(self) -> String {
        let Some(year) = self.year else {
            return self.medline_date.unwrap_or_default();
        };
        match (self.month.as_deref().and_then(month_number), self.day) {
            (Some(month), Some(day)) => format!("{}-{:02}-{:0>2}", year, month, day),
            (Some(month), None) => format!("{}-{:02}", year, month),
            _ => year,
        }
    }
}

/// PubMed months are either numeric or three-letter English abbreviations
fn month_number(month: &str) -> Option<u32> {
    if let Ok(n) = month.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = month.get(..3)?.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    texts: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Author {
    last_name: Option<String>,
    fore_name: Option<String>,
    collective_name: Option<String>,
}

impl Author {
    fn display_name(self) -> String {
        if let Some(collective) = self.collective_name {
            return collective;
        }
        [self.fore_name, self.last_name]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PubmedData {
    article_id_list: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text")]
    value: String,
}

/// An element whose attributes we ignore and whose text we keep
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const ESEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<eSearchResult>
  <Count>2</Count><RetMax>2</RetMax><RetStart>0</RetStart>
  <IdList><Id>111</Id><Id>222</Id></IdList>
</eSearchResult>"#;

    const ESEARCH_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<eSearchResult><Count>0</Count><IdList></IdList></eSearchResult>"#;

    const EFETCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">111</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2024</Year><Month>Mar</Month><Day>5</Day></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>CRISPR screens in neurons.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">First part.</AbstractText>
          <AbstractText Label="RESULTS">Second part.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Doudna</LastName><ForeName>Jennifer A</ForeName><Initials>JA</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>Neuro Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">111</ArticleId>
        <ArticleId IdType="doi">10.1000/crispr</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>222</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><MedlineDate>2023 Winter</MedlineDate></PubDate></JournalIssue></Journal>
        <ArticleTitle>Sparse record.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_search_response() {
        let ids = PubMedProvider::parse_search_response(ESEARCH).unwrap();
        assert_eq!(ids, vec!["111", "222"]);
    }

    #[test]
    fn test_parse_fetch_response() {
        let records = PubMedProvider::parse_fetch_response(EFETCH).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title(), "CRISPR screens in neurons.");
        assert_eq!(first.authors(), "Jennifer A Doudna, Neuro Consortium");
        assert_eq!(first.abstract_text(), "First part. Second part.");
        assert_eq!(first.doi(), "10.1000/crispr");
        assert_eq!(first.url(), "https://pubmed.ncbi.nlm.nih.gov/111/");
        assert_eq!(first.published_date(), "2024-03-05");

        let second = &records[1];
        assert_eq!(second.authors(), "");
        assert_eq!(second.doi(), "");
        assert_eq!(second.published_date(), "2023 Winter");
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("Mar"), Some(3));
        assert_eq!(month_number("11"), Some(11));
        assert_eq!(month_number("13"), None);
        assert_eq!(month_number("x"), None);
    }

    #[tokio::test]
    async fn test_search_runs_esearch_then_efetch() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("term".into(), "crispr".into()),
                Matcher::UrlEncoded("mindate".into(), "2024/01/01".into()),
            ]))
            .with_body(ESEARCH)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "111,222".into()))
            .with_body(EFETCH)
            .create_async()
            .await;

        let provider = PubMedProvider::new().unwrap().with_base_url(server.url());
        let records = provider
            .search(&SearchQuery::new("crispr").year(Some(2024)))
            .await
            .unwrap();

        search.assert_async().await;
        fetch.assert_async().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.origin_provider() == &ProviderId::PubMed));
    }

    #[tokio::test]
    async fn test_no_ids_skips_efetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::Any)
            .with_body(ESEARCH_EMPTY)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let provider = PubMedProvider::new().unwrap().with_base_url(server.url());
        let records = provider.search(&SearchQuery::new("nothing")).await.unwrap();

        assert!(records.is_empty());
        fetch.assert_async().await;
    }
}
