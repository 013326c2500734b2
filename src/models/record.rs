//! Search record model shared by every provider adapter.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator used when flattening multi-valued author fields
pub const AUTHOR_SEPARATOR: &str = ", ";

/// The provider (or notebook-side origin) a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "arxiv")]
    Arxiv,
    #[serde(rename = "pubmed")]
    PubMed,
    #[serde(rename = "biorxiv")]
    BioRxiv,
    #[serde(rename = "medrxiv")]
    MedRxiv,
    #[serde(rename = "google_scholar")]
    GoogleScholar,
    #[serde(rename = "iacr")]
    Iacr,
    #[serde(rename = "semantic_scholar")]
    SemanticScholar,
    #[serde(rename = "crossref")]
    CrossRef,
    /// Sources discovered by the notebook's own deep-research task
    #[serde(rename = "research")]
    Research,
    /// Sources uploaded into the notebook by the operator
    #[serde(rename = "upload")]
    Upload,
    #[serde(untagged)]
    Other(String),
}

impl ProviderId {
    /// Every search provider that ships with the crate, in registry order
    pub const SEARCHABLE: [ProviderId; 8] = [
        ProviderId::Arxiv,
        ProviderId::PubMed,
        ProviderId::BioRxiv,
        ProviderId::MedRxiv,
        ProviderId::GoogleScholar,
        ProviderId::Iacr,
        ProviderId::SemanticScholar,
        ProviderId::CrossRef,
    ];

    /// Returns the display name of the provider
    pub fn name(&self) -> &str {
        match self {
            ProviderId::Arxiv => "arXiv",
            ProviderId::PubMed => "PubMed",
            ProviderId::BioRxiv => "bioRxiv",
            ProviderId::MedRxiv => "medRxiv",
            ProviderId::GoogleScholar => "Google Scholar",
            ProviderId::Iacr => "IACR ePrint",
            ProviderId::SemanticScholar => "Semantic Scholar",
            ProviderId::CrossRef => "CrossRef",
            ProviderId::Research => "Deep Research",
            ProviderId::Upload => "Upload",
            ProviderId::Other(s) => s,
        }
    }

    /// Returns the provider identifier used on the command line and in config
    pub fn id(&self) -> &str {
        match self {
            ProviderId::Arxiv => "arxiv",
            ProviderId::PubMed => "pubmed",
            ProviderId::BioRxiv => "biorxiv",
            ProviderId::MedRxiv => "medrxiv",
            ProviderId::GoogleScholar => "google_scholar",
            ProviderId::Iacr => "iacr",
            ProviderId::SemanticScholar => "semantic_scholar",
            ProviderId::CrossRef => "crossref",
            ProviderId::Research => "research",
            ProviderId::Upload => "upload",
            ProviderId::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for ProviderId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl ProviderId {
    /// Resolve a command-line or config name, accepting common aliases.
    ///
    /// Unknown names become [`ProviderId::Other`].
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => ProviderId::Arxiv,
            "pubmed" => ProviderId::PubMed,
            "biorxiv" => ProviderId::BioRxiv,
            "medrxiv" => ProviderId::MedRxiv,
            "google_scholar" | "scholar" => ProviderId::GoogleScholar,
            "iacr" => ProviderId::Iacr,
            "semantic_scholar" | "semantic" => ProviderId::SemanticScholar,
            "crossref" => ProviderId::CrossRef,
            "research" => ProviderId::Research,
            "upload" => ProviderId::Upload,
            other => ProviderId::Other(other.to_string()),
        }
    }
}

/// A normalized search result from any provider
///
/// Every field except the origin defaults to empty / zero. Records are
/// immutable once built: construct them with [`RecordBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    #[serde(default)]
    title: String,

    /// Authors, flattened into one string
    #[serde(default)]
    authors: String,

    #[serde(default)]
    r#abstract: String,

    #[serde(default)]
    doi: String,

    #[serde(default)]
    url: String,

    #[serde(default)]
    pdf_url: String,

    #[serde(default)]
    published_date: String,

    #[serde(default, alias = "citations")]
    citation_count: u32,

    #[serde(alias = "source")]
    origin_provider: ProviderId,
}

impl SearchRecord {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn authors(&self) -> &str {
        &self.authors
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .split(AUTHOR_SEPARATOR.trim())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn abstract_text(&self) -> &str {
        &self.r#abstract
    }

    pub fn doi(&self) -> &str {
        &self.doi
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn pdf_url(&self) -> &str {
        &self.pdf_url
    }

    pub fn published_date(&self) -> &str {
        &self.published_date
    }

    /// Four-digit year prefix of the publication date, if it has one
    pub fn year(&self) -> Option<&str> {
        let year = self.published_date.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }

    pub fn citation_count(&self) -> u32 {
        self.citation_count
    }

    pub fn origin_provider(&self) -> &ProviderId {
        &self.origin_provider
    }

    /// The URL to hand to the notebook when importing this record one by one:
    /// the PDF link when present, the landing page otherwise.
    pub fn import_url(&self) -> Option<&str> {
        [self.pdf_url.as_str(), self.url.as_str()]
            .into_iter()
            .find(|u| !u.trim().is_empty())
    }
}

/// Builder for constructing SearchRecord objects
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: SearchRecord,
}

impl RecordBuilder {
    /// Create a new builder; the origin provider is the only required field
    pub fn new(origin: ProviderId) -> Self {
        Self {
            record: SearchRecord {
                title: String::new(),
                authors: String::new(),
                r#abstract: String::new(),
                doi: String::new(),
                url: String::new(),
                pdf_url: String::new(),
                published_date: String::new(),
                citation_count: 0,
                origin_provider: origin,
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = title.into().trim().to_string();
        self
    }

    /// Set authors from a list, joining them into a single string
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.record.authors = authors
            .into_iter()
            .map(|a| a.as_ref().trim().to_string())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(AUTHOR_SEPARATOR);
        self
    }

    /// Set authors from an already-joined string
    pub fn authors_joined(mut self, authors: impl Into<String>) -> Self {
        self.record.authors = authors.into();
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.record.r#abstract = abstract_text.into();
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.record.doi = doi.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.record.url = url.into();
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.record.pdf_url = url.into();
        self
    }

    pub fn published_date(mut self, date: impl Into<String>) -> Self {
        self.record.published_date = date.into();
        self
    }

    pub fn citations(mut self, count: u32) -> Self {
        self.record.citation_count = count;
        self
    }

    pub fn build(self) -> SearchRecord {
        self.record
    }
}
