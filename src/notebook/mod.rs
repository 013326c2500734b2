//! Contract with the remote notebook service.
//!
//! The workflow only talks to the service through [`NotebookClient`]. The
//! crate ships [`GatewayClient`], a JSON-over-HTTP implementation, and
//! [`MockNotebookClient`] for tests.

mod gateway;
pub mod mock;

pub use gateway::GatewayClient;
pub use mock::MockNotebookClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{GenerationJob, JobStatusReport, ProviderId, RecordBuilder, SearchRecord};

/// Web address of a notebook, shown to the operator
pub const NOTEBOOK_WEB_URL: &str = "https://notebooklm.google.com/notebook";

/// A created notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Depth of the service's own web research
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    Fast,
    #[default]
    Deep,
}

impl ResearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchMode::Fast => "fast",
            ResearchMode::Deep => "deep",
        }
    }
}

impl std::fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle of a started deep-research task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchTask {
    pub task_id: String,
}

/// A source discovered by deep research
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl ResearchSource {
    pub fn to_record(&self) -> SearchRecord {
        RecordBuilder::new(ProviderId::Research)
            .title(&self.title)
            .url(&self.url)
            .build()
    }
}

/// Snapshot of the notebook's research task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchStatus {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub sources: Vec<ResearchSource>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A source already present in a notebook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookSource {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: String,
}

impl NotebookSource {
    pub fn to_record(&self) -> SearchRecord {
        RecordBuilder::new(ProviderId::Upload)
            .title(&self.title)
            .build()
    }
}

/// Visual style of the generated video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VideoStyle {
    Classic,
    #[default]
    Whiteboard,
    Kawaii,
    Anime,
    Watercolor,
    #[value(name = "retro_print")]
    RetroPrint,
    Heritage,
    #[value(name = "paper_craft")]
    PaperCraft,
    /// Let the service pick
    Auto,
}

impl VideoStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Classic => "classic",
            VideoStyle::Whiteboard => "whiteboard",
            VideoStyle::Kawaii => "kawaii",
            VideoStyle::Anime => "anime",
            VideoStyle::Watercolor => "watercolor",
            VideoStyle::RetroPrint => "retro_print",
            VideoStyle::Heritage => "heritage",
            VideoStyle::PaperCraft => "paper_craft",
            VideoStyle::Auto => "auto",
        }
    }
}

impl std::fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a video generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRequest {
    /// Free-form instructions; `None` lets the service decide
    pub instructions: Option<String>,
    pub style: VideoStyle,
    pub language: String,
}

/// Result of one attempt to download a generated artifact.
///
/// The non-`Ready` variants are expected while a job is finishing and are
/// signals for the tracker rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// The artifact was written to this path
    Ready(PathBuf),
    /// The artifact does not exist yet
    NotReady,
    /// The artifact exists but its metadata could not be interpreted yet
    Unparseable(String),
    /// Any other failure
    Failed(String),
}

/// Errors from the notebook service
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request never got a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error status
    #[error("Service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Parse(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Operations the workflow needs from the notebook service.
///
/// Implementations are shared as `Arc<dyn NotebookClient>` and must be
/// usable from several tasks without external locking.
#[async_trait]
pub trait NotebookClient: Send + Sync {
    async fn create_notebook(&self, title: &str) -> Result<Notebook, RemoteError>;

    /// Start deep research; `None` when the service declined to start it
    async fn start_research(
        &self,
        container_id: &str,
        query: &str,
        mode: ResearchMode,
    ) -> Result<Option<ResearchTask>, RemoteError>;

    async fn poll_research(&self, container_id: &str) -> Result<ResearchStatus, RemoteError>;

    async fn list_sources(&self, container_id: &str) -> Result<Vec<NotebookSource>, RemoteError>;

    /// Link a batch of discovered records to a research task; returns the ids
    /// of the sources actually imported
    async fn link_research_sources(
        &self,
        container_id: &str,
        job_id: &str,
        batch: &[SearchRecord],
    ) -> Result<Vec<String>, RemoteError>;

    async fn add_source_by_url(&self, container_id: &str, url: &str) -> Result<(), RemoteError>;

    async fn generate_video(
        &self,
        container_id: &str,
        request: &VideoRequest,
    ) -> Result<GenerationJob, RemoteError>;

    async fn poll_job_status(
        &self,
        container_id: &str,
        job_id: &str,
    ) -> Result<JobStatusReport, RemoteError>;

    /// Try to download the artifact of a job to `destination`
    async fn retrieve_artifact(
        &self,
        container_id: &str,
        job_id: &str,
        destination: &Path,
    ) -> RetrievalOutcome;

    /// Where an operator can open the notebook in a browser
    fn notebook_url(&self, container_id: &str) -> String {
        format!("{}/{}", NOTEBOOK_WEB_URL, container_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_style_names_match_serde() {
        for style in [VideoStyle::RetroPrint, VideoStyle::PaperCraft, VideoStyle::Auto] {
            let json = serde_json::to_string(&style).unwrap();
            assert_eq!(json, format!("\"{}\"", style.as_str()));
        }
    }

    #[test]
    fn test_research_status_defaults() {
        let status: ResearchStatus = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(status.status, "in_progress");
        assert!(status.sources.is_empty());
        assert_eq!(status.task_id, None);
    }

    #[test]
    fn test_sources_become_records() {
        let source = ResearchSource {
            title: "A web page".into(),
            url: "https://example.com/page".into(),
        };
        let record = source.to_record();
        assert_eq!(record.origin_provider(), &ProviderId::Research);
        assert_eq!(record.import_url(), Some("https://example.com/page"));

        let uploaded = NotebookSource {
            id: "s1".into(),
            title: "notes.pdf".into(),
        };
        assert_eq!(uploaded.to_record().origin_provider(), &ProviderId::Upload);
    }
}
