//! JSON-over-HTTP implementation of [`NotebookClient`].

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{
    Notebook, NotebookClient, NotebookSource, RemoteError, ResearchMode, ResearchStatus,
    ResearchTask, RetrievalOutcome, VideoRequest,
};
use crate::models::{GenerationJob, JobStatusReport, SearchRecord};
use crate::utils::HttpClient;

/// Status the gateway uses while an artifact is still being assembled
const TOO_EARLY: u16 = 425;

/// Client for the notebook gateway REST API
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: HttpClient,
    base_url: String,
    api_token: Option<String>,
}

impl GatewayClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            http: HttpClient::with_timeout(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, segments: &[&str]) -> String {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: if message.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                message
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let body = self.send(request).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<RetrievalOutcome, RemoteError> {
        let response = self.authorize(self.http.get(url)).send().await?;
        let status = response.status();

        if status == StatusCode::CONFLICT || status.as_u16() == TOO_EARLY {
            return Ok(RetrievalOutcome::NotReady);
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let detail = response.text().await.unwrap_or_default();
            return Ok(RetrievalOutcome::Unparseable(detail));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Ok(RetrievalOutcome::Failed(format!("{}: {}", status, detail.trim())));
        }

        let bytes = response.bytes().await?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &bytes).await?;
        tracing::debug!(path = %destination.display(), bytes = bytes.len(), "Artifact written");
        Ok(RetrievalOutcome::Ready(PathBuf::from(destination)))
    }
}

#[derive(Serialize)]
struct CreateNotebookBody<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct StartResearchBody<'a> {
    query: &'a str,
    source: &'a str,
    mode: ResearchMode,
}

#[derive(Serialize)]
struct LinkedSource<'a> {
    title: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct LinkSourcesBody<'a> {
    sources: Vec<LinkedSource<'a>>,
}

#[derive(Deserialize)]
struct LinkSourcesResponse {
    #[serde(default)]
    imported: Vec<String>,
}

#[derive(Serialize)]
struct AddSourceBody<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct TaskResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct ArtifactStatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl NotebookClient for GatewayClient {
    async fn create_notebook(&self, title: &str) -> Result<Notebook, RemoteError> {
        let request = self
            .http
            .post(&self.url(&["notebooks"]))
            .json(&CreateNotebookBody { title });
        self.send_json(request).await
    }

    async fn start_research(
        &self,
        container_id: &str,
        query: &str,
        mode: ResearchMode,
    ) -> Result<Option<ResearchTask>, RemoteError> {
        let request = self
            .http
            .post(&self.url(&["notebooks", container_id, "research"]))
            .json(&StartResearchBody {
                query,
                source: "web",
                mode,
            });
        self.send_json(request).await
    }

    async fn poll_research(&self, container_id: &str) -> Result<ResearchStatus, RemoteError> {
        let request = self
            .http
            .get(&self.url(&["notebooks", container_id, "research"]));
        self.send_json(request).await
    }

    async fn list_sources(&self, container_id: &str) -> Result<Vec<NotebookSource>, RemoteError> {
        let request = self
            .http
            .get(&self.url(&["notebooks", container_id, "sources"]));
        self.send_json(request).await
    }

    async fn link_research_sources(
        &self,
        container_id: &str,
        job_id: &str,
        batch: &[SearchRecord],
    ) -> Result<Vec<String>, RemoteError> {
        let body = LinkSourcesBody {
            sources: batch
                .iter()
                .map(|r| LinkedSource {
                    title: r.title(),
                    url: r.import_url().unwrap_or_default(),
                })
                .collect(),
        };
        let request = self
            .http
            .post(&self.url(&["notebooks", container_id, "research", job_id, "import"]))
            .json(&body);
        let response: LinkSourcesResponse = self.send_json(request).await?;
        Ok(response.imported)
    }

    async fn add_source_by_url(&self, container_id: &str, url: &str) -> Result<(), RemoteError> {
        let request = self
            .http
            .post(&self.url(&["notebooks", container_id, "sources"]))
            .json(&AddSourceBody { url });
        self.send(request).await?;
        Ok(())
    }

    async fn generate_video(
        &self,
        container_id: &str,
        request: &VideoRequest,
    ) -> Result<GenerationJob, RemoteError> {
        let http_request = self
            .http
            .post(&self.url(&["notebooks", container_id, "artifacts", "video"]))
            .json(request);
        let response: TaskResponse = self.send_json(http_request).await?;
        Ok(GenerationJob::new(container_id, response.task_id))
    }

    async fn poll_job_status(
        &self,
        container_id: &str,
        job_id: &str,
    ) -> Result<JobStatusReport, RemoteError> {
        let request = self
            .http
            .get(&self.url(&["notebooks", container_id, "artifacts", job_id]));
        let response: ArtifactStatusResponse = self.send_json(request).await?;
        Ok(JobStatusReport::new(response.status, response.error))
    }

    async fn retrieve_artifact(
        &self,
        container_id: &str,
        job_id: &str,
        destination: &Path,
    ) -> RetrievalOutcome {
        let url = self.url(&["notebooks", container_id, "artifacts", job_id, "download"]);
        match self.download(&url, destination).await {
            Ok(outcome) => outcome,
            Err(e) => RetrievalOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, ProviderId, RecordBuilder};
    use crate::notebook::VideoStyle;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard, token: Option<&str>) -> GatewayClient {
        GatewayClient::new(
            server.url(),
            token.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_notebook_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notebooks")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(serde_json::json!({"title": "Protein folding"})))
            .with_body(r#"{"id": "nb-1", "title": "Protein folding"}"#)
            .create_async()
            .await;

        let notebook = client(&server, Some("tok"))
            .create_notebook("Protein folding")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(notebook.id, "nb-1");
    }

    #[tokio::test]
    async fn test_start_research_may_return_null() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/notebooks/nb-1/research")
            .match_body(Matcher::Json(
                serde_json::json!({"query": "q", "source": "web", "mode": "deep"}),
            ))
            .with_body("null")
            .create_async()
            .await;

        let task = client(&server, None)
            .start_research("nb-1", "q", ResearchMode::Deep)
            .await
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_link_research_sources() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notebooks/nb-1/research/task-9/import")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "sources": [{"title": "Paper", "url": "https://example.com/p.pdf"}]
            })))
            .with_body(r#"{"imported": ["src-1"]}"#)
            .create_async()
            .await;

        let record = RecordBuilder::new(ProviderId::Arxiv)
            .title("Paper")
            .url("https://example.com/p")
            .pdf_url("https://example.com/p.pdf")
            .build();
        let imported = client(&server, None)
            .link_research_sources("nb-1", "task-9", &[record])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(imported, vec!["src-1"]);
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/notebooks/nb-1/sources")
            .with_status(400)
            .with_body("bad url")
            .create_async()
            .await;

        let err = client(&server, None)
            .add_source_by_url("nb-1", "not a url")
            .await
            .unwrap_err();
        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad url");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_video_and_poll() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/notebooks/nb-1/artifacts/video")
            .match_body(Matcher::Json(serde_json::json!({
                "instructions": null,
                "style": "retro_print",
                "language": "en"
            })))
            .with_body(r#"{"task_id": "job-7"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/notebooks/nb-1/artifacts/job-7")
            .with_body(r#"{"status": "failed", "error": "quota exceeded"}"#)
            .create_async()
            .await;

        let gateway = client(&server, None);
        let job = gateway
            .generate_video(
                "nb-1",
                &VideoRequest {
                    instructions: None,
                    style: VideoStyle::RetroPrint,
                    language: "en".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(job.job_id, "job-7");
        assert_eq!(job.container_id, "nb-1");

        let report = gateway.poll_job_status("nb-1", "job-7").await.unwrap();
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn test_retrieve_artifact_outcomes() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out").join("video.mp4");

        let gateway = client(&server, None);

        let not_ready = server
            .mock("GET", "/notebooks/nb/artifacts/j/download")
            .with_status(425)
            .create_async()
            .await;
        assert_eq!(
            gateway.retrieve_artifact("nb", "j", &destination).await,
            RetrievalOutcome::NotReady
        );
        not_ready.remove_async().await;

        let unparseable = server
            .mock("GET", "/notebooks/nb/artifacts/j/download")
            .with_status(422)
            .with_body("metadata incomplete")
            .create_async()
            .await;
        assert_eq!(
            gateway.retrieve_artifact("nb", "j", &destination).await,
            RetrievalOutcome::Unparseable("metadata incomplete".into())
        );
        unparseable.remove_async().await;

        let failed = server
            .mock("GET", "/notebooks/nb/artifacts/j/download")
            .with_status(500)
            .create_async()
            .await;
        assert!(matches!(
            gateway.retrieve_artifact("nb", "j", &destination).await,
            RetrievalOutcome::Failed(_)
        ));
        failed.remove_async().await;

        server
            .mock("GET", "/notebooks/nb/artifacts/j/download")
            .with_body(b"mp4-bytes".as_slice())
            .create_async()
            .await;
        assert_eq!(
            gateway.retrieve_artifact("nb", "j", &destination).await,
            RetrievalOutcome::Ready(destination.clone())
        );
        assert_eq!(std::fs::read(&destination).unwrap(), b"mp4-bytes");
    }
}
