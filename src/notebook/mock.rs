//! Scripted in-memory notebook service for tests.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    Notebook, NotebookClient, NotebookSource, RemoteError, ResearchMode, ResearchStatus,
    ResearchTask, RetrievalOutcome, VideoRequest,
};
use crate::models::{GenerationJob, JobStatusReport, SearchRecord};

pub const MOCK_NOTEBOOK_ID: &str = "mock-notebook";
pub const MOCK_JOB_ID: &str = "mock-job";

/// One scripted answer to a status poll
#[derive(Debug, Clone)]
enum StatusStep {
    Report(JobStatusReport),
    Transport(String),
}

#[derive(Debug, Default)]
struct MockState {
    statuses: VecDeque<StatusStep>,
    retrievals: VecDeque<RetrievalOutcome>,
    research_task: Option<String>,
    research_polls: VecDeque<ResearchStatus>,
    sources: Vec<NotebookSource>,
    failing_link_batches: HashSet<usize>,
    failing_urls: HashSet<String>,
    generation_error: Option<String>,

    created: Vec<String>,
    link_batches: Vec<usize>,
    added_urls: Vec<String>,
    video_requests: Vec<VideoRequest>,
    status_polls: usize,
    retrievals_made: usize,
    research_polls_made: usize,
}

/// Pop the next scripted value, repeating the last one once the script runs dry
fn next_or_last<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// A [`NotebookClient`] that answers from scripts and records every call.
///
/// Status polls default to `"in_progress"` and retrievals to
/// [`RetrievalOutcome::NotReady`].
#[derive(Debug, Default)]
pub struct MockNotebookClient {
    state: Mutex<MockState>,
}

impl MockNotebookClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw status strings returned by successive polls
    pub fn with_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().statuses.extend(
            statuses
                .into_iter()
                .map(|s| StatusStep::Report(JobStatusReport::new(s, None))),
        );
        self
    }

    /// Append a failed status carrying `detail`
    pub fn with_failed_status(self, detail: impl Into<String>) -> Self {
        self.state().statuses.push_back(StatusStep::Report(JobStatusReport::new(
            "failed",
            Some(detail.into()),
        )));
        self
    }

    /// Append a poll that fails at the transport level
    pub fn with_status_error(self, message: impl Into<String>) -> Self {
        self.state()
            .statuses
            .push_back(StatusStep::Transport(message.into()));
        self
    }

    /// Outcomes of successive retrievals; a scripted `Ready` resolves to the
    /// requested destination
    pub fn with_retrievals<I>(self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = RetrievalOutcome>,
    {
        self.state().retrievals.extend(outcomes);
        self
    }

    /// Research task id and the snapshots successive research polls return
    pub fn with_research<I>(self, task_id: Option<&str>, polls: I) -> Self
    where
        I: IntoIterator<Item = ResearchStatus>,
    {
        {
            let mut state = self.state();
            state.research_task = task_id.map(String::from);
            state.research_polls.extend(polls);
        }
        self
    }

    pub fn with_sources(self, sources: Vec<NotebookSource>) -> Self {
        self.state().sources = sources;
        self
    }

    /// Make the link call with this 0-based index fail
    pub fn fail_link_batch(self, index: usize) -> Self {
        self.state().failing_link_batches.insert(index);
        self
    }

    /// Make `add_source_by_url` fail for this URL
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.state().failing_urls.insert(url.into());
        self
    }

    pub fn fail_generation(self, message: impl Into<String>) -> Self {
        self.state().generation_error = Some(message.into());
        self
    }

    /// Titles of notebooks created so far
    pub fn created_notebooks(&self) -> Vec<String> {
        self.state().created.clone()
    }

    /// Sizes of every link batch submitted, failed ones included
    pub fn link_batches(&self) -> Vec<usize> {
        self.state().link_batches.clone()
    }

    /// URLs passed to `add_source_by_url`, failed ones included
    pub fn added_urls(&self) -> Vec<String> {
        self.state().added_urls.clone()
    }

    pub fn video_requests(&self) -> Vec<VideoRequest> {
        self.state().video_requests.clone()
    }

    pub fn status_polls(&self) -> usize {
        self.state().status_polls
    }

    pub fn retrievals(&self) -> usize {
        self.state().retrievals_made
    }

    pub fn research_polls(&self) -> usize {
        self.state().research_polls_made
    }
}

#[async_trait]
impl NotebookClient for MockNotebookClient {
    async fn create_notebook(&self, title: &str) -> Result<Notebook, RemoteError> {
        self.state().created.push(title.to_string());
        Ok(Notebook {
            id: MOCK_NOTEBOOK_ID.to_string(),
            title: title.to_string(),
        })
    }

    async fn start_research(
        &self,
        _container_id: &str,
        _query: &str,
        _mode: ResearchMode,
    ) -> Result<Option<ResearchTask>, RemoteError> {
        Ok(self
            .state()
            .research_task
            .clone()
            .map(|task_id| ResearchTask { task_id }))
    }

    async fn poll_research(&self, _container_id: &str) -> Result<ResearchStatus, RemoteError> {
        let mut state = self.state();
        state.research_polls_made += 1;
        Ok(next_or_last(&mut state.research_polls).unwrap_or_default())
    }

    async fn list_sources(&self, _container_id: &str) -> Result<Vec<NotebookSource>, RemoteError> {
        Ok(self.state().sources.clone())
    }

    async fn link_research_sources(
        &self,
        _container_id: &str,
        job_id: &str,
        batch: &[SearchRecord],
    ) -> Result<Vec<String>, RemoteError> {
        let mut state = self.state();
        let index = state.link_batches.len();
        state.link_batches.push(batch.len());

        if state.failing_link_batches.contains(&index) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("batch {} rejected", index),
            });
        }
        Ok((0..batch.len())
            .map(|i| format!("{}-src-{}-{}", job_id, index, i))
            .collect())
    }

    async fn add_source_by_url(&self, _container_id: &str, url: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.added_urls.push(url.to_string());
        if state.failing_urls.contains(url) {
            return Err(RemoteError::Api {
                status: 400,
                message: format!("cannot add {}", url),
            });
        }
        Ok(())
    }

    async fn generate_video(
        &self,
        container_id: &str,
        request: &VideoRequest,
    ) -> Result<GenerationJob, RemoteError> {
        let mut state = self.state();
        state.video_requests.push(request.clone());
        if let Some(message) = &state.generation_error {
            return Err(RemoteError::Api {
                status: 500,
                message: message.clone(),
            });
        }
        Ok(GenerationJob::new(container_id, MOCK_JOB_ID))
    }

    async fn poll_job_status(
        &self,
        _container_id: &str,
        _job_id: &str,
    ) -> Result<JobStatusReport, RemoteError> {
        let mut state = self.state();
        state.status_polls += 1;
        match next_or_last(&mut state.statuses) {
            Some(StatusStep::Report(report)) => Ok(report),
            Some(StatusStep::Transport(message)) => Err(RemoteError::Transport(message)),
            None => Ok(JobStatusReport::new("in_progress", None)),
        }
    }

    async fn retrieve_artifact(
        &self,
        _container_id: &str,
        _job_id: &str,
        destination: &Path,
    ) -> RetrievalOutcome {
        let mut state = self.state();
        state.retrievals_made += 1;
        match next_or_last(&mut state.retrievals) {
            Some(RetrievalOutcome::Ready(_)) => RetrievalOutcome::Ready(destination.to_path_buf()),
            Some(other) => other,
            None => RetrievalOutcome::NotReady,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_last_status_repeats() {
        let client = MockNotebookClient::new().with_statuses(["queued", "completed"]);
        let first = client.poll_job_status("nb", "job").await.unwrap();
        let second = client.poll_job_status("nb", "job").await.unwrap();
        let third = client.poll_job_status("nb", "job").await.unwrap();

        assert_eq!(first.status, JobStatus::Pending);
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(third.status, JobStatus::Completed);
        assert_eq!(client.status_polls(), 3);
    }

    #[tokio::test]
    async fn test_ready_resolves_to_destination() {
        let client = MockNotebookClient::new().with_retrievals([
            RetrievalOutcome::NotReady,
            RetrievalOutcome::Ready(PathBuf::new()),
        ]);
        let dest = Path::new("/tmp/out.mp4");
        assert_eq!(
            client.retrieve_artifact("nb", "job", dest).await,
            RetrievalOutcome::NotReady
        );
        assert_eq!(
            client.retrieve_artifact("nb", "job", dest).await,
            RetrievalOutcome::Ready(dest.to_path_buf())
        );
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let client = MockNotebookClient::new()
            .fail_link_batch(1)
            .fail_url("https://bad.example");
        let batch = vec![crate::sources::mock::make_record(
            &crate::models::ProviderId::Arxiv,
            "x",
        )];

        assert!(client.link_research_sources("nb", "t", &batch).await.is_ok());
        assert!(client.link_research_sources("nb", "t", &batch).await.is_err());
        assert!(client.add_source_by_url("nb", "https://bad.example").await.is_err());
        assert!(client.add_source_by_url("nb", "https://ok.example").await.is_ok());
        assert_eq!(client.link_batches(), vec![1, 1]);
        assert_eq!(client.added_urls().len(), 2);
    }
}
