//! Completion tracking for video generation jobs.
//!
//! The service's status endpoint is not trustworthy on its own: a job can
//! report `completed` before its artifact is downloadable, and an artifact
//! can become downloadable while the status still says `in_progress`. The
//! tracker therefore polls the status and also probes the download itself,
//! switching to a faster cadence once the artifact looks close.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{JobStatus, PollErrorKind, PollState, ResumeHandle};
use crate::notebook::{NotebookClient, RetrievalOutcome};

/// Polling cadence of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Sleep between iterations in normal mode
    pub poll_interval: Duration,
    /// Sleep between iterations once rapid mode is on
    pub rapid_interval: Duration,
    /// Probe the download every this many iterations
    pub probe_every: u32,
    /// First iteration eligible for a probe
    pub probe_start: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            rapid_interval: Duration::from_secs(2),
            probe_every: 3,
            probe_start: 2,
        }
    }
}

/// How a tracking session ended without a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The artifact was saved here
    Completed(PathBuf),
    /// Time ran out; the job may still finish and can be resumed
    TimedOut(ResumeHandle),
}

/// Fatal tracking outcomes
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Job {job_id} failed (status '{status}'): {detail}")]
    JobFailed {
        job_id: String,
        status: String,
        detail: String,
    },

    #[error("Job reported complete but the artifact could not be retrieved ({handle}): {detail}")]
    FinalRetrieval { handle: ResumeHandle, detail: String },
}

/// Drives one [`PollState`] from `pending` to a terminal status
pub struct CompletionTracker {
    client: Arc<dyn NotebookClient>,
    config: TrackerConfig,
}

impl CompletionTracker {
    pub fn new(client: Arc<dyn NotebookClient>, config: TrackerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Track a job until its artifact is saved to `destination`, it fails, or
    /// `timeout` elapses
    pub async fn track(
        &self,
        container_id: &str,
        job_id: &str,
        destination: &Path,
        timeout: Duration,
    ) -> Result<TrackOutcome, TrackError> {
        self.track_with_observer(container_id, job_id, destination, timeout, &mut |_: &PollState| {})
            .await
    }

    /// Re-attach to a job submitted by an earlier run
    pub async fn resume(
        &self,
        handle: &ResumeHandle,
        destination: &Path,
        timeout: Duration,
    ) -> Result<TrackOutcome, TrackError> {
        self.resume_with_observer(handle, destination, timeout, &mut |_: &PollState| {})
            .await
    }

    /// [`resume`](Self::resume) with an observer, as in
    /// [`track_with_observer`](Self::track_with_observer)
    pub async fn resume_with_observer(
        &self,
        handle: &ResumeHandle,
        destination: &Path,
        timeout: Duration,
        observer: &mut (dyn FnMut(&PollState) + Send),
    ) -> Result<TrackOutcome, TrackError> {
        tracing::info!(handle = %handle, "Resuming completion tracking");
        self.track_with_observer(
            handle.container_id(),
            handle.job_id(),
            destination,
            timeout,
            observer,
        )
        .await
    }

    /// Like [`track`](Self::track), calling `observer` after every iteration
    /// and once more with the terminal state
    pub async fn track_with_observer(
        &self,
        container_id: &str,
        job_id: &str,
        destination: &Path,
        timeout: Duration,
        observer: &mut (dyn FnMut(&PollState) + Send),
    ) -> Result<TrackOutcome, TrackError> {
        let started = Instant::now();
        let mut state = PollState::new();

        tracing::info!(
            container_id,
            job_id,
            timeout_secs = timeout.as_secs(),
            "Waiting for artifact"
        );

        while started.elapsed() < timeout {
            let interval = if state.rapid_mode() {
                self.config.rapid_interval
            } else {
                self.config.poll_interval
            };
            tokio::time::sleep(interval).await;
            let attempt = state.begin_attempt();

            let report = match self.client.poll_job_status(container_id, job_id).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(attempt, "Status check failed: {}", e);
                    state.record_error(PollErrorKind::Transport);
                    observer(&state);
                    continue;
                }
            };
            state.observe_status(&report);
            tracing::debug!(attempt, status = %report.raw, rapid_mode = state.rapid_mode(), "Polled job");

            match report.status {
                JobStatus::Failed => {
                    state.fail();
                    observer(&state);
                    return Err(TrackError::JobFailed {
                        job_id: job_id.to_string(),
                        status: report.raw,
                        detail: report
                            .error
                            .unwrap_or_else(|| "no detail given".to_string()),
                    });
                }
                JobStatus::Completed => {
                    let outcome = self
                        .client
                        .retrieve_artifact(container_id, job_id, destination)
                        .await;
                    if let Some(path) = self.after_reported_completion(&mut state, outcome, attempt) {
                        observer(&state);
                        return Ok(TrackOutcome::Completed(path));
                    }
                }
                JobStatus::Pending => {
                    if self.should_probe(&state, attempt) {
                        let outcome = self
                            .client
                            .retrieve_artifact(container_id, job_id, destination)
                            .await;
                        if let Some(path) = self.after_probe(&mut state, outcome, attempt) {
                            observer(&state);
                            return Ok(TrackOutcome::Completed(path));
                        }
                    }
                }
            }

            observer(&state);
        }

        if state.reported_complete() {
            tracing::info!("Time is up but the job reported completion, retrieving once more");
            let outcome = self
                .client
                .retrieve_artifact(container_id, job_id, destination)
                .await;
            return match outcome {
                RetrievalOutcome::Ready(path) => {
                    state.complete(path.clone());
                    observer(&state);
                    Ok(TrackOutcome::Completed(path))
                }
                RetrievalOutcome::NotReady => {
                    state.fail();
                    observer(&state);
                    Err(TrackError::FinalRetrieval {
                        handle: ResumeHandle::new(container_id, job_id),
                        detail: "artifact not ready".to_string(),
                    })
                }
                RetrievalOutcome::Unparseable(detail) | RetrievalOutcome::Failed(detail) => {
                    state.fail();
                    observer(&state);
                    Err(TrackError::FinalRetrieval {
                        handle: ResumeHandle::new(container_id, job_id),
                        detail,
                    })
                }
            };
        }

        state.time_out();
        observer(&state);
        let handle = ResumeHandle::new(container_id, job_id);
        tracing::warn!(attempts = state.attempt_count(), handle = %handle, "Timed out waiting for artifact");
        Ok(TrackOutcome::TimedOut(handle))
    }

    fn should_probe(&self, state: &PollState, attempt: u32) -> bool {
        state.rapid_mode()
            || (attempt >= self.config.probe_start
                && attempt % self.config.probe_every.max(1) == 0)
    }

    /// Handle a retrieval made because the status said `completed`
    fn after_reported_completion(
        &self,
        state: &mut PollState,
        outcome: RetrievalOutcome,
        attempt: u32,
    ) -> Option<PathBuf> {
        match outcome {
            RetrievalOutcome::Ready(path) => {
                state.complete(path.clone());
                tracing::info!(attempt, path = %path.display(), "Artifact saved");
                Some(path)
            }
            RetrievalOutcome::NotReady => {
                state.record_error(PollErrorKind::NotReady);
                self.escalate(state, attempt);
                None
            }
            RetrievalOutcome::Unparseable(detail) => {
                tracing::debug!(attempt, "Artifact metadata not parseable yet: {}", detail);
                state.record_error(PollErrorKind::Unparseable);
                self.escalate(state, attempt);
                None
            }
            RetrievalOutcome::Failed(detail) => {
                tracing::warn!(attempt, "Retrieval failed, retrying next poll: {}", detail);
                state.record_error(PollErrorKind::Retrieval);
                None
            }
        }
    }

    /// Handle an opportunistic retrieval made while the status was still pending
    fn after_probe(
        &self,
        state: &mut PollState,
        outcome: RetrievalOutcome,
        attempt: u32,
    ) -> Option<PathBuf> {
        match outcome {
            RetrievalOutcome::Ready(path) => {
                state.complete(path.clone());
                tracing::info!(attempt, path = %path.display(), "Artifact ready before status caught up");
                Some(path)
            }
            RetrievalOutcome::NotReady => {
                tracing::trace!(attempt, "Probe: artifact not ready");
                state.record_error(PollErrorKind::NotReady);
                None
            }
            RetrievalOutcome::Unparseable(detail) => {
                tracing::debug!(attempt, "Probe found an unparseable artifact: {}", detail);
                state.record_error(PollErrorKind::Unparseable);
                self.escalate(state, attempt);
                None
            }
            RetrievalOutcome::Failed(detail) => {
                tracing::debug!(attempt, "Probe failed: {}", detail);
                state.record_error(PollErrorKind::Retrieval);
                None
            }
        }
    }

    fn escalate(&self, state: &mut PollState, attempt: u32) {
        if state.enter_rapid_mode() {
            tracing::info!(
                attempt,
                interval_secs = self.config.rapid_interval.as_secs(),
                "Artifact is close, switching to rapid polling"
            );
        }
    }
}
