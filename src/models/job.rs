//! Generation job, resume handle and the tracker's poll state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A video generation job submitted to the notebook service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub container_id: String,
    pub job_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(container_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            job_id: job_id.into(),
            submitted_at: Utc::now(),
        }
    }

    /// The identifier pair needed to re-attach to this job later
    pub fn resume_handle(&self) -> ResumeHandle {
        ResumeHandle::new(&self.container_id, &self.job_id)
    }
}

/// Identifier pair that re-attaches completion tracking to an in-flight job.
///
/// Renders as `"<container_id> <job_id>"`, which is also what [`FromStr`]
/// accepts, so the pair can be copied straight from a timeout message into
/// `--resume`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeHandle {
    container_id: String,
    job_id: String,
}

impl ResumeHandle {
    pub fn new(container_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            job_id: job_id.into(),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl std::fmt::Display for ResumeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.container_id, self.job_id)
    }
}

/// Error parsing a resume handle from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected '<notebook_id> <task_id>', got '{0}'")]
pub struct ParseResumeHandleError(String);

impl FromStr for ResumeHandle {
    type Err = ParseResumeHandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(container), Some(job), None) => Ok(Self::new(container, job)),
            _ => Err(ParseResumeHandleError(s.to_string())),
        }
    }
}

/// Normalized job status as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, running, or any other non-terminal state
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map the service's raw status string onto a normalized status.
    ///
    /// Unknown strings are treated as still in progress.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" | "complete" | "done" | "succeeded" | "success" => JobStatus::Completed,
            "failed" | "failure" | "error" | "errored" | "cancelled" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// One status poll result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusReport {
    /// The status string exactly as the service reported it
    pub raw: String,
    pub status: JobStatus,
    /// Error detail attached to failed jobs
    pub error: Option<String>,
}

impl JobStatusReport {
    pub fn new(raw: impl Into<String>, error: Option<String>) -> Self {
        let raw = raw.into();
        Self {
            status: JobStatus::from_raw(&raw),
            raw,
            error,
        }
    }
}

/// Lifecycle of one tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

impl PollStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollStatus::Pending)
    }
}

/// Kind of the most recent non-fatal problem seen while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollErrorKind {
    /// The status query itself failed
    Transport,
    /// The artifact was not downloadable yet
    NotReady,
    /// The artifact exists but its metadata could not be parsed yet
    Unparseable,
    /// Any other retrieval failure
    Retrieval,
}

/// Mutable state of one tracking session.
///
/// Owned by the tracker loop. `rapid_mode` only ever goes from `false` to
/// `true`, and `status` only ever leaves `Pending` once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollState {
    status: PollStatus,
    attempt_count: u32,
    rapid_mode: bool,
    last_error_kind: Option<PollErrorKind>,
    last_reported_status: Option<String>,
    reported_complete: bool,
    result_location: Option<PathBuf>,
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

impl PollState {
    pub fn new() -> Self {
        Self {
            status: PollStatus::Pending,
            attempt_count: 0,
            rapid_mode: false,
            last_error_kind: None,
            last_reported_status: None,
            reported_complete: false,
            result_location: None,
        }
    }

    pub fn status(&self) -> PollStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn rapid_mode(&self) -> bool {
        self.rapid_mode
    }

    pub fn last_error_kind(&self) -> Option<PollErrorKind> {
        self.last_error_kind
    }

    /// Raw status string from the latest successful poll
    pub fn last_reported_status(&self) -> Option<&str> {
        self.last_reported_status.as_deref()
    }

    /// Whether the service has ever reported the job as completed
    pub fn reported_complete(&self) -> bool {
        self.reported_complete
    }

    pub fn result_location(&self) -> Option<&Path> {
        self.result_location.as_deref()
    }

    /// Start a new iteration and return its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }

    pub fn observe_status(&mut self, report: &JobStatusReport) {
        self.last_reported_status = Some(report.raw.clone());
        if report.status == JobStatus::Completed {
            self.reported_complete = true;
        }
    }

    pub fn record_error(&mut self, kind: PollErrorKind) {
        self.last_error_kind = Some(kind);
    }

    /// Switch to rapid polling. Returns `true` only on the call that flipped it.
    pub fn enter_rapid_mode(&mut self) -> bool {
        let flipped = !self.rapid_mode;
        self.rapid_mode = true;
        flipped
    }

    pub fn complete(&mut self, location: PathBuf) -> bool {
        if self.transition(PollStatus::Completed) {
            self.result_location = Some(location);
            true
        } else {
            false
        }
    }

    pub fn fail(&mut self) -> bool {
        self.transition(PollStatus::Failed)
    }

    pub fn time_out(&mut self) -> bool {
        self.transition(PollStatus::TimedOut)
    }

    fn transition(&mut self, to: PollStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = to;
        true
    }
}
