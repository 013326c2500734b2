//! Core data models for search records, imports and generation jobs.

mod import;
mod job;
mod record;
mod search;

pub use import::{ImportFailure, ImportMode, ImportOutcome};
pub use job::{
    GenerationJob, JobStatus, JobStatusReport, ParseResumeHandleError, PollErrorKind, PollState,
    PollStatus, ResumeHandle,
};
pub use record::{ProviderId, RecordBuilder, SearchRecord, AUTHOR_SEPARATOR};
pub use search::SearchQuery;
