//! Orchestration: gather sources, import them, generate and track the video.
//!
//! - [`aggregate`]: concurrent search across providers
//! - [`ImportPipeline`]: bulk linking with a per-record fallback
//! - [`CompletionTracker`]: adaptive polling until the artifact is saved
//! - [`Workflow`]: the end-to-end run built from the pieces above

mod aggregate;
mod import;
mod research;
mod run;
mod tracker;

pub use aggregate::{aggregate, aggregate_with_report, Aggregation, ProviderReport};
pub use import::{ImportPipeline, DEFAULT_BATCH_SIZE};
pub use research::{deep_research, ResearchOutcome, ResearchSettings};
pub use run::{
    load_prompt, resume_command, video_file_name, ImportSettings, RunOptions, RunResult,
    SourceMode, Workflow, WorkflowError, WorkflowSettings,
};
pub use tracker::{CompletionTracker, TrackError, TrackOutcome, TrackerConfig};
