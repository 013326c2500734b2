//! # PaperTalker
//!
//! Turn a research topic into a generated notebook video: gather sources,
//! import them into a notebook, then wait for the video and download it.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (SearchRecord, PollState, ResumeHandle, etc.)
//! - [`sources`]: Academic search providers behind the [`sources::Provider`] trait
//! - [`notebook`]: The notebook service contract and its HTTP gateway client
//! - [`workflow`]: Source aggregation, import, completion tracking and the full run
//! - [`ui`]: Themed terminal output
//! - [`utils`]: HTTP client and retry helpers
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod notebook;
pub mod sources;
pub mod ui;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use models::{ResumeHandle, SearchRecord};
pub use notebook::NotebookClient;
pub use sources::{Provider, ProviderRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
