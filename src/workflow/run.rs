//! The topic-to-video workflow.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::aggregate::aggregate_with_report;
use super::import::{ImportPipeline, DEFAULT_BATCH_SIZE};
use super::research::{deep_research, ResearchSettings};
use super::tracker::{CompletionTracker, TrackError, TrackOutcome, TrackerConfig};
use crate::models::{PollState, ResumeHandle, SearchRecord};
use crate::notebook::{
    NotebookClient, RemoteError, ResearchMode, ResearchStatus, VideoRequest, VideoStyle,
};
use crate::sources::ProviderRegistry;
use crate::ui::{self, Theme, TrackerProgress};

const TOTAL_STEPS: usize = 7;
const MAX_FILE_STEM_CHARS: usize = 50;

/// Where the notebook's sources come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// The service's own deep web research
    #[default]
    Research,
    /// Academic search providers
    Search,
    /// Files the operator uploads by hand
    Upload,
    /// Deep research followed by provider search
    Mixed,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Research => "research",
            SourceMode::Search => "search",
            SourceMode::Upload => "upload",
            SourceMode::Mixed => "mixed",
        }
    }

    fn uses_research(self) -> bool {
        matches!(self, SourceMode::Research | SourceMode::Mixed)
    }

    fn uses_search(self) -> bool {
        matches!(self, SourceMode::Search | SourceMode::Mixed)
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import batching and the pause that lets the service digest new sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub wait_base: Duration,
    pub wait_per_source: Duration,
    pub wait_max: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            wait_base: Duration::from_secs(30),
            wait_per_source: Duration::from_secs(3),
            wait_max: Duration::from_secs(90),
        }
    }
}

impl ImportSettings {
    /// `min(base + imported * per_source, max)`, or zero when nothing was imported
    pub fn processing_wait(&self, imported: usize) -> Duration {
        if imported == 0 {
            return Duration::ZERO;
        }
        let per_source = self
            .wait_per_source
            .saturating_mul(u32::try_from(imported).unwrap_or(u32::MAX));
        (self.wait_base.saturating_add(per_source)).min(self.wait_max)
    }
}

/// Everything the workflow needs besides the remote client
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    pub import: ImportSettings,
    pub research: ResearchSettings,
    pub tracker: TrackerConfig,
    /// Default video instructions, read when none are given
    pub prompt_file: Option<PathBuf>,
}

/// One run of the workflow
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub topic: String,
    pub source_mode: SourceMode,
    pub style: VideoStyle,
    pub language: String,
    pub research_mode: ResearchMode,
    pub platforms: Vec<String>,
    /// Per provider
    pub max_results: usize,
    pub year: Option<i32>,
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub instructions: Option<String>,
    /// Answer every confirmation with yes and skip waiting for the operator
    pub no_confirm: bool,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Completed {
        path: PathBuf,
        notebook_id: String,
    },
    TimedOut(ResumeHandle),
    /// The operator declined a confirmation
    Cancelled,
}

impl RunResult {
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            RunResult::Completed { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Fatal workflow errors
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Notebook service error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `<sanitized topic>_<YYYYmmdd_HHMMSS>.mp4`
pub fn video_file_name(topic: &str, at: DateTime<Local>) -> String {
    let stem: String = topic
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || "._- ".contains(c) {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_STEM_CHARS)
        .collect();
    format!("{}_{}.mp4", stem, at.format("%Y%m%d_%H%M%S"))
}

/// Read default instructions; a missing or blank file means none
pub fn load_prompt(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .filter(|text| !text.trim().is_empty())
}

/// The resume command printed when tracking times out
pub fn resume_command(topic: &str, handle: &ResumeHandle) -> String {
    format!(
        "{} \"{}\" --resume {} {}",
        env!("CARGO_PKG_NAME"),
        topic.replace('"', "\\\""),
        handle.container_id(),
        handle.job_id()
    )
}

/// Drives a topic from an empty notebook to a downloaded video
pub struct Workflow {
    client: Arc<dyn NotebookClient>,
    registry: ProviderRegistry,
    settings: WorkflowSettings,
    theme: Theme,
}

impl Workflow {
    pub fn new(
        client: Arc<dyn NotebookClient>,
        registry: ProviderRegistry,
        settings: WorkflowSettings,
        theme: Theme,
    ) -> Self {
        Self {
            client,
            registry,
            settings,
            theme,
        }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunResult, WorkflowError> {
        let theme = &self.theme;
        std::fs::create_dir_all(&options.output_dir)?;
        let instructions = options.instructions.clone().or_else(|| {
            self.settings
                .prompt_file
                .as_deref()
                .and_then(load_prompt)
        });

        theme.banner(
            "PaperTalker · topic to video",
            &[
                ("Topic", options.topic.clone()),
                ("Source", options.source_mode.to_string()),
                ("Style", options.style.to_string()),
                ("Language", options.language.clone()),
                ("Output", options.output_dir.display().to_string()),
            ],
        );

        theme.step(1, TOTAL_STEPS, "Creating notebook...");
        let notebook = self.client.create_notebook(&options.topic).await?;
        let notebook_id = notebook.id;
        theme.ok(&format!("Notebook: {}", notebook_id));
        theme.info(&format!("Link: {}", self.client.notebook_url(&notebook_id)));

        let (discovered, research_task) = self.gather(&notebook_id, options).await?;

        ui::print_sources_table(theme, &discovered, "Discovered sources");

        let imported = if options.source_mode == SourceMode::Upload {
            if !ui::confirm(
                theme,
                &format!(
                    "The notebook has {} sources. Generate the video?",
                    discovered.len()
                ),
                options.no_confirm,
            ) {
                theme.warn("Cancelled");
                return Ok(RunResult::Cancelled);
            }
            discovered.len()
        } else if discovered.is_empty() {
            theme.warn("No sources found");
            if !ui::confirm(theme, "Generate a video from an empty notebook?", options.no_confirm) {
                theme.warn("Cancelled");
                return Ok(RunResult::Cancelled);
            }
            0
        } else {
            if !ui::confirm(
                theme,
                &format!(
                    "Import {} sources into the notebook and generate the video?",
                    discovered.len()
                ),
                options.no_confirm,
            ) {
                theme.warn("Cancelled");
                return Ok(RunResult::Cancelled);
            }

            theme.step(4, TOTAL_STEPS, "Importing sources...");
            let pipeline = ImportPipeline::new(self.client.clone(), self.settings.import.batch_size);
            let outcome = pipeline
                .import(&notebook_id, &discovered, research_task.as_deref())
                .await;
            theme.ok(&format!(
                "Imported {} of {} sources",
                outcome.imported_count, outcome.attempted_count
            ));
            if !outcome.failures.is_empty() {
                theme.warn(&format!("{} sources were rejected", outcome.failures.len()));
            }
            outcome.imported_count
        };

        theme.step(5, TOTAL_STEPS, "Waiting for sources to be processed...");
        let wait = self.settings.import.processing_wait(imported);
        if wait.is_zero() {
            theme.ok("Nothing to wait for");
        } else {
            ui::countdown(theme, wait.as_secs(), "processing").await;
            theme.ok("Sources processed");
        }

        theme.step(6, TOTAL_STEPS, "Submitting video generation...");
        let request = VideoRequest {
            instructions,
            style: options.style,
            language: options.language.clone(),
        };
        let job = self.client.generate_video(&notebook_id, &request).await?;
        theme.ok(&format!("Video job: {}", job.job_id));

        let destination = options
            .output_dir
            .join(video_file_name(&options.topic, Local::now()));
        theme.step(7, TOTAL_STEPS, "Waiting for the video...");
        theme.info(&format!(
            "Up to {}s; downloading as soon as it is ready",
            options.timeout.as_secs()
        ));

        let handle = ResumeHandle::new(&notebook_id, &job.job_id);
        match self.track(&handle, &destination, options.timeout, false).await?
        {
            TrackOutcome::Completed(path) => {
                theme.success_box(
                    "All done!",
                    &[
                        ("Video", path.display().to_string()),
                        ("Notebook", notebook_id.clone()),
                        ("Link", self.client.notebook_url(&notebook_id)),
                    ],
                );
                Ok(RunResult::Completed { path, notebook_id })
            }
            TrackOutcome::TimedOut(handle) => {
                self.report_timeout(&options.topic, &handle, options.timeout);
                Ok(RunResult::TimedOut(handle))
            }
        }
    }

    /// Re-attach to a job from an earlier run and download its video
    pub async fn resume(
        &self,
        handle: &ResumeHandle,
        topic: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> Result<RunResult, WorkflowError> {
        let theme = &self.theme;
        std::fs::create_dir_all(output_dir)?;
        theme.banner(
            "PaperTalker · resume video download",
            &[
                ("Notebook", handle.container_id().to_string()),
                ("Task", handle.job_id().to_string()),
            ],
        );

        let destination = output_dir.join(video_file_name(topic, Local::now()));
        match self.track(handle, &destination, timeout, true).await?
        {
            TrackOutcome::Completed(path) => {
                theme.success_box("Download complete!", &[("Video", path.display().to_string())]);
                Ok(RunResult::Completed {
                    path,
                    notebook_id: handle.container_id().to_string(),
                })
            }
            TrackOutcome::TimedOut(handle) => {
                self.report_timeout(topic, &handle, timeout);
                Ok(RunResult::TimedOut(handle))
            }
        }
    }

    async fn gather(
        &self,
        notebook_id: &str,
        options: &RunOptions,
    ) -> Result<(Vec<SearchRecord>, Option<String>), WorkflowError> {
        let theme = &self.theme;
        let mut discovered = Vec::new();
        let mut research_task = None;

        if options.source_mode.uses_research() {
            theme.step(
                2,
                TOTAL_STEPS,
                &format!("Starting deep research ({})...", options.research_mode),
            );
            let mut on_poll = |poll: u32, status: &ResearchStatus| {
                if theme.color {
                    print!(
                        "\r    poll #{}: status={}, sources={}   ",
                        poll,
                        status.status,
                        status.sources.len()
                    );
                    let _ = std::io::stdout().flush();
                }
            };
            let outcome = deep_research(
                &self.client,
                notebook_id,
                &options.topic,
                options.research_mode,
                self.settings.research,
                &mut on_poll,
            )
            .await?;
            if theme.color {
                println!();
            }

            if outcome.task_id.is_none() {
                theme.err("Deep research failed to start");
            } else {
                theme.ok(&format!("Research found {} sources", outcome.sources.len()));
            }
            if let Some(summary) = &outcome.summary {
                theme.info(&format!("Summary: {}", ui::truncate_with_ellipsis(summary, 200)));
            }
            discovered.extend(outcome.sources.iter().map(|s| s.to_record()));

            research_task = match self.client.poll_research(notebook_id).await {
                Ok(status) => status.task_id.or(outcome.task_id),
                Err(e) => {
                    tracing::debug!("Could not read the research task id: {}", e);
                    outcome.task_id
                }
            };
        }

        if options.source_mode.uses_search() {
            theme.step(
                2,
                TOTAL_STEPS,
                &format!(
                    "Searching papers: platforms={}, max={}, year={}...",
                    options.platforms.join(","),
                    options.max_results,
                    options
                        .year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "any".to_string())
                ),
            );
            let aggregation = aggregate_with_report(
                &self.registry,
                &options.topic,
                &options.platforms,
                options.max_results,
                options.year,
            )
            .await;
            for report in aggregation.reports.iter().filter(|r| !r.succeeded()) {
                theme.warn(&format!(
                    "{}: {}",
                    report.provider,
                    report.error.as_deref().unwrap_or("failed")
                ));
            }
            theme.ok(&format!("Search found {} papers", aggregation.records.len()));
            discovered.extend(aggregation.records);
        }

        if options.source_mode == SourceMode::Upload {
            theme.step(2, TOTAL_STEPS, "Upload files into the notebook...");
            theme.info(&format!("Notebook: {}", self.client.notebook_url(notebook_id)));
            if !options.no_confirm {
                ui::wait_for_enter(theme, "Press Enter once the upload is finished...");
            }
            let sources = self.client.list_sources(notebook_id).await?;
            theme.ok(&format!("The notebook has {} sources", sources.len()));
            discovered = sources.iter().map(|s| s.to_record()).collect();
        }

        Ok((discovered, research_task))
    }

    /// Track `handle` with a progress spinner; `resuming` re-attaches to a job
    /// submitted by an earlier run
    async fn track(
        &self,
        handle: &ResumeHandle,
        destination: &Path,
        timeout: Duration,
        resuming: bool,
    ) -> Result<TrackOutcome, WorkflowError> {
        let tracker = CompletionTracker::new(self.client.clone(), self.settings.tracker);
        let progress = TrackerProgress::new(&self.theme);
        let mut observer = |state: &PollState| progress.observe(state);
        let result = if resuming {
            tracker
                .resume_with_observer(handle, destination, timeout, &mut observer)
                .await
        } else {
            tracker
                .track_with_observer(
                    handle.container_id(),
                    handle.job_id(),
                    destination,
                    timeout,
                    &mut observer,
                )
                .await
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.theme.err(&e.to_string());
                if let TrackError::FinalRetrieval { handle, .. } = &e {
                    self.theme.info(&format!("Notebook and task: {}", handle));
                }
                Err(e.into())
            }
        }
    }

    fn report_timeout(&self, topic: &str, handle: &ResumeHandle, timeout: Duration) {
        self.theme.err(&format!(
            "Video generation timed out after {}s; the job is still running",
            timeout.as_secs()
        ));
        self.theme.info("Resume with:");
        self.theme.info(&resume_command(topic, handle));
    }
}
