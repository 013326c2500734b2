//! Integration tests for PaperTalker
//!
//! These drive the whole workflow against in-memory providers and a scripted
//! notebook service, with tokio's clock paused so the waits cost nothing.

use paper_talker::models::{ImportMode, ProviderId, ResumeHandle, SearchQuery};
use paper_talker::notebook::{
    MockNotebookClient, NotebookSource, ResearchMode, ResearchSource, ResearchStatus,
    RetrievalOutcome, VideoStyle,
};
use paper_talker::sources::{
    FailingProvider, MockProvider, Provider, ProviderRegistry, ProviderSettings, ProviderSpec,
};
use paper_talker::ui::Theme;
use paper_talker::workflow::{
    aggregate, ImportPipeline, RunOptions, RunResult, SourceMode, TrackError, Workflow,
    WorkflowError, WorkflowSettings, DEFAULT_BATCH_SIZE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn test_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::empty(ProviderSettings::default());
    registry.register(ProviderSpec::new("alpha", |_| {
        Ok(Arc::new(MockProvider::with_records("alpha", 3)) as Arc<dyn Provider>)
    }));
    registry.register(ProviderSpec::new("beta", |_| {
        Ok(Arc::new(FailingProvider::new("beta", "service unavailable")) as Arc<dyn Provider>)
    }));
    registry
}

fn workflow(client: &Arc<MockNotebookClient>, prompt_file: Option<PathBuf>) -> Workflow {
    let settings = WorkflowSettings {
        prompt_file,
        ..Default::default()
    };
    Workflow::new(client.clone(), test_registry(), settings, Theme::plain())
}

fn options(topic: &str, mode: SourceMode, output_dir: &Path) -> RunOptions {
    RunOptions {
        topic: topic.to_string(),
        source_mode: mode,
        style: VideoStyle::Whiteboard,
        language: "en".to_string(),
        research_mode: ResearchMode::Deep,
        platforms: vec!["alpha".to_string(), "beta".to_string()],
        max_results: 10,
        year: None,
        output_dir: output_dir.to_path_buf(),
        timeout: Duration::from_secs(600),
        instructions: None,
        no_confirm: true,
    }
}

fn research_status(state: &str, sources: usize) -> ResearchStatus {
    ResearchStatus {
        task_id: Some("research-1".to_string()),
        status: state.to_string(),
        sources: (0..sources)
            .map(|i| ResearchSource {
                title: format!("web source {}", i),
                url: format!("https://example.org/{}", i),
            })
            .collect(),
        summary: None,
    }
}

#[test]
fn test_default_registry_has_every_provider() {
    let registry = ProviderRegistry::default();
    for id in ProviderId::SEARCHABLE.iter() {
        assert!(registry.has(id.id()));
    }
    assert!(registry.create("google_scholar").is_err());
    assert!(registry.create("arxiv").is_ok());
}

#[tokio::test]
async fn test_aggregate_through_public_api() {
    let names = vec!["alpha".to_string(), "missing".to_string(), "beta".to_string()];
    let records = aggregate(&test_registry(), "graph neural networks", &names, 2, None).await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.title().starts_with("alpha paper")));
}

#[tokio::test]
async fn test_import_pipeline_with_research_task() {
    let client = Arc::new(MockNotebookClient::new());
    let records = MockProvider::with_records("alpha", 17)
        .search(&SearchQuery::new("q").max_results(50))
        .await
        .unwrap();

    let outcome = ImportPipeline::new(client.clone(), DEFAULT_BATCH_SIZE)
        .import("nb", &records, Some("research-1"))
        .await;

    assert_eq!(outcome.mode, ImportMode::Bulk);
    assert_eq!(outcome.imported_count, 17);
    assert_eq!(client.link_batches(), vec![15, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_search_run_produces_video() {
    let dir = tempfile::tempdir().unwrap();
    let prompt = dir.path().join("video.md");
    std::fs::write(&prompt, "Explain it to a curious teenager").unwrap();

    let client = Arc::new(
        MockNotebookClient::new()
            .with_statuses(["in_progress", "completed"])
            .with_retrievals([RetrievalOutcome::Ready(PathBuf::new())]),
    );
    let output = dir.path().join("out");

    let result = workflow(&client, Some(prompt))
        .run(&options("graph networks", SourceMode::Search, &output))
        .await
        .unwrap();

    let path = result.artifact().unwrap().to_path_buf();
    assert!(path.starts_with(&output));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("graph networks_"));
    assert!(name.ends_with(".mp4"));
    assert!(output.is_dir());

    assert_eq!(client.created_notebooks(), vec!["graph networks"]);
    // No research task, so each record is added by URL
    assert!(client.link_batches().is_empty());
    assert_eq!(client.added_urls().len(), 3);

    let requests = client.video_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].instructions.as_deref(),
        Some("Explain it to a curious teenager")
    );
    assert_eq!(requests[0].language, "en");
}

#[tokio::test(start_paused = true)]
async fn test_research_run_links_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockNotebookClient::new()
            .with_research(Some("research-1"), [research_status("completed", 17)])
            .with_statuses(["completed"])
            .with_retrievals([RetrievalOutcome::Ready(PathBuf::new())]),
    );

    let mut opts = options("protein folding", SourceMode::Research, dir.path());
    opts.instructions = Some("Keep it short".to_string());
    let result = workflow(&client, None).run(&opts).await.unwrap();

    assert!(matches!(result, RunResult::Completed { .. }));
    assert_eq!(client.link_batches(), vec![15, 2]);
    assert!(client.added_urls().is_empty());
    assert_eq!(
        client.video_requests()[0].instructions.as_deref(),
        Some("Keep it short")
    );
}

#[tokio::test(start_paused = true)]
async fn test_mixed_run_combines_research_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockNotebookClient::new()
            .with_research(Some("research-1"), [research_status("completed", 2)])
            .with_statuses(["completed"])
            .with_retrievals([RetrievalOutcome::Ready(PathBuf::new())]),
    );

    workflow(&client, None)
        .run(&options("LLM", SourceMode::Mixed, dir.path()))
        .await
        .unwrap();

    // 2 research sources + 3 search results in one batch
    assert_eq!(client.link_batches(), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn test_upload_run_skips_import() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockNotebookClient::new()
            .with_sources(vec![
                NotebookSource {
                    id: "s1".to_string(),
                    title: "lecture.pdf".to_string(),
                },
                NotebookSource {
                    id: "s2".to_string(),
                    title: "notes.docx".to_string(),
                },
            ])
            .with_statuses(["completed"])
            .with_retrievals([RetrievalOutcome::Ready(PathBuf::new())]),
    );

    let result = workflow(&client, None)
        .run(&options("quantum computing", SourceMode::Upload, dir.path()))
        .await
        .unwrap();

    assert!(result.artifact().is_some());
    assert!(client.link_batches().is_empty());
    assert!(client.added_urls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_returns_resume_handle() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockNotebookClient::new());

    let mut opts = options("slow topic", SourceMode::Search, dir.path());
    opts.timeout = Duration::from_secs(10);
    let result = workflow(&client, None).run(&opts).await.unwrap();

    assert_eq!(
        result,
        RunResult::TimedOut(ResumeHandle::new("mock-notebook", "mock-job"))
    );
    assert_eq!(client.status_polls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_resubmit() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        MockNotebookClient::new()
            .with_statuses(["in_progress", "completed"])
            .with_retrievals([RetrievalOutcome::Ready(PathBuf::new())]),
    );
    let handle: ResumeHandle = "nb-42 job-42".parse().unwrap();

    let result = workflow(&client, None)
        .resume(&handle, "resume", dir.path(), Duration::from_secs(60))
        .await
        .unwrap();

    match result {
        RunResult::Completed { notebook_id, path } => {
            assert_eq!(notebook_id, "nb-42");
            assert!(path.starts_with(dir.path()));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(client.video_requests().is_empty());
    assert!(client.created_notebooks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockNotebookClient::new().with_failed_status("content policy"));

    let err = workflow(&client, None)
        .run(&options("topic", SourceMode::Search, dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Track(TrackError::JobFailed { ref detail, .. }) if detail == "content policy"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_generation_rejection_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockNotebookClient::new().fail_generation("notebook is empty"));

    let err = workflow(&client, None)
        .run(&options("topic", SourceMode::Search, dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Remote(_)));
    assert_eq!(client.status_polls(), 0);
}
