//! Waiting on the notebook's own deep-research task.

use std::sync::Arc;
use std::time::Duration;

use crate::notebook::{NotebookClient, RemoteError, ResearchMode, ResearchSource, ResearchStatus};

/// Research polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }
}

/// What a deep-research run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchOutcome {
    /// Task id returned when the research was started
    pub task_id: Option<String>,
    pub sources: Vec<ResearchSource>,
    pub summary: Option<String>,
}

/// Start deep research on `query` and wait for it to finish.
///
/// A research run that fails to start, fails, or never finishes within
/// `max_polls` yields no sources. Only the start call can error.
pub async fn deep_research(
    client: &Arc<dyn NotebookClient>,
    container_id: &str,
    query: &str,
    mode: ResearchMode,
    settings: ResearchSettings,
    on_poll: &mut (dyn FnMut(u32, &ResearchStatus) + Send),
) -> Result<ResearchOutcome, RemoteError> {
    let Some(task) = client.start_research(container_id, query, mode).await? else {
        tracing::warn!(container_id, "Deep research did not start");
        return Ok(ResearchOutcome::default());
    };
    tracing::info!(task_id = %task.task_id, mode = %mode, "Deep research started");

    let mut outcome = ResearchOutcome {
        task_id: Some(task.task_id),
        ..Default::default()
    };

    for poll in 1..=settings.max_polls {
        tokio::time::sleep(settings.poll_interval).await;
        let status = match client.poll_research(container_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(poll, "Research poll failed: {}", e);
                continue;
            }
        };
        on_poll(poll, &status);

        match status.status.as_str() {
            "completed" => {
                tracing::info!(poll, sources = status.sources.len(), "Deep research completed");
                outcome.sources = status.sources;
                outcome.summary = status.summary.filter(|s| !s.trim().is_empty());
                return Ok(outcome);
            }
            "failed" | "error" => {
                tracing::warn!(poll, status = %status.status, "Deep research failed");
                return Ok(outcome);
            }
            _ => {}
        }
    }

    tracing::warn!(max_polls = settings.max_polls, "Deep research did not finish in time");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::MockNotebookClient;

    fn status(state: &str, sources: usize) -> ResearchStatus {
        ResearchStatus {
            task_id: Some("research-1".into()),
            status: state.into(),
            sources: (0..sources)
                .map(|i| ResearchSource {
                    title: format!("page {}", i),
                    url: format!("https://example.com/{}", i),
                })
                .collect(),
            summary: Some("summary".into()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_sources_on_completion() {
        let mock = Arc::new(MockNotebookClient::new().with_research(
            Some("research-1"),
            [status("in_progress", 1), status("completed", 3)],
        ));
        let client: Arc<dyn NotebookClient> = mock.clone();
        let mut polls = Vec::new();

        let outcome = deep_research(
            &client,
            "nb",
            "protein folding",
            ResearchMode::Deep,
            ResearchSettings::default(),
            &mut |n: u32, s: &ResearchStatus| polls.push((n, s.sources.len())),
        )
        .await
        .unwrap();

        assert_eq!(outcome.task_id.as_deref(), Some("research-1"));
        assert_eq!(outcome.sources.len(), 3);
        assert_eq!(outcome.summary.as_deref(), Some("summary"));
        assert_eq!(polls, vec![(1, 1), (2, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_started_or_failed_yields_nothing() {
        let client: Arc<dyn NotebookClient> = Arc::new(MockNotebookClient::new());
        let outcome = deep_research(
            &client,
            "nb",
            "q",
            ResearchMode::Fast,
            ResearchSettings::default(),
            &mut |_: u32, _: &ResearchStatus| {},
        )
        .await
        .unwrap();
        assert_eq!(outcome, ResearchOutcome::default());

        let client: Arc<dyn NotebookClient> = Arc::new(
            MockNotebookClient::new().with_research(Some("r"), [status("error", 2)]),
        );
        let outcome = deep_research(
            &client,
            "nb",
            "q",
            ResearchMode::Fast,
            ResearchSettings::default(),
            &mut |_: u32, _: &ResearchStatus| {},
        )
        .await
        .unwrap();
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.task_id.as_deref(), Some("r"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_polls() {
        let mock = Arc::new(
            MockNotebookClient::new().with_research(Some("r"), [status("in_progress", 0)]),
        );
        let client: Arc<dyn NotebookClient> = mock.clone();
        let settings = ResearchSettings {
            poll_interval: Duration::from_secs(5),
            max_polls: 4,
        };

        let outcome = deep_research(
            &client,
            "nb",
            "q",
            ResearchMode::Deep,
            settings,
            &mut |_: u32, _: &ResearchStatus| {},
        )
        .await
        .unwrap();

        assert!(outcome.sources.is_empty());
        assert_eq!(mock.research_polls(), 4);
    }
}
