//! Pushing discovered records into a notebook.

use std::sync::Arc;

use crate::models::{ImportMode, ImportOutcome, SearchRecord};
use crate::notebook::NotebookClient;

/// Records linked per bulk call
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Imports records, preferring bulk linking to a research task and falling
/// back to adding sources one URL at a time.
pub struct ImportPipeline {
    client: Arc<dyn NotebookClient>,
    batch_size: usize,
}

impl ImportPipeline {
    pub fn new(client: Arc<dyn NotebookClient>, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Import `records` into `container_id`.
    ///
    /// With an `origin_job`, records are linked in batches until one batch
    /// fails. If that imports nothing, every record with a URL is added
    /// individually instead. Partial imports are not errors.
    pub async fn import(
        &self,
        container_id: &str,
        records: &[SearchRecord],
        origin_job: Option<&str>,
    ) -> ImportOutcome {
        if let Some(job_id) = origin_job {
            let outcome = self.import_bulk(container_id, job_id, records).await;
            if outcome.imported_count > 0 {
                return outcome;
            }
            tracing::info!(
                failures = outcome.failures.len(),
                "Bulk import linked nothing, adding sources one by one"
            );
        }
        self.import_each(container_id, records).await
    }

    async fn import_bulk(
        &self,
        container_id: &str,
        job_id: &str,
        records: &[SearchRecord],
    ) -> ImportOutcome {
        let mut outcome = ImportOutcome::new(ImportMode::Bulk);

        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            outcome.attempted_count += batch.len();
            match self
                .client
                .link_research_sources(container_id, job_id, batch)
                .await
            {
                Ok(imported) => {
                    tracing::debug!(batch = index, linked = imported.len(), "Batch linked");
                    outcome.imported_count += imported.len();
                }
                Err(e) => {
                    tracing::warn!(batch = index, size = batch.len(), "Batch import failed: {}", e);
                    let error = e.to_string();
                    for record in batch {
                        outcome.record_failure(record, error.clone());
                    }
                    break;
                }
            }
        }

        outcome
    }

    async fn import_each(&self, container_id: &str, records: &[SearchRecord]) -> ImportOutcome {
        let mut outcome = ImportOutcome::new(ImportMode::PerRecord);

        for record in records {
            let Some(url) = record.import_url() else {
                tracing::debug!(title = record.title(), "Skipping record without a URL");
                continue;
            };
            outcome.attempted_count += 1;

            match self.client.add_source_by_url(container_id, url).await {
                Ok(()) => outcome.imported_count += 1,
                Err(e) => {
                    tracing::warn!(url, "Could not add source: {}", e);
                    outcome.record_failure(record, e.to_string());
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderId, RecordBuilder};
    use crate::notebook::MockNotebookClient;
    use crate::sources::mock::make_record;

    fn records(count: usize) -> Vec<SearchRecord> {
        (0..count)
            .map(|i| make_record(&ProviderId::Arxiv, &format!("paper {}", i)))
            .collect()
    }

    fn pipeline(client: &Arc<MockNotebookClient>) -> ImportPipeline {
        ImportPipeline::new(client.clone(), DEFAULT_BATCH_SIZE)
    }

    #[tokio::test]
    async fn test_bulk_import_in_batches_of_fifteen() {
        let client = Arc::new(MockNotebookClient::new());
        let outcome = pipeline(&client).import("nb", &records(17), Some("task")).await;

        assert_eq!(client.link_batches(), vec![15, 2]);
        assert_eq!(outcome.mode, ImportMode::Bulk);
        assert_eq!(outcome.attempted_count, 17);
        assert_eq!(outcome.imported_count, 17);
        assert!(!outcome.is_partial());
        assert!(client.added_urls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_stops_bulk_and_keeps_prior_successes() {
        let client = Arc::new(MockNotebookClient::new().fail_link_batch(1));
        let outcome = pipeline(&client).import("nb", &records(40), Some("task")).await;

        assert_eq!(client.link_batches(), vec![15, 15]);
        assert_eq!(outcome.mode, ImportMode::Bulk);
        assert_eq!(outcome.imported_count, 15);
        assert_eq!(outcome.failures.len(), 15);
        assert!(outcome.is_partial());
        assert!(client.added_urls().is_empty());
    }

    #[tokio::test]
    async fn test_first_batch_failure_falls_back_to_per_record() {
        let client = Arc::new(MockNotebookClient::new().fail_link_batch(0));
        let outcome = pipeline(&client).import("nb", &records(3), Some("task")).await;

        assert_eq!(outcome.mode, ImportMode::PerRecord);
        assert_eq!(outcome.imported_count, 3);
        assert_eq!(client.added_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_without_origin_job_records_without_url_are_skipped() {
        let client = Arc::new(MockNotebookClient::new().fail_url("http://example.com/paper-1"));
        let mut input = records(3);
        input.push(RecordBuilder::new(ProviderId::Arxiv).title("no link").build());
        input.push(
            RecordBuilder::new(ProviderId::Arxiv)
                .title("pdf preferred")
                .url("https://example.com/landing")
                .pdf_url("https://example.com/paper.pdf")
                .build(),
        );

        let outcome = pipeline(&client).import("nb", &input, None).await;

        assert!(client.link_batches().is_empty());
        assert_eq!(outcome.mode, ImportMode::PerRecord);
        assert_eq!(outcome.attempted_count, 4);
        assert_eq!(outcome.imported_count, 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].record.title(), "paper 1");
        assert_eq!(
            client.added_urls().last().map(String::as_str),
            Some("https://example.com/paper.pdf")
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let client = Arc::new(MockNotebookClient::new());
        let outcome = pipeline(&client).import("nb", &[], Some("task")).await;
        assert_eq!(outcome.attempted_count, 0);
        assert_eq!(outcome.imported_count, 0);
        assert!(client.link_batches().is_empty());
    }
}
