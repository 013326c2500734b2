//! Import outcome model.

use serde::Serialize;

use super::SearchRecord;

/// Which path produced an import outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Batches linked to the deep-research task
    Bulk,
    /// One "add source by URL" call per record
    PerRecord,
}

/// A record the notebook refused, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub record: SearchRecord,
    pub error: String,
}

/// Result of pushing records into a notebook.
///
/// Fewer imported than attempted is a partial success, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub mode: ImportMode,
    pub attempted_count: usize,
    pub imported_count: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportOutcome {
    pub fn new(mode: ImportMode) -> Self {
        Self {
            mode,
            attempted_count: 0,
            imported_count: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, record: &SearchRecord, error: impl Into<String>) {
        self.failures.push(ImportFailure {
            record: record.clone(),
            error: error.into(),
        });
    }

    pub fn is_partial(&self) -> bool {
        self.imported_count < self.attempted_count
    }
}
