//! Service layer: ingestion and the outbound upload pipeline.

pub mod cms;
pub mod download;
pub mod ingest;
pub mod object_store;

use std::time::Duration;

/// An item that failed a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub post_id: String,
    pub error: String,
}

/// Aggregate result of running one upload stage over a batch of items.
#[derive(Debug, Clone, Default)]
pub struct StageResult {
    /// Items waiting for this stage before the batch started.
    pub total_pending: u64,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<StageFailure>,
    pub duration: Duration,
}

impl StageResult {
    pub fn record_failure(&mut self, post_id: &str, error: impl ToString) {
        self.failed += 1;
        self.failures.push(StageFailure {
            post_id: post_id.to_string(),
            error: error.to_string(),
        });
    }

    pub fn failed_post_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.post_id.as_str()).collect()
    }
}
