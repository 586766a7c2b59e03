//! Merges per-batch results into per-item outcomes and batch failure records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::scheduler::types::{BatchResult, BatchStatus, ItemOutcome};

/// Why a whole batch produced no item outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    Error { message: String },
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    #[serde(flatten)]
    pub reason: FailureReason,
}

/// Order-insensitive view of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResults {
    /// Every reported item keyed by its id. A later report for the same id wins.
    pub items: BTreeMap<String, ItemOutcome>,
    /// Batches that failed or timed out, sorted by batch index.
    pub batch_failures: Vec<BatchFailure>,
}

impl AggregatedResults {
    pub fn outcome(&self, item_id: &str) -> Option<&ItemOutcome> {
        self.items.get(item_id)
    }

    /// Items that were processed and carry a per-item error.
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.values().filter(|o| !o.is_ok())
    }

    pub fn succeeded_items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.values().filter(|o| o.is_ok())
    }

    pub fn is_clean(&self) -> bool {
        self.batch_failures.is_empty() && self.failed_items().next().is_none()
    }
}

pub fn aggregate(results: &[BatchResult]) -> AggregatedResults {
    let mut merged = AggregatedResults::default();

    for result in results {
        match &result.status {
            BatchStatus::Completed { items } => {
                for item in items {
                    merged.items.insert(item.item_id.clone(), item.clone());
                }
            }
            BatchStatus::Failed { error } => merged.batch_failures.push(BatchFailure {
                batch_index: result.batch_index,
                reason: FailureReason::Error {
                    message: error.clone(),
                },
            }),
            BatchStatus::TimedOut { timeout_ms } => merged.batch_failures.push(BatchFailure {
                batch_index: result.batch_index,
                reason: FailureReason::Timeout {
                    timeout_ms: *timeout_ms,
                },
            }),
        }
    }

    merged.batch_failures.sort_by_key(|f| f.batch_index);
    merged
}
