use serde::{Deserialize, Serialize};

use super::batch::ItemOutcome;
use super::task::TaskState;

/// Error string reported for a batch whose unit never answered in time.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Terminal record of one batch, created when its task reaches a final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Position of the batch in the submitted list.
    pub batch_index: usize,

    /// How the batch ended.
    pub status: BatchStatus,

    /// Wall-clock time from spawn to terminal signal in milliseconds.
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// The unit reported per-item outcomes (some items may still carry errors).
    Completed { items: Vec<ItemOutcome> },

    /// The unit reported that it could not process the batch, or died silently.
    Failed { error: String },

    /// The unit produced no terminal signal before its deadline and was killed.
    TimedOut { timeout_ms: u64 },
}

impl BatchResult {
    pub fn success(&self) -> bool {
        matches!(self.status, BatchStatus::Completed { .. })
    }

    pub fn items(&self) -> Option<&[ItemOutcome]> {
        match &self.status {
            BatchStatus::Completed { items } => Some(items),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            BatchStatus::Completed { .. } => None,
            BatchStatus::Failed { error } => Some(error),
            BatchStatus::TimedOut { .. } => Some(TIMEOUT_ERROR),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.status, BatchStatus::TimedOut { .. })
    }

    /// The final task state this result corresponds to.
    pub fn state(&self) -> TaskState {
        match self.status {
            BatchStatus::Completed { .. } => TaskState::Completed,
            BatchStatus::Failed { .. } => TaskState::Failed,
            BatchStatus::TimedOut { .. } => TaskState::TimedOut,
        }
    }
}
