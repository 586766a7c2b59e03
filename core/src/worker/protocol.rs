use serde::{Deserialize, Serialize};

use crate::scheduler::types::{ItemOutcome, TaskId};

/// What an execution unit receives: one batch plus its own copy of the shared config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub items: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// The single result message an execution unit posts back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitMessage {
    /// Every item was attempted; item-level failures live in `ItemOutcome::error`.
    Success { items: Vec<ItemOutcome> },
    /// The unit could not produce results for the batch at all.
    Failure { error: String },
}

impl UnitMessage {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }
}
