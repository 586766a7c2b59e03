use thiserror::Error;

use crate::scheduler::types::TaskId;

/// Faults of the scheduling run itself. Batch-level failures are data, not errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn execution unit for {task_id} (batch {batch_index}): {source}")]
    Spawn {
        task_id: TaskId,
        batch_index: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl SchedulerError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}
