use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Default per-task deadline when the caller does not provide one.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 60_000;

/// Default capacity re-check interval of the scheduling loop.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Per-run options supplied by the caller. Unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Maximum number of execution units running at once.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Deadline for one batch, measured from its unit's spawn.
    #[serde(default)]
    pub per_task_timeout_ms: Option<u64>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.max_concurrency = Some(value);
        self
    }

    pub fn per_task_timeout_ms(mut self, value: u64) -> Self {
        self.per_task_timeout_ms = Some(value);
        self
    }
}

/// Validated, immutable settings for one scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrency: usize,
    pub task_timeout: Duration,
}

impl SchedulerConfig {
    /// Resolve caller options against defaults. Zero values are rejected.
    pub fn resolve(options: &RunOptions) -> Result<Self, SchedulerError> {
        let max_concurrency = match options.max_concurrency {
            Some(0) => {
                return Err(SchedulerError::InvalidConfig(
                    "max_concurrency must be greater than 0".into(),
                ))
            }
            Some(n) => n,
            None => default_max_concurrency(),
        };

        let timeout_ms = match options.per_task_timeout_ms {
            Some(0) => {
                return Err(SchedulerError::InvalidConfig(
                    "per_task_timeout_ms must be greater than 0".into(),
                ))
            }
            Some(ms) => ms,
            None => DEFAULT_TASK_TIMEOUT_MS,
        };

        Ok(Self {
            max_concurrency,
            task_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn timeout_ms(&self) -> u64 {
        self.task_timeout.as_millis() as u64
    }
}

/// Host parallelism, never below one.
pub fn default_max_concurrency() -> usize {
    num_cpus::get().max(1)
}
