use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::error::SchedulerError;

use super::progress::terminal_progress;
use super::state::RunState;
use super::traits::{ProgressFactory, ProgressOptions, ProgressTracker, UnitLauncher};
use super::types::{Batch, BatchResult, RunOptions, SchedulerConfig, DEFAULT_POLL_INTERVAL_MS};

/// Distributes batches over a bounded pool of execution units.
///
/// Each call to [`BatchProcessor::run`] owns its own queue, active set and
/// result list, so one processor can drive several runs concurrently.
#[derive(Clone)]
pub struct BatchProcessor {
    progress: ProgressFactory,
    progress_format: Option<String>,
    poll_interval: Duration,
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self {
            progress: terminal_progress(),
            progress_format: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Replace the tracker factory (e.g. `silent_progress()` for jsonl output).
    pub fn with_progress(mut self, factory: ProgressFactory) -> Self {
        self.progress = factory;
        self
    }

    pub fn with_progress_format(mut self, format: impl Into<String>) -> Self {
        self.progress_format = Some(format.into());
        self
    }

    /// Capacity re-check interval of the wait loop. Clamped to at least 1ms.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Process `batches`, one execution unit per batch.
    ///
    /// Returns one [`BatchResult`] per batch in completion order. Batch
    /// failures and timeouts are reported as data; `Err` means the run itself
    /// broke, after every still-running unit has been terminated.
    pub async fn run(
        &self,
        batches: Vec<Batch>,
        launcher: Arc<dyn UnitLauncher>,
        shared_config: serde_json::Value,
        options: RunOptions,
    ) -> Result<Vec<BatchResult>, SchedulerError> {
        let config = SchedulerConfig::resolve(&options)?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "batch_run",
            %run_id,
            batches = batches.len(),
            launcher = launcher.name()
        );

        async move {
            let total = batches.len();
            let mut progress = StopGuard::new((self.progress)(&ProgressOptions {
                total,
                format: self.progress_format.clone(),
            }));
            progress.tracker().start(total);

            if batches.is_empty() {
                tracing::debug!("no batches to process");
                progress.stop();
                return Ok(Vec::new());
            }

            tracing::debug!(
                max_concurrency = config.max_concurrency,
                timeout_ms = config.timeout_ms(),
                "starting batch run"
            );

            let mut run = RunState::new(batches, config, launcher, shared_config);
            let outcome = run.drive(progress.tracker(), self.poll_interval).await;

            if let Err(e) = &outcome {
                tracing::error!(error = %e, active = run.active_len(), "batch run aborted");
                run.terminate_all();
            }
            progress.stop();

            outcome.map(|()| {
                let results = run.take_results();
                tracing::debug!(
                    results = results.len(),
                    failed = results.iter().filter(|r| !r.success()).count(),
                    "batch run finished"
                );
                results
            })
        }
        .instrument(span)
        .await
    }
}

/// Calls `stop` exactly once, on the normal path or when the run is dropped.
struct StopGuard {
    tracker: Box<dyn ProgressTracker>,
    stopped: bool,
}

impl StopGuard {
    fn new(tracker: Box<dyn ProgressTracker>) -> Self {
        Self {
            tracker,
            stopped: false,
        }
    }

    fn tracker(&mut self) -> &mut dyn ProgressTracker {
        self.tracker.as_mut()
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.tracker.stop();
        }
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.stop();
    }
}
