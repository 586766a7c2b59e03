use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::SchedulerError;
use crate::worker::{Assignment, UnitMessage};

use super::traits::{
    ProgressTracker, UnitEvent, UnitEventReceiver, UnitEventSender, UnitHandle, UnitLauncher,
    UnitReporter, UnitSignal,
};
use super::types::{Batch, BatchResult, BatchStatus, SchedulerConfig, TaskId, TaskState};

/// A task whose unit has been spawned and has not reached a terminal state.
///
/// Its handle is terminated exactly once: when the task finishes, or by
/// [`RunState::terminate_all`] if the run ends first.
struct ActiveTask {
    batch_index: usize,
    item_count: usize,
    handle: Box<dyn UnitHandle>,
    state: TaskState,
    started_at: Instant,
    deadline: Instant,
}

impl ActiveTask {
    fn advance(&mut self, next: TaskState) {
        let moved = self.state.transition(next);
        debug_assert!(
            moved.is_some(),
            "illegal task transition {:?} -> {:?}",
            self.state,
            next
        );
        if let Some(state) = moved {
            self.state = state;
        }
    }
}

/// Bookkeeping of one scheduling run: pending queue, active set, results.
///
/// Owned by a single `run` call and mutated only between waits. Any unit still
/// active when the state is dropped gets terminated.
pub(crate) struct RunState {
    config: SchedulerConfig,
    launcher: Arc<dyn UnitLauncher>,
    shared_config: serde_json::Value,
    pending: VecDeque<(usize, Batch)>,
    active: HashMap<TaskId, ActiveTask>,
    results: Vec<BatchResult>,
    next_task: u64,
    events_tx: UnitEventSender,
    events_rx: UnitEventReceiver,
}

impl RunState {
    pub(crate) fn new(
        batches: Vec<Batch>,
        config: SchedulerConfig,
        launcher: Arc<dyn UnitLauncher>,
        shared_config: serde_json::Value,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let total = batches.len();

        Self {
            config,
            launcher,
            shared_config,
            pending: batches.into_iter().enumerate().collect(),
            active: HashMap::new(),
            results: Vec::with_capacity(total),
            next_task: 0,
            events_tx,
            events_rx,
        }
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Run until every batch has a result, or fail on the first scheduler fault.
    pub(crate) async fn drive(
        &mut self,
        progress: &mut dyn ProgressTracker,
        poll_interval: Duration,
    ) -> Result<(), SchedulerError> {
        let mut tick = tokio::time::interval(poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.pending.is_empty() || !self.active.is_empty() {
            self.fill_slots()?;

            let deadline = self.next_deadline();
            // The run keeps its own sender, so the channel never closes while waiting.
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_event(event, progress),
                _ = sleep_until(deadline) => self.expire(progress),
                _ = tick.tick() => {}
            }
        }

        Ok(())
    }

    pub(crate) fn take_results(&mut self) -> Vec<BatchResult> {
        std::mem::take(&mut self.results)
    }

    /// Forcibly stop every unit still active. Each unit is terminated once.
    pub(crate) fn terminate_all(&mut self) {
        for (task_id, mut task) in self.active.drain() {
            tracing::debug!(%task_id, batch_index = task.batch_index, "terminating execution unit");
            task.handle.terminate();
        }
    }

    fn fill_slots(&mut self) -> Result<(), SchedulerError> {
        while self.active.len() < self.config.max_concurrency {
            let Some((batch_index, batch)) = self.pending.pop_front() else {
                break;
            };
            self.launch(batch_index, batch)?;
        }
        Ok(())
    }

    fn launch(&mut self, batch_index: usize, batch: Batch) -> Result<(), SchedulerError> {
        let task_id = TaskId(self.next_task);
        self.next_task += 1;

        let item_count = batch.len();
        let assignment = Assignment {
            task_id,
            items: batch.into_items(),
            config: self.shared_config.clone(),
        };
        let reporter = UnitReporter::new(task_id, self.events_tx.clone());

        let handle = self
            .launcher
            .launch(assignment, reporter)
            .map_err(|source| SchedulerError::Spawn {
                task_id,
                batch_index,
                source,
            })?;

        let started_at = Instant::now();
        let mut task = ActiveTask {
            batch_index,
            item_count,
            handle,
            state: TaskState::Pending,
            started_at,
            deadline: started_at + self.config.task_timeout,
        };
        task.advance(TaskState::Running);

        tracing::debug!(%task_id, batch_index, items = item_count, "execution unit started");
        self.active.insert(task_id, task);
        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.active.values().map(|t| t.deadline).min()
    }

    fn handle_event(&mut self, event: UnitEvent, progress: &mut dyn ProgressTracker) {
        let UnitEvent { task_id, signal } = event;

        let Some(task) = self.active.remove(&task_id) else {
            tracing::debug!(%task_id, signal = signal_kind(&signal), "ignoring signal from finished task");
            return;
        };

        let status = match signal {
            UnitSignal::Message(UnitMessage::Success { items }) => {
                tracing::debug!(
                    %task_id,
                    batch_index = task.batch_index,
                    items = items.len(),
                    "batch completed"
                );
                BatchStatus::Completed { items }
            }
            UnitSignal::Message(UnitMessage::Failure { error }) | UnitSignal::Error(error) => {
                tracing::error!(
                    %task_id,
                    batch_index = task.batch_index,
                    items = task.item_count,
                    error = %error,
                    "execution unit failed"
                );
                BatchStatus::Failed { error }
            }
            UnitSignal::Exit { code } => {
                let error = match code {
                    Some(code) => format!("execution unit exited with code {code} before reporting"),
                    None => "execution unit exited before reporting".to_string(),
                };
                tracing::error!(
                    %task_id,
                    batch_index = task.batch_index,
                    error = %error,
                    "execution unit exited without a result"
                );
                BatchStatus::Failed { error }
            }
        };

        self.finish(task, status, progress);
    }

    fn expire(&mut self, progress: &mut dyn ProgressTracker) {
        let now = Instant::now();
        let mut expired: Vec<TaskId> = self
            .active
            .iter()
            .filter(|(_, task)| task.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();

        let timeout_ms = self.config.timeout_ms();
        for task_id in expired {
            let Some(task) = self.active.remove(&task_id) else {
                continue;
            };
            tracing::warn!(
                %task_id,
                batch_index = task.batch_index,
                items = task.item_count,
                timeout_ms,
                "execution unit timed out and was terminated"
            );
            self.finish(task, BatchStatus::TimedOut { timeout_ms }, progress);
        }
    }

    fn finish(&mut self, mut task: ActiveTask, status: BatchStatus, progress: &mut dyn ProgressTracker) {
        let next = match &status {
            BatchStatus::Completed { .. } => TaskState::Completed,
            BatchStatus::Failed { .. } => TaskState::Failed,
            BatchStatus::TimedOut { .. } => TaskState::TimedOut,
        };
        task.advance(next);

        // A unit that has reported may still be alive; it is not needed past this point.
        task.handle.terminate();

        self.results.push(BatchResult {
            batch_index: task.batch_index,
            status,
            duration_ms: task.started_at.elapsed().as_millis() as u64,
        });
        progress.increment();
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        if !self.active.is_empty() {
            self.terminate_all();
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn signal_kind(signal: &UnitSignal) -> &'static str {
    match signal {
        UnitSignal::Message(_) => "message",
        UnitSignal::Error(_) => "error",
        UnitSignal::Exit { .. } => "exit",
    }
}
