#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchlint_core::scheduler::{
    ItemOutcome, ProgressFactory, ProgressOptions, ProgressTracker, TaskId, UnitHandle, UnitLauncher,
    UnitReporter,
};
use batchlint_core::worker::{Assignment, UnitMessage};
use batchlint_core::Batch;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub fn batches(groups: &[&[&str]]) -> Vec<Batch> {
    groups
        .iter()
        .map(|items| items.iter().copied().collect())
        .collect()
}

/// What a fake execution unit does after it has been launched.
#[derive(Debug, Clone)]
pub enum Script {
    /// Post a message after `after`, then exit with code 0.
    Reply { after: Duration, message: UnitMessage },
    /// Report an execution-context error after `after`.
    Error { after: Duration, error: String },
    /// Exit after `after` without ever posting a message.
    Exit { after: Duration, code: Option<i32> },
    /// Never report anything.
    Hang,
    /// Keep running through `terminate` and post `message` after `after`.
    Stubborn { after: Duration, message: UnitMessage },
    /// Post `message` after `after`, then keep running until terminated.
    Linger { after: Duration, message: UnitMessage },
    /// Refuse to start.
    Refuse(String),
}

impl Script {
    /// Success with one `{"seen": true}` outcome per item.
    pub fn echo(assignment: &Assignment, after: Duration) -> Self {
        Script::Reply {
            after,
            message: UnitMessage::Success {
                items: assignment
                    .items
                    .iter()
                    .map(|item| ItemOutcome::ok(item.as_str(), serde_json::json!({ "seen": true })))
                    .collect(),
            },
        }
    }
}

type Behavior = dyn Fn(&Assignment) -> Script + Send + Sync;

/// In-process launcher driven by a script per assignment.
///
/// Records every launch, how often each unit was terminated, which units ran
/// to their end and the highest number of units alive at once.
pub struct FakeLauncher {
    behavior: Box<Behavior>,
    stats: Arc<LaunchStats>,
}

#[derive(Default)]
pub struct LaunchStats {
    launched: Mutex<Vec<Assignment>>,
    terminated: Mutex<HashMap<TaskId, usize>>,
    exited: Mutex<HashSet<TaskId>>,
    alive: AtomicUsize,
    peak: AtomicUsize,
}

impl LaunchStats {
    pub fn launched(&self) -> Vec<Assignment> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn terminations(&self, task_id: TaskId) -> usize {
        self.terminated
            .lock()
            .unwrap()
            .get(&task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_terminations(&self) -> usize {
        self.terminated.lock().unwrap().values().sum()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Launched units that neither ran to their end nor were terminated.
    pub fn unsettled(&self) -> Vec<TaskId> {
        let exited = self.exited.lock().unwrap();
        let terminated = self.terminated.lock().unwrap();
        self.launched()
            .iter()
            .map(|a| a.task_id)
            .filter(|id| !exited.contains(id) && !terminated.contains_key(id))
            .collect()
    }

    fn enter(&self) {
        let now = self.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, running: &AtomicBool) {
        if running.swap(false, Ordering::SeqCst) {
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn exit(&self, task_id: TaskId) {
        self.exited.lock().unwrap().insert(task_id);
    }
}

impl FakeLauncher {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(&Assignment) -> Script + Send + Sync + 'static,
    {
        Self {
            behavior: Box::new(behavior),
            stats: Arc::new(LaunchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LaunchStats> {
        Arc::clone(&self.stats)
    }
}

impl UnitLauncher for FakeLauncher {
    fn name(&self) -> &str {
        "fake"
    }

    fn launch(
        &self,
        assignment: Assignment,
        reporter: UnitReporter,
    ) -> anyhow::Result<Box<dyn UnitHandle>> {
        let script = (self.behavior)(&assignment);
        if let Script::Refuse(reason) = &script {
            anyhow::bail!("{reason}");
        }

        self.stats.launched.lock().unwrap().push(assignment.clone());
        self.stats.enter();

        let task_id = assignment.task_id;
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::clone(&self.stats);
        let unit_running = Arc::clone(&running);
        let stubborn = matches!(script, Script::Stubborn { .. });
        let task = tokio::spawn(async move {
            match script {
                Script::Reply { after, message } | Script::Stubborn { after, message } => {
                    tokio::time::sleep(after).await;
                    stats.leave(&unit_running);
                    reporter.message(message);
                    reporter.exit(Some(0));
                }
                Script::Error { after, error } => {
                    tokio::time::sleep(after).await;
                    stats.leave(&unit_running);
                    reporter.error(error);
                }
                Script::Exit { after, code } => {
                    tokio::time::sleep(after).await;
                    stats.leave(&unit_running);
                    reporter.exit(code);
                }
                Script::Linger { after, message } => {
                    tokio::time::sleep(after).await;
                    reporter.message(message);
                    std::future::pending::<()>().await
                }
                Script::Hang => std::future::pending::<()>().await,
                Script::Refuse(_) => {}
            }
            stats.exit(task_id);
        });

        Ok(Box::new(FakeHandle {
            task_id,
            task: Some(task),
            running,
            stubborn,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeHandle {
    task_id: TaskId,
    task: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    stubborn: bool,
    stats: Arc<LaunchStats>,
}

impl UnitHandle for FakeHandle {
    fn terminate(&mut self) {
        *self
            .stats
            .terminated
            .lock()
            .unwrap()
            .entry(self.task_id)
            .or_insert(0) += 1;

        if self.stubborn {
            return;
        }
        if let Some(task) = self.task.take() {
            self.stats.leave(&self.running);
            task.abort();
        }
    }
}

/// One call made on a recording progress tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressCall {
    Start(usize),
    Increment,
    Update(usize),
    Stop,
}

#[derive(Clone, Default)]
pub struct ProgressLog(Arc<Mutex<Vec<ProgressCall>>>);

impl ProgressLog {
    pub fn calls(&self) -> Vec<ProgressCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: ProgressCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn factory(&self) -> ProgressFactory {
        let log = self.clone();
        Arc::new(move |_: &ProgressOptions| {
            Box::new(RecordingProgress {
                log: log.clone(),
                completed: 0,
            }) as Box<dyn ProgressTracker>
        })
    }
}

struct RecordingProgress {
    log: ProgressLog,
    completed: usize,
}

impl ProgressTracker for RecordingProgress {
    fn start(&mut self, total: usize) {
        self.log.0.lock().unwrap().push(ProgressCall::Start(total));
    }

    fn increment(&mut self) {
        self.completed += 1;
        self.log.0.lock().unwrap().push(ProgressCall::Increment);
    }

    fn update(&mut self, value: usize) {
        self.completed = value;
        self.log.0.lock().unwrap().push(ProgressCall::Update(value));
    }

    fn stop(&mut self) {
        self.log.0.lock().unwrap().push(ProgressCall::Stop);
    }

    fn completed(&self) -> usize {
        self.completed
    }
}

/// Collects warn and error events emitted while installed.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Install for the current thread until the guard is dropped.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn count(&self, level: Level) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push((level, visitor.0));
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
