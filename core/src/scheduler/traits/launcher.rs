use tokio::sync::mpsc;

use crate::scheduler::types::TaskId;
use crate::worker::{Assignment, UnitMessage};

/// One terminal-ish signal emitted by an execution unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitSignal {
    /// The unit posted its result message.
    Message(UnitMessage),
    /// The unit's execution context failed (spawn/IO/protocol failure).
    Error(String),
    /// The unit's execution context ended. May follow a message or stand alone.
    Exit { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitEvent {
    pub task_id: TaskId,
    pub signal: UnitSignal,
}

pub type UnitEventSender = mpsc::UnboundedSender<UnitEvent>;
pub type UnitEventReceiver = mpsc::UnboundedReceiver<UnitEvent>;

/// Sending half handed to a unit, pre-bound to its task id.
///
/// Sends never fail loudly: once the scheduler has gone away nobody is left
/// to read the signal.
#[derive(Debug, Clone)]
pub struct UnitReporter {
    task_id: TaskId,
    tx: UnitEventSender,
}

impl UnitReporter {
    pub fn new(task_id: TaskId, tx: UnitEventSender) -> Self {
        Self { task_id, tx }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn message(&self, message: UnitMessage) {
        self.send(UnitSignal::Message(message));
    }

    pub fn error(&self, error: impl Into<String>) {
        self.send(UnitSignal::Error(error.into()));
    }

    pub fn exit(&self, code: Option<i32>) {
        self.send(UnitSignal::Exit { code });
    }

    fn send(&self, signal: UnitSignal) {
        let _ = self.tx.send(UnitEvent {
            task_id: self.task_id,
            signal,
        });
    }
}

/// Scheduler-side handle to a running execution unit.
pub trait UnitHandle: Send {
    /// Stop the unit if it is still running.
    ///
    /// The scheduler calls this exactly once per launched unit: when its task
    /// reaches a terminal state (including after it reported), or during
    /// cleanup. Units that already exited must treat it as a no-op.
    fn terminate(&mut self);
}

/// Entry point of an execution unit: knows how to start one for a batch.
///
/// `launch` must not block; the unit reports back through `reporter` only.
pub trait UnitLauncher: Send + Sync {
    fn name(&self) -> &str;

    fn launch(
        &self,
        assignment: Assignment,
        reporter: UnitReporter,
    ) -> anyhow::Result<Box<dyn UnitHandle>>;
}
