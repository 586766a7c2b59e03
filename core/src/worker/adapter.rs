use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Context;

use crate::scheduler::types::ItemOutcome;

use super::protocol::{Assignment, UnitMessage};

/// Per-item analysis routine run inside an execution unit.
pub trait ItemProcessor {
    fn process_item(&mut self, item_id: &str) -> anyhow::Result<serde_json::Value>;
}

/// Builds an item processor from the shared configuration of a run.
///
/// A failing `create` is the only way a unit reports a batch-level failure.
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, config: &serde_json::Value) -> anyhow::Result<Box<dyn ItemProcessor>>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&serde_json::Value) -> anyhow::Result<Box<dyn ItemProcessor>> + Send + Sync,
{
    fn create(&self, config: &serde_json::Value) -> anyhow::Result<Box<dyn ItemProcessor>> {
        self(config)
    }
}

/// Process every item of the assignment in order and build the result message.
pub fn run_assignment(factory: &dyn ProcessorFactory, assignment: &Assignment) -> UnitMessage {
    run_assignment_until(factory, assignment, || true)
        .unwrap_or_else(|| UnitMessage::failure("execution unit cancelled"))
}

/// Like [`run_assignment`], but checks `keep_going` before each item.
///
/// Returns `None` as soon as `keep_going` answers false; the work done so far
/// is dropped.
pub fn run_assignment_until(
    factory: &dyn ProcessorFactory,
    assignment: &Assignment,
    keep_going: impl Fn() -> bool,
) -> Option<UnitMessage> {
    let created = catch_unwind(AssertUnwindSafe(|| factory.create(&assignment.config)));
    let mut processor = match created {
        Ok(Ok(processor)) => processor,
        Ok(Err(e)) => {
            tracing::error!(task_id = %assignment.task_id, error = %e, "processor setup failed");
            return Some(UnitMessage::failure(format!("{e:#}")));
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            tracing::error!(task_id = %assignment.task_id, error = %msg, "processor setup panicked");
            return Some(UnitMessage::failure(msg));
        }
    };

    let mut items = Vec::with_capacity(assignment.items.len());
    for item_id in &assignment.items {
        if !keep_going() {
            return None;
        }

        tracing::debug!(task_id = %assignment.task_id, item = %item_id, "processing item");
        let outcome = match catch_unwind(AssertUnwindSafe(|| processor.process_item(item_id))) {
            Ok(Ok(value)) => ItemOutcome::ok(item_id.as_str(), value),
            Ok(Err(e)) => ItemOutcome::failed(item_id.as_str(), format!("{e:#}")),
            Err(panic) => ItemOutcome::failed(item_id.as_str(), panic_message(panic.as_ref())),
        };
        items.push(outcome);
    }

    Some(UnitMessage::Success { items })
}

/// Child-process side of the unit protocol.
///
/// Reads one JSON assignment line, processes it, writes one JSON message line.
/// Malformed or missing input is answered with a failure message.
pub fn serve<R, W>(factory: &dyn ProcessorFactory, mut reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("read assignment from stdin")?;

    let message = if read == 0 || line.trim().is_empty() {
        UnitMessage::failure("no assignment received")
    } else {
        match serde_json::from_str::<Assignment>(line.trim()) {
            Ok(assignment) => run_assignment(factory, &assignment),
            Err(e) => UnitMessage::failure(format!("invalid assignment: {e}")),
        }
    };

    serde_json::to_writer(&mut writer, &message).context("encode unit message")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
