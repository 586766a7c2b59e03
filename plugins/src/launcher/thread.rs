use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use batchlint_core::scheduler::{UnitHandle, UnitLauncher, UnitReporter};
use batchlint_core::worker::{run_assignment_until, Assignment, ProcessorFactory};

/// Runs every batch on a dedicated OS thread inside the current process.
///
/// Threads cannot be killed. Terminating a unit silences it: nothing it
/// produces afterwards is reported, and it stops before its next item.
pub struct ThreadLauncher {
    factory: Arc<dyn ProcessorFactory>,
}

impl ThreadLauncher {
    pub fn new(factory: Arc<dyn ProcessorFactory>) -> Self {
        Self { factory }
    }
}

impl UnitLauncher for ThreadLauncher {
    fn name(&self) -> &str {
        "thread"
    }

    fn launch(
        &self,
        assignment: Assignment,
        reporter: UnitReporter,
    ) -> anyhow::Result<Box<dyn UnitHandle>> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let factory = Arc::clone(&self.factory);
        let task_id = assignment.task_id;

        std::thread::Builder::new()
            .name(format!("batchlint-{task_id}"))
            .spawn(move || {
                let keep_going = || !flag.load(Ordering::Acquire);
                let message = run_assignment_until(factory.as_ref(), &assignment, keep_going);

                if !keep_going() {
                    tracing::debug!(%task_id, "discarding output of terminated unit");
                    return;
                }
                if let Some(message) = message {
                    reporter.message(message);
                }
                reporter.exit(Some(0));
            })
            .with_context(|| format!("spawn thread for {task_id}"))?;

        Ok(Box::new(ThreadHandle { cancelled }))
    }
}

struct ThreadHandle {
    cancelled: Arc<AtomicBool>,
}

impl UnitHandle for ThreadHandle {
    fn terminate(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
