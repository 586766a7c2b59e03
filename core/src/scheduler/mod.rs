//! Bounded batch scheduler
//!
//! Distributes batches of opaque items over isolated execution units. It
//! supports:
//! - A hard cap on simultaneously running units
//! - FIFO dispatch of pending batches as slots free up
//! - Per-task deadlines with forced termination
//! - Guaranteed teardown of every unit on success, fault or cancellation
//!
//! # Architecture
//!
//! ```text
//! Vec<Batch>
//!   ↓
//! BatchProcessor::run(batches, launcher, shared_config, options)
//!   ↓  SchedulerConfig::resolve()
//! RunState { pending, active, results }
//!   ↓  fill_slots() → UnitLauncher::launch() → UnitHandle
//! select! { unit event | earliest deadline | poll tick }
//!   ↓
//! Vec<BatchResult> (completion order)
//! ```

mod engine;
mod progress;
mod state;
pub mod traits;
pub mod types;

pub use engine::BatchProcessor;
pub use progress::{should_render, silent_progress, terminal_progress, NoopProgress, ProgressHandler};
pub use traits::{
    ProgressFactory, ProgressOptions, ProgressTracker, UnitEvent, UnitHandle, UnitLauncher,
    UnitReporter, UnitSignal,
};
pub use types::{
    Batch, BatchResult, BatchStatus, ItemOutcome, RunOptions, SchedulerConfig, TaskId, TaskState,
};
