//! Execution-unit side of the scheduler.
//!
//! Runs a per-item routine over one assigned batch and produces exactly one
//! [`UnitMessage`]. Launchers call [`run_assignment_until`] in-process or spawn
//! a child that calls [`serve`] on its stdio.

mod adapter;
mod protocol;

pub use adapter::{run_assignment, run_assignment_until, serve, ItemProcessor, ProcessorFactory};
pub use protocol::{Assignment, UnitMessage};
