#[allow(clippy::module_inception)]
pub mod error;
pub mod scheduler;

pub use error::CliError;
pub use scheduler::SchedulerError;
