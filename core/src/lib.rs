pub mod aggregate;
pub mod config;
pub mod error;
pub mod scan;
pub mod scheduler;
pub mod worker;

pub use aggregate::{aggregate, AggregatedResults, BatchFailure, FailureReason};
pub use scheduler::{Batch, BatchProcessor, BatchResult, BatchStatus, RunOptions};
