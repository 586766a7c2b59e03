use thiserror::Error;

use super::scheduler::SchedulerError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("scheduler failed: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("config error: {0}")]
    Config(String),
    #[error("scan failed: {0}")]
    Scan(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
