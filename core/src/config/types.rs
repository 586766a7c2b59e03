use serde::{Deserialize, Serialize};

use crate::scan::{ScanOptions, DEFAULT_BATCH_SIZE};
use crate::scheduler::types::{RunOptions, DEFAULT_POLL_INTERVAL_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub scan: ScanConfig,

    /// Free-form table handed unchanged to every execution unit.
    #[serde(default = "default_analyzer_config")]
    pub analyzer: serde_json::Value,
}

fn default_analyzer_config() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            scheduler: SchedulerSection::default(),
            scan: ScanConfig::default(),
            analyzer: default_analyzer_config(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "batchlint_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Which kind of execution context runs a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherKind {
    /// One child process per batch (isolated, killable).
    #[default]
    Process,
    /// One OS thread per batch (in-process, cancelled at item boundaries).
    Thread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Upper bound on concurrently running units. Unset = host parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Per-batch deadline in milliseconds. Unset = built-in default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub launcher: LauncherKind,

    /// indicatif template for the progress bar.
    #[serde(default)]
    pub progress_format: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_workers: None,
            timeout_ms: None,
            poll_interval_ms: default_poll_interval_ms(),
            launcher: LauncherKind::default(),
            progress_format: None,
        }
    }
}

impl SchedulerSection {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_concurrency: self.max_workers,
            per_task_timeout_ms: self.timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_extensions() -> Vec<String> {
    ScanOptions::default().extensions
}

fn default_skip_dirs() -> Vec<String> {
    ScanOptions::default().skip_dirs
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude: Vec::new(),
            skip_dirs: default_skip_dirs(),
            batch_size: default_batch_size(),
        }
    }
}

impl ScanConfig {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self.extensions.clone(),
            exclude: self.exclude.clone(),
            skip_dirs: self.skip_dirs.clone(),
            batch_size: self.batch_size,
        }
    }
}
