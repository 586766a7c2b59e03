use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use batchlint_core::config::{AppConfig, LauncherKind};
use batchlint_core::scheduler::UnitLauncher;
use batchlint_core::worker::{ItemProcessor, ProcessorFactory};

use crate::analyzer::{TextStatsAnalyzer, TextStatsConfig};
use crate::launcher::{ProcessLauncher, ThreadLauncher};

pub const DEFAULT_ANALYZER: &str = "text-stats";

pub fn analyzer_names() -> &'static [&'static str] {
    &[DEFAULT_ANALYZER]
}

pub fn build_analyzer(name: &str) -> Result<Arc<dyn ProcessorFactory>> {
    match name {
        "text-stats" => Ok(Arc::new(
            |config: &serde_json::Value| -> Result<Box<dyn ItemProcessor>> {
                Ok(Box::new(TextStatsAnalyzer::new(TextStatsConfig::from_value(
                    config,
                )?)))
            },
        )),
        other => anyhow::bail!(
            "unknown analyzer `{other}` (available: {})",
            analyzer_names().join(", ")
        ),
    }
}

/// Build the launcher selected by `[scheduler].launcher`.
///
/// The process launcher re-invokes `worker_program` with the hidden `worker`
/// subcommand and the same `--config` file as the parent; the thread launcher
/// runs the analyzer in-process.
pub fn build_launcher(
    cfg: &AppConfig,
    analyzer: &str,
    worker_program: &Path,
    config_path: Option<&Path>,
) -> Result<Arc<dyn UnitLauncher>> {
    match cfg.scheduler.launcher {
        LauncherKind::Process => {
            // The child resolves the analyzer itself; only the name is checked here.
            build_analyzer(analyzer)?;
            Ok(Arc::new(ProcessLauncher::new(
                worker_program.as_os_str(),
                worker_args(analyzer, config_path),
            )))
        }
        LauncherKind::Thread => {
            tracing::warn!(
                "thread launcher selected: a unit stuck inside one item cannot be killed \
                 and may outlive the run"
            );
            Ok(Arc::new(ThreadLauncher::new(build_analyzer(analyzer)?)))
        }
    }
}

/// Command line of a worker child, after the program name.
pub fn worker_args(analyzer: &str, config_path: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["worker".into(), "--analyzer".into(), analyzer.into()];
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.as_os_str().to_owned());
    }
    args
}
