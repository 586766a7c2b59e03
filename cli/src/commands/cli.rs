use std::path::PathBuf;

use batchlint_core::config::LauncherKind;
use batchlint_plugins::factory::DEFAULT_ANALYZER;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherArg {
    Process,
    Thread,
}

impl From<LauncherArg> for LauncherKind {
    fn from(value: LauncherArg) -> Self {
        match value {
            LauncherArg::Process => LauncherKind::Process,
            LauncherArg::Thread => LauncherKind::Thread,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "batchlint", version, about = "Analyze files in parallel batches")]
pub struct Args {
    /// Config file to use instead of ~/.batchlint/config.toml or ./batchlint.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LintArgs {
    /// Directory, file or glob pattern to analyze.
    #[arg(default_value = ".")]
    pub target: String,

    /// Maximum number of batches processed at once.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Per-batch deadline in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Files per batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// File extensions to include (comma separated, no leading dot).
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Glob pattern to exclude. Can be specified multiple times.
    #[arg(long, action = clap::ArgAction::Append)]
    pub exclude: Vec<String>,

    #[arg(long, value_enum)]
    pub launcher: Option<LauncherArg>,

    #[arg(long, default_value = DEFAULT_ANALYZER)]
    pub analyzer: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Never draw the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Execution-unit entry point used by the process launcher.
#[derive(ClapArgs, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long, default_value = DEFAULT_ANALYZER)]
    pub analyzer: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Lint(LintArgs),
    #[command(hide = true)]
    Worker(WorkerArgs),
}
