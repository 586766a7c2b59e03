use std::path::Path;
use std::time::{Duration, Instant};

use batchlint_core::aggregate::{AggregatedResults, BatchFailure, FailureReason};
use batchlint_core::config::AppConfig;
use batchlint_core::error::CliError;
use batchlint_core::scan::scan_files;
use batchlint_core::scheduler::{silent_progress, Batch, ItemOutcome};
use batchlint_core::{aggregate, BatchProcessor, BatchResult};
use batchlint_plugins::factory;
use serde::Serialize;

use super::cli::{LintArgs, OutputFormat};

/// Command-line flags win over the loaded configuration.
pub fn apply_overrides(cfg: &mut AppConfig, args: &LintArgs) {
    if let Some(n) = args.max_workers {
        cfg.scheduler.max_workers = Some(n);
    }
    if let Some(ms) = args.timeout_ms {
        cfg.scheduler.timeout_ms = Some(ms);
    }
    if let Some(size) = args.batch_size {
        cfg.scan.batch_size = size;
    }
    if !args.extensions.is_empty() {
        cfg.scan.extensions = args
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
    }
    cfg.scan.exclude.extend(args.exclude.iter().cloned());
    if let Some(launcher) = args.launcher {
        cfg.scheduler.launcher = launcher.into();
    }
}

/// `config_path` is the `--config` file the parent was started with; worker
/// children are pointed at the same file.
pub async fn run(
    args: &LintArgs,
    mut cfg: AppConfig,
    worker_program: &Path,
    config_path: Option<&Path>,
) -> Result<i32, CliError> {
    apply_overrides(&mut cfg, args);

    let batches = scan_files(&args.target, &cfg.scan.scan_options())
        .map_err(|e| CliError::Scan(format!("{e:#}")))?;
    let files = batches.iter().map(Batch::len).sum::<usize>();
    if files == 0 {
        tracing::warn!(path = %args.target, "no files matched");
    }

    let launcher = factory::build_launcher(&cfg, &args.analyzer, worker_program, config_path)
        .map_err(|e| CliError::Config(format!("{e:#}")))?;

    let mut processor = BatchProcessor::new()
        .with_poll_interval(Duration::from_millis(cfg.scheduler.poll_interval_ms));
    if args.no_progress || args.format == OutputFormat::Json {
        processor = processor.with_progress(silent_progress());
    }
    if let Some(format) = &cfg.scheduler.progress_format {
        processor = processor.with_progress_format(format.clone());
    }

    let batch_count = batches.len();
    let started = Instant::now();
    let results = processor
        .run(
            batches,
            launcher,
            cfg.analyzer.clone(),
            cfg.scheduler.run_options(),
        )
        .await?;
    let elapsed = started.elapsed();

    let merged = aggregate(&results);
    log_failures(&merged);

    let summary = Summary::new(files, batch_count, &results, &merged, elapsed);
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&summary, &merged)),
        OutputFormat::Json => {
            let report = JsonReport {
                summary: &summary,
                items: merged.items.values().collect(),
                batch_failures: &merged.batch_failures,
            };
            let out = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::Anyhow(e.into()))?;
            println!("{out}");
        }
    }

    Ok(if merged.is_clean() { 0 } else { 1 })
}

fn log_failures(merged: &AggregatedResults) {
    for failure in &merged.batch_failures {
        match &failure.reason {
            FailureReason::Error { message } => {
                tracing::warn!(batch_index = failure.batch_index, error = %message, "batch failed")
            }
            FailureReason::Timeout { timeout_ms } => {
                tracing::warn!(batch_index = failure.batch_index, timeout_ms, "batch timed out")
            }
        }
    }
    for item in merged.failed_items() {
        tracing::warn!(
            item = %item.item_id,
            error = item.error.as_deref().unwrap_or_default(),
            "item failed"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub batches: usize,
    pub succeeded_items: usize,
    pub failed_items: usize,
    pub failed_batches: usize,
    pub timed_out_batches: usize,
    /// Files that belonged to failed or timed-out batches.
    pub unprocessed_files: usize,
    pub duration_ms: u64,
    pub finished_at: String,
}

impl Summary {
    pub fn new(
        files: usize,
        batches: usize,
        results: &[BatchResult],
        merged: &AggregatedResults,
        elapsed: Duration,
    ) -> Self {
        let timed_out = merged
            .batch_failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::Timeout { .. }))
            .count();
        let processed: usize = results.iter().filter_map(|r| r.items()).map(<[_]>::len).sum();

        Self {
            files,
            batches,
            succeeded_items: merged.succeeded_items().count(),
            failed_items: merged.failed_items().count(),
            failed_batches: merged.batch_failures.len() - timed_out,
            timed_out_batches: timed_out,
            unprocessed_files: files.saturating_sub(processed),
            duration_ms: elapsed.as_millis() as u64,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a Summary,
    items: Vec<&'a ItemOutcome>,
    batch_failures: &'a [BatchFailure],
}

fn render_text(summary: &Summary, merged: &AggregatedResults) -> String {
    let mut out = String::new();

    for item in merged.failed_items() {
        out.push_str(&format!(
            "{}: error: {}\n",
            item.item_id,
            item.error.as_deref().unwrap_or_default()
        ));
    }
    for failure in &merged.batch_failures {
        match &failure.reason {
            FailureReason::Error { message } => {
                out.push_str(&format!("batch {}: failed: {message}\n", failure.batch_index))
            }
            FailureReason::Timeout { timeout_ms } => out.push_str(&format!(
                "batch {}: timed out after {timeout_ms}ms\n",
                failure.batch_index
            )),
        }
    }

    out.push_str(&format!(
        "{} files in {} batches: {} ok, {} failed items, {} failed batches, {} timed out ({}ms)\n",
        summary.files,
        summary.batches,
        summary.succeeded_items,
        summary.failed_items,
        summary.failed_batches,
        summary.timed_out_batches,
        summary.duration_ms
    ));
    out
}
