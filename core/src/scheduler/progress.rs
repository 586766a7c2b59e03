use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use super::traits::{ProgressFactory, ProgressOptions, ProgressTracker};

const DEFAULT_TEMPLATE: &str = "Processing [{bar:40.cyan/blue}] {percent}% ({pos}/{len})";

/// Terminal progress bar for batch completion.
///
/// Renders nothing when stdout is not a terminal or when running under CI;
/// counting still happens so callers can read `completed()` either way.
pub struct ProgressHandler {
    bar: ProgressBar,
    completed: usize,
    enabled: bool,
}

impl ProgressHandler {
    pub fn new(options: &ProgressOptions) -> Self {
        Self::with_enabled(options, should_render())
    }

    /// Create a handler with rendering forced on or off.
    pub fn with_enabled(options: &ProgressOptions, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                completed: 0,
                enabled: false,
            };
        }

        let bar = ProgressBar::new(options.total as u64);
        bar.set_style(build_style(options.format.as_deref()));

        Self {
            bar,
            completed: 0,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl ProgressTracker for ProgressHandler {
    fn start(&mut self, total: usize) {
        self.completed = 0;
        if self.enabled {
            self.bar.set_length(total as u64);
            self.bar.set_position(0);
        }
    }

    fn increment(&mut self) {
        self.completed += 1;
        if self.enabled {
            self.bar.set_position(self.completed as u64);
        }
    }

    fn update(&mut self, value: usize) {
        self.completed = value;
        if self.enabled {
            self.bar.set_position(value as u64);
        }
    }

    fn stop(&mut self) {
        if self.enabled && !self.bar.is_finished() {
            self.bar.finish();
        }
    }

    fn completed(&self) -> usize {
        self.completed
    }
}

/// Counting-only tracker for non-interactive output.
#[derive(Debug, Default)]
pub struct NoopProgress {
    completed: usize,
}

impl NoopProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for NoopProgress {
    fn start(&mut self, _total: usize) {
        self.completed = 0;
    }

    fn increment(&mut self) {
        self.completed += 1;
    }

    fn update(&mut self, value: usize) {
        self.completed = value;
    }

    fn stop(&mut self) {}

    fn completed(&self) -> usize {
        self.completed
    }
}

/// Factory producing a `ProgressHandler` per run.
pub fn terminal_progress() -> ProgressFactory {
    Arc::new(|options: &ProgressOptions| {
        Box::new(ProgressHandler::new(options)) as Box<dyn ProgressTracker>
    })
}

/// Factory producing a `NoopProgress` per run.
pub fn silent_progress() -> ProgressFactory {
    Arc::new(|_: &ProgressOptions| Box::new(NoopProgress::new()) as Box<dyn ProgressTracker>)
}

/// Whether a bar should be drawn for this process.
pub fn should_render() -> bool {
    atty::is(atty::Stream::Stdout) && !is_ci()
}

fn is_ci() -> bool {
    std::env::var("CI")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn build_style(format: Option<&str>) -> ProgressStyle {
    let template = format.unwrap_or(DEFAULT_TEMPLATE);
    match ProgressStyle::with_template(template) {
        Ok(style) => style.progress_chars("█░"),
        Err(e) => {
            tracing::debug!(template, error = %e, "invalid progress template, using default");
            ProgressStyle::default_bar().progress_chars("█░")
        }
    }
}
