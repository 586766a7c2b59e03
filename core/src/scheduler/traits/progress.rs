use std::sync::Arc;

/// Construction parameters for a progress tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressOptions {
    pub total: usize,
    /// indicatif template; the tracker falls back to its default when unset or invalid.
    pub format: Option<String>,
}

/// Counts finished batches and optionally renders feedback.
///
/// The scheduler calls `start` once, `increment` once per finished task and
/// `stop` once on every exit path.
pub trait ProgressTracker: Send {
    fn start(&mut self, total: usize);
    fn increment(&mut self);
    fn update(&mut self, value: usize);
    fn stop(&mut self);
    fn completed(&self) -> usize;
}

/// Builds a fresh tracker for each run.
pub type ProgressFactory = Arc<dyn Fn(&ProgressOptions) -> Box<dyn ProgressTracker> + Send + Sync>;
