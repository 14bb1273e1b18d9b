//! Progress reporting for analysis runs.
//!
//! [`ProgressCallback`] decouples the pipeline from how progress is shown
//! (terminal progress bars, channel messages to a front end, or nothing).

use std::sync::Arc;

/// Receives progress updates from a running analysis.
///
/// `current` never decreases within a run. Implementations must be
/// `Send + Sync` so a run can be moved onto a spawned tokio task.
pub trait ProgressCallback: Send + Sync {
    /// Reports `current` out of `total` units of work, with a phase label.
    fn report(&self, current: u64, total: u64, message: &str);
}

impl<F> ProgressCallback for F
where
    F: Fn(u64, u64, &str) + Send + Sync,
{
    fn report(&self, current: u64, total: u64, message: &str) {
        self(current, total, message);
    }
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn report(&self, _current: u64, _total: u64, _message: &str) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
