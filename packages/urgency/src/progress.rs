//! Progress reporting for batch rescoring.
//!
//! Rescoring the whole report set can take a while, so it reports progress
//! through [`ProgressCallback`]. The CLI renders it as an `indicatif` bar;
//! tests and library callers pass [`NullProgress`].

/// Receives progress updates from a long-running batch.
pub trait ProgressCallback: Send + Sync {
    /// Total units of work.
    fn set_total(&self, total: u64);

    /// Advance by `delta` units.
    fn inc(&self, delta: u64);

    /// Status text shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Batch finished.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
