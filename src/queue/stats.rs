//! Outcome counters for queued tasks.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts how submitted tasks ended.
///
/// Updated from many tokio tasks at once, so every counter is atomic.
#[derive(Debug, Default)]
pub struct QueueStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
}

impl QueueStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks that returned `Ok`.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Tasks that returned `Err`.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Tasks that panicked.
    #[must_use]
    pub fn panicked(&self) -> usize {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Every task that has finished, however it ended.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.panicked()
    }

    pub(super) fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn increment_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::SeqCst);
    }
}
