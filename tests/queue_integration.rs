//! Integration tests for the concurrent queue.
//!
//! These tests verify the bounded-parallelism and failure-isolation
//! guarantees the batch runner relies on.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bookget_core::{ConcurrentQueue, QueueError};

/// Tracks how many tasks are inside their critical section at once.
#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

async fn panicking_task() -> Result<(), String> {
    panic!("adapter bug")
}

// ==================== Capacity ====================

#[tokio::test]
async fn test_capacity_is_never_exceeded_under_load() {
    let queue = Arc::new(ConcurrentQueue::new(4).expect("valid capacity"));
    let gauge = Arc::new(Gauge::default());
    let observed_peak = Arc::new(AtomicUsize::new(0));

    for n in 0..200u64 {
        let gauge = Arc::clone(&gauge);
        let queue_view = Arc::clone(&queue);
        let observed_peak = Arc::clone(&observed_peak);
        queue.submit(async move {
            gauge.enter();
            observed_peak.fetch_max(queue_view.current_count(), Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(n % 3)).await;
            gauge.leave();
            Ok::<(), String>(())
        });
    }
    queue.wait().await;

    assert!(gauge.peak.load(Ordering::SeqCst) <= 4);
    assert!(observed_peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(gauge.finished.load(Ordering::SeqCst), 200);
    assert_eq!(queue.stats().completed(), 200);
    assert_eq!(queue.current_count(), 0);
}

#[tokio::test]
async fn test_capacity_one_runs_tasks_one_at_a_time() {
    let queue = ConcurrentQueue::new(1).expect("valid capacity");
    let gauge = Arc::new(Gauge::default());

    for _ in 0..20 {
        let gauge = Arc::clone(&gauge);
        queue.submit(async move {
            gauge.enter();
            tokio::task::yield_now().await;
            gauge.leave();
            Ok::<(), String>(())
        });
    }
    queue.wait().await;

    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    assert_eq!(gauge.finished.load(Ordering::SeqCst), 20);
}

#[test]
fn test_zero_capacity_is_rejected() {
    assert_eq!(
        ConcurrentQueue::new(0).unwrap_err(),
        QueueError::InvalidCapacity(0)
    );
}

// ==================== Failure isolation ====================

#[tokio::test]
async fn test_panics_and_errors_do_not_block_wait() {
    let queue = ConcurrentQueue::new(2).expect("valid capacity");
    let ok = Arc::new(AtomicUsize::new(0));

    for n in 0..12 {
        match n % 3 {
            0 => queue.submit(panicking_task()),
            1 => queue.submit(async move { Err(format!("book {n} failed")) }),
            _ => {
                let ok = Arc::clone(&ok);
                queue.submit(async move {
                    ok.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                });
            }
        }
    }
    queue.wait().await;

    let stats = queue.stats();
    assert_eq!(stats.panicked(), 4);
    assert_eq!(stats.failed(), 4);
    assert_eq!(stats.completed(), 4);
    assert_eq!(stats.total(), 12);
    assert_eq!(ok.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_wait_covers_tasks_submitted_by_tasks() {
    let queue = Arc::new(ConcurrentQueue::new(2).expect("valid capacity"));
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let inner_queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        queue.submit(async move {
            let done_inner = Arc::clone(&done);
            inner_queue.submit(async move {
                done_inner.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
            done.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
    }
    queue.wait().await;

    assert_eq!(done.load(Ordering::SeqCst), 6);
    assert_eq!(queue.stats().completed(), 6);
}
