//! Bounded-parallelism executor for book-level jobs.
//!
//! [`ConcurrentQueue`] runs every submitted future on its own tokio task,
//! but at most `capacity` of them hold a slot at once. A task that fails or
//! panics is logged and counted in [`QueueStats`]; it never reaches the
//! caller or its siblings.
//!
//! # Example
//!
//! ```no_run
//! use bookget_core::queue::ConcurrentQueue;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = ConcurrentQueue::new(4)?;
//! for n in 0..10 {
//!     queue.submit(async move {
//!         if n == 7 {
//!             return Err(format!("book {n} failed"));
//!         }
//!         Ok(())
//!     });
//! }
//! queue.wait().await;
//! println!("failed: {}", queue.stats().failed());
//! # Ok(())
//! # }
//! ```

mod error;
mod stats;

pub use error::QueueError;
pub use stats::QueueStats;

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Counting-semaphore-bounded executor.
///
/// # Concurrency Model
///
/// - `submit` never blocks; the spawned task waits for a slot itself
/// - A semaphore permit is held for the whole run of a task (RAII)
/// - An outstanding-task counter rises in `submit` and falls when a task
///   ends; `wait` returns once it reaches zero, for any number of waiters
/// - Tasks submitted from inside a running task are waited for too
/// - No ordering guarantee among tasks
#[derive(Debug)]
pub struct ConcurrentQueue {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    tasks: Mutex<JoinSet<()>>,
    pending: Arc<watch::Sender<usize>>,
    stats: Arc<QueueStats>,
}

impl ConcurrentQueue {
    /// Creates a queue with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] for zero or for a value the
    /// semaphore cannot represent.
    #[instrument(level = "debug")]
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(QueueError::InvalidCapacity(capacity));
        }

        debug!(capacity, "creating concurrent queue");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            tasks: Mutex::new(JoinSet::new()),
            pending: Arc::new(watch::channel(0).0),
            stats: Arc::new(QueueStats::new()),
        })
    }

    /// Maximum number of tasks running at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently holding a slot.
    #[must_use]
    pub fn current_count(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Outcome counters for every task finished so far.
    #[must_use]
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Schedules `task` and returns immediately.
    ///
    /// The task starts once a slot frees. Must be called from within a tokio
    /// runtime.
    pub fn submit<F, E>(&self, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let stats = Arc::clone(&self.stats);
        self.spawn(async move {
            let Ok(permit) = semaphore.acquire_owned().await else {
                warn!("queue semaphore closed; task dropped");
                stats.increment_failed();
                return;
            };
            run_guarded(permit, task, &stats).await;
        });
    }

    /// Schedules `task` only if a slot is free right now.
    ///
    /// Returns `false` without running `task` when every slot is taken.
    pub fn try_submit<F, E>(&self, task: F) -> bool
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            debug!(capacity = self.capacity, "queue full; task rejected");
            return false;
        };
        let stats = Arc::clone(&self.stats);
        self.spawn(async move {
            run_guarded(permit, task, &stats).await;
        });
        true
    }

    /// Number of submitted tasks that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Waits until every submitted task has finished, however it ended.
    ///
    /// Any number of callers may wait at once; each returns only when the
    /// queue is idle.
    pub async fn wait(&self) {
        let mut idle = self.pending.subscribe();
        if idle.wait_for(|pending| *pending == 0).await.is_err() {
            warn!("queue counter closed while waiting");
        }
        self.reap();

        info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            panicked = self.stats.panicked(),
            "queue drained"
        );
    }

    fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.pending.send_modify(|pending| *pending += 1);
        let guard = PendingGuard(Arc::clone(&self.pending));
        self.reap();
        self.lock_tasks().spawn(async move {
            let _guard = guard;
            fut.await;
        });
    }

    /// Collects handles of tasks that already ended.
    fn reap(&self) {
        let mut tasks = self.lock_tasks();
        while let Some(joined) = tasks.try_join_next() {
            // Panics are caught inside the task; this only sees aborts.
            if let Err(e) = joined {
                warn!(error = %e, "queue task aborted");
                self.stats.increment_panicked();
            }
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks one task as finished when dropped, even if the task was aborted.
struct PendingGuard(Arc<watch::Sender<usize>>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|pending| *pending = pending.saturating_sub(1));
    }
}

/// Runs one task while holding `permit`, recording how it ended.
async fn run_guarded<F, E>(permit: OwnedSemaphorePermit, task: F, stats: &QueueStats)
where
    F: Future<Output = Result<(), E>> + Send,
    E: Display,
{
    // Permit is dropped when this function returns (RAII)
    let _permit = permit;

    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(Ok(())) => stats.increment_completed(),
        Ok(Err(e)) => {
            warn!(error = %e, "queue task failed");
            stats.increment_failed();
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(panic = %message, "queue task panicked");
            stats.increment_panicked();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    async fn explode() -> Result<(), String> {
        panic!("task exploded")
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            ConcurrentQueue::new(0).unwrap_err(),
            QueueError::InvalidCapacity(0)
        );
    }

    #[tokio::test]
    async fn test_wait_on_empty_queue_returns() {
        let queue = ConcurrentQueue::new(2).unwrap();
        queue.wait().await;
        assert_eq!(queue.stats().total(), 0);
    }

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let queue = ConcurrentQueue::new(2).unwrap();
        queue.submit(async { Ok::<(), String>(()) });
        queue.submit(async { Err::<(), _>("boom".to_string()) });
        queue.submit(explode());
        queue.wait().await;

        assert_eq!(queue.stats().completed(), 1);
        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(queue.stats().panicked(), 1);
        assert_eq!(queue.current_count(), 0);
    }

    #[tokio::test]
    async fn test_try_submit_rejects_when_full() {
        let queue = ConcurrentQueue::new(1).unwrap();
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        assert!(queue.try_submit(async move {
            gate.notified().await;
            Ok::<(), String>(())
        }));
        assert_eq!(queue.current_count(), 1);

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        assert!(!queue.try_submit(async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        }));

        release.notify_one();
        queue.wait().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.stats().completed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_occupancy_never_exceeds_capacity() {
        let queue = Arc::new(ConcurrentQueue::new(3).unwrap());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            queue.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
            assert!(queue.current_count() <= 3);
        }

        queue.wait().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(queue.stats().completed(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_waiter_blocks_until_idle() {
        let queue = Arc::new(ConcurrentQueue::new(2).unwrap());
        let finished = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&finished);
        queue.submit(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        assert_eq!(queue.pending(), 1);

        let first = {
            let queue = Arc::clone(&queue);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                queue.wait().await;
                finished.load(Ordering::SeqCst)
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        queue.wait().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(queue.pending(), 0);
    }
}
