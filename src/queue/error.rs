//! Error types for the bounded executor.

use thiserror::Error;

/// Errors raised by [`ConcurrentQueue`](super::ConcurrentQueue).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Capacity must be a positive number of slots.
    #[error("invalid queue capacity {0}: must be at least 1 and within the semaphore limit")]
    InvalidCapacity(usize),
}
