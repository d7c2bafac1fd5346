//! Run modes on top of the router: one URL, a batch file, or URLs typed
//! on stdin.
//!
//! [`App`] owns the [`Router`] and the process-wide cancellation token.
//! Batch and interactive runs go through a [`ConcurrentQueue`] so one
//! failing or panicking book never stops the others.

mod input;

pub use input::{load_url_file, parse_url_list};

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterEnv, AdapterError, RunContext, RunSummary, Router, source_key_for};
use crate::auth::AuthError;
use crate::config::Config;
use crate::queue::{ConcurrentQueue, QueueError};

/// Final counts of a queued run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// URLs submitted.
    pub submitted: usize,
    /// Books that finished without a book-level error.
    pub completed: usize,
    /// Books that returned an error.
    pub failed: usize,
    /// Books whose task panicked.
    pub panicked: usize,
}

impl BatchReport {
    /// Returns true when every submitted book completed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.panicked == 0
    }
}

/// Dispatches source URLs to adapters.
#[derive(Debug)]
pub struct App {
    config: Arc<Config>,
    router: Router,
    cancel: CancellationToken,
}

impl App {
    /// Builds the default router from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the cookie or header file cannot be read.
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Result<Self, AuthError> {
        let env = AdapterEnv::from_config(Arc::clone(&config))?;
        let router = Router::with_defaults(env, cancel.clone());
        Ok(Self::with_router(config, router, cancel))
    }

    /// Uses an already built router.
    #[must_use]
    pub fn with_router(config: Arc<Config>, router: Router, cancel: CancellationToken) -> Self {
        Self {
            config,
            router,
            cancel,
        }
    }

    /// Read-only runtime configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves and runs the adapter for a single URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedSource`] when no adapter accepts
    /// the URL, or whatever book-level error the adapter reports.
    pub async fn process_url(&self, raw_url: &str) -> Result<RunSummary, AdapterError> {
        let raw_url = raw_url.trim();
        let source_key = source_key_for(raw_url).unwrap_or_default();
        let adapter = self.router.resolve(&source_key, raw_url).await?;
        info!(adapter = adapter.name(), url = raw_url, "download started");

        let ctx = RunContext::new(Arc::clone(&self.config), self.cancel.clone());
        let summary = adapter.run(raw_url, &ctx).await?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Runs every URL through a queue sized by `threads`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] when `threads` is zero.
    pub async fn run_batch(
        self: &Arc<Self>,
        urls: impl IntoIterator<Item = String>,
    ) -> Result<BatchReport, QueueError> {
        let queue = ConcurrentQueue::new(self.config.threads)?;
        let mut submitted = 0;
        for url in urls {
            if self.cancel.is_cancelled() {
                warn!(submitted, "cancelled; remaining URLs not submitted");
                break;
            }
            self.submit(&queue, url);
            submitted += 1;
        }
        queue.wait().await;
        Ok(report(&queue, submitted))
    }

    /// Reads URLs line by line from `reader` until EOF or cancellation.
    ///
    /// Each URL starts as soon as it is read, up to `max_concurrent` books
    /// at a time; blank lines and lines not starting with `http` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] when `max_concurrent` is zero.
    pub async fn run_interactive<R>(self: &Arc<Self>, reader: R) -> Result<BatchReport, QueueError>
    where
        R: AsyncBufRead + Unpin,
    {
        let queue = ConcurrentQueue::new(self.config.max_concurrent)?;
        let mut lines = reader.lines();
        let mut submitted = 0;

        loop {
            let line = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    let url = line.trim();
                    if !url.starts_with("http") {
                        if !url.is_empty() {
                            debug!(line = url, "not a URL; ignored");
                        }
                        continue;
                    }
                    self.submit(&queue, url.to_string());
                    submitted += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed; no further URLs accepted");
                    break;
                }
            }
        }

        queue.wait().await;
        Ok(report(&queue, submitted))
    }

    fn submit(self: &Arc<Self>, queue: &ConcurrentQueue, url: String) {
        let app = Arc::clone(self);
        queue.submit(async move {
            app.process_url(&url).await.map(|_| ()).map_err(|e| {
                warn!(url = %url, error = %e, "book failed");
                e
            })
        });
    }
}

fn report(queue: &ConcurrentQueue, submitted: usize) -> BatchReport {
    let stats = queue.stats();
    BatchReport {
        submitted,
        completed: stats.completed(),
        failed: stats.failed(),
        panicked: stats.panicked(),
    }
}

fn log_summary(summary: &RunSummary) {
    if summary.cancelled {
        warn!(
            book_id = %summary.book_id,
            downloaded = summary.downloaded,
            "download cancelled"
        );
        return;
    }
    info!(
        book_id = %summary.book_id,
        total = summary.total,
        downloaded = summary.downloaded,
        skipped = summary.skipped_existing,
        filtered = summary.filtered_out,
        failed = summary.failed,
        dir = %summary.directory.display(),
        "download complete"
    );
}
