//! Per-page fetch and store.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::client::HttpClient;
use super::error::DownloadError;
use super::job::{DownloadJob, ResolvedPage, ResourceKind};
use super::tile::TileStitcher;

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Body written directly, with its size in bytes.
    Written(u64),
    /// Rebuilt from tiles by the stitcher.
    Stitched,
}

/// Turns a resolved page into a file on disk.
///
/// Plain images are streamed through the adapter's [`HttpClient`]; deep-zoom
/// descriptors are handed to the [`TileStitcher`].
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: HttpClient,
    stitcher: Arc<dyn TileStitcher>,
}

impl DownloadManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(client: HttpClient, stitcher: Arc<dyn TileStitcher>) -> Self {
        Self { client, stitcher }
    }

    /// The HTTP client used for plain images and manifest fetches.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Materializes `job` from `resolved`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for any page-level failure. Callers log it
    /// and move on to the next page.
    #[instrument(skip(self, job, resolved, cancel), fields(index = job.page.index, url = %resolved.uri))]
    pub async fn materialize(
        &self,
        job: &DownloadJob,
        resolved: &ResolvedPage,
        cancel: &CancellationToken,
    ) -> Result<PageOutcome, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::cancelled(&resolved.uri));
        }

        match resolved.kind {
            ResourceKind::Image => {
                let bytes = self
                    .client
                    .download_to_path(&resolved.uri, &job.dest, cancel)
                    .await?;
                Ok(PageOutcome::Written(bytes))
            }
            ResourceKind::DeepZoom => {
                debug!(dest = %job.dest.display(), "handing descriptor to tile stitcher");
                self.stitcher
                    .stitch(&resolved.uri, &job.dest, &resolved.tile_headers)
                    .await?;
                Ok(PageOutcome::Stitched)
            }
        }
    }
}
