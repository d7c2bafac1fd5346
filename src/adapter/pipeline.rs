//! Page loop shared by every adapter.
//!
//! Given the ordered page list of one book (or one volume), the loop applies
//! the page filter, skips pages already on disk, resolves and materializes
//! the rest, and finally writes the `urls.txt` sidecar.

use std::path::Path;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AdapterError, RunSummary};
use crate::config::Config;
use crate::download::{
    DownloadError, DownloadJob, DownloadManager, PageResource, ResolvedPage, ResourceKind,
};
use crate::range::RangeSpec;
use crate::sidecar;

/// Turns a manifest page into the URI that is actually fetched.
#[async_trait]
pub(crate) trait PageResolver: Send + Sync {
    async fn resolve_page(
        &self,
        page: &PageResource,
        cancel: &CancellationToken,
    ) -> Result<ResolvedPage, DownloadError>;
}

/// Resolver for pages whose resource URI is already final.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassThrough(pub ResourceKind);

#[async_trait]
impl PageResolver for PassThrough {
    async fn resolve_page(
        &self,
        page: &PageResource,
        _cancel: &CancellationToken,
    ) -> Result<ResolvedPage, DownloadError> {
        Ok(match self.0 {
            ResourceKind::Image => ResolvedPage::image(&page.resource_uri),
            ResourceKind::DeepZoom => ResolvedPage::deep_zoom(&page.resource_uri),
        })
    }
}

/// Builds the ordered page list from resource URIs, numbering from 0.
pub(crate) fn number_pages<I>(config: &Config, uris: I) -> Vec<PageResource>
where
    I: IntoIterator<Item = String>,
{
    uris.into_iter()
        .enumerate()
        .map(|(index, uri)| PageResource::new(index, uri, config.page_filename(index)))
        .collect()
}

struct PageReport {
    index: usize,
    uri: Option<String>,
    result: Result<(), DownloadError>,
}

/// Drives the pages of one book or volume.
pub(crate) struct PageLoop<'a> {
    pub manager: &'a DownloadManager,
    pub resolver: &'a dyn PageResolver,
    pub config: &'a Config,
    pub cancel: &'a CancellationToken,
    /// Pages fetched concurrently; 1 means strictly sequential.
    pub page_rate: usize,
}

impl PageLoop<'_> {
    /// Processes `pages` into `dir`, folding counts into `summary`.
    ///
    /// Page-level failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Sidecar`] when `urls.txt` cannot be written.
    pub async fn run(
        &self,
        pages: Vec<PageResource>,
        dir: &Path,
        page_filter: RangeSpec,
        summary: &mut RunSummary,
    ) -> Result<(), AdapterError> {
        let total = pages.len();
        summary.total += total;

        if total == 0 {
            info!(dir = %dir.display(), "manifest lists no pages");
            return Ok(());
        }

        let mut jobs = Vec::with_capacity(total);
        for page in pages {
            if !page_filter.contains(page.index, total) {
                summary.filtered_out += 1;
                continue;
            }
            let job = DownloadJob::new(page, dir);
            if job.is_done() {
                debug!(index = job.page.index, path = %job.dest.display(), "already downloaded");
                summary.skipped_existing += 1;
                continue;
            }
            jobs.push(job);
        }

        let mut reports = if self.page_rate <= 1 {
            self.run_sequential(jobs, total).await
        } else {
            stream::iter(jobs)
                .map(|job| self.process(job, total))
                .buffer_unordered(self.page_rate)
                .collect::<Vec<_>>()
                .await
        };
        reports.sort_by_key(|report| report.index);

        let mut uris = Vec::with_capacity(reports.len());
        for report in reports {
            if let Some(uri) = report.uri {
                uris.push(uri);
            }
            match report.result {
                Ok(()) => summary.downloaded += 1,
                Err(e) if e.is_cancelled() => summary.cancelled = true,
                Err(e) => {
                    warn!(index = report.index, error = %e, "page failed");
                    summary.failed += 1;
                }
            }
        }
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
        }

        sidecar::write_url_list(dir, &uris)?;
        Ok(())
    }

    async fn run_sequential(&self, jobs: Vec<DownloadJob>, total: usize) -> Vec<PageReport> {
        let mut reports = Vec::with_capacity(jobs.len());
        for (n, job) in jobs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            if n > 0 && !self.config.sleep.is_zero() {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = tokio::time::sleep(self.config.sleep) => {}
                }
            }
            reports.push(self.process(job, total).await);
        }
        reports
    }

    async fn process(&self, job: DownloadJob, total: usize) -> PageReport {
        let index = job.page.index;
        if self.cancel.is_cancelled() {
            return PageReport {
                index,
                uri: None,
                result: Err(DownloadError::cancelled(&job.page.resource_uri)),
            };
        }

        let resolved = match self.resolver.resolve_page(&job.page, self.cancel).await {
            Ok(resolved) => resolved,
            Err(e) => {
                return PageReport {
                    index,
                    uri: None,
                    result: Err(e),
                };
            }
        };

        info!(page = index + 1, total, url = %resolved.uri, "fetching page");
        let result = self
            .manager
            .materialize(&job, &resolved, self.cancel)
            .await
            .map(|_| ());

        PageReport {
            index,
            uri: Some(resolved.uri),
            result,
        }
    }
}
