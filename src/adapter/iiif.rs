//! Generic IIIF Presentation adapter for manifests and collections.
//!
//! A manifest becomes one page per image annotation of its first sequence.
//! A collection becomes one volume per member manifest, written under
//! `<book>/vol_<NNN>/` and selected by the volume range.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::manifest::Manifest;
use super::pipeline::{PageLoop, PageResolver, number_pages};
use super::utils::iiif_book_id;
use super::{Adapter, AdapterEnv, AdapterError, RunContext, RunSummary, SourceDescriptor};
use crate::download::{DownloadError, DownloadManager, PageResource, ResolvedPage};

const NAME: &str = "iiif";

/// Downloads any IIIF Presentation 2.x/3.x manifest or collection.
#[derive(Debug)]
pub struct IiifAdapter {
    manager: DownloadManager,
}

impl IiifAdapter {
    /// Creates the adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Client`] when HTTP client construction fails.
    pub fn new(env: &AdapterEnv) -> Result<Self, AdapterError> {
        let manager = env.manager().map_err(|e| AdapterError::client(NAME, e))?;
        Ok(Self { manager })
    }

    async fn fetch_manifest(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Manifest, AdapterError> {
        self.manager
            .client()
            .get_json(url, cancel)
            .await
            .map_err(|e| AdapterError::manifest_fetch(url, e))
    }

    async fn download_manifest(
        &self,
        manifest: &Manifest,
        dir: &Path,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), AdapterError> {
        let config = &ctx.config;
        let mut direct = HashSet::new();
        let uris: Vec<String> = manifest
            .images()
            .enumerate()
            .map(|(index, image)| {
                image.service_endpoint().unwrap_or_else(|| {
                    direct.insert(index);
                    image.id.clone()
                })
            })
            .collect();

        let resolver = ImageServiceResolver {
            use_dzi: config.use_dzi,
            format: config.format.trim_start_matches('/').to_string(),
            direct,
        };

        PageLoop {
            manager: &self.manager,
            resolver: &resolver,
            config,
            cancel: &ctx.cancel,
            page_rate: config.page_rate,
        }
        .run(number_pages(config, uris), dir, config.pages, summary)
        .await
    }

    async fn download_collection(
        &self,
        collection: &Manifest,
        book_dir: &Path,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<(), AdapterError> {
        let volumes = &collection.manifests;
        let count = volumes.len();

        for (vol_index, volume) in volumes.iter().enumerate() {
            if !ctx.config.volumes.contains(vol_index, count) {
                debug!(volume = vol_index + 1, "volume out of range");
                continue;
            }
            if ctx.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            info!(volume = vol_index + 1, count, url = %volume.id, "fetching volume");
            let manifest = match self.fetch_manifest(&volume.id, &ctx.cancel).await {
                Ok(manifest) => manifest,
                Err(e) if e.is_cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(volume = vol_index + 1, error = %e, "volume skipped");
                    continue;
                }
            };

            let dir = book_dir.join(format!("vol_{:03}", vol_index + 1));
            self.download_manifest(&manifest, &dir, ctx, summary).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for IiifAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(adapter = NAME, url = %raw_url))]
    async fn run(&self, raw_url: &str, ctx: &RunContext) -> Result<RunSummary, AdapterError> {
        let book_id = iiif_book_id(raw_url).ok_or_else(|| AdapterError::unrecognized(NAME, raw_url))?;
        let source = SourceDescriptor::new(raw_url, book_id);
        let book_dir = ctx.config.book_dir(&source.book_id);
        let mut summary = RunSummary::new(&source, book_dir.clone());

        let manifest = self.fetch_manifest(raw_url, &ctx.cancel).await?;
        if manifest.is_collection() {
            self.download_collection(&manifest, &book_dir, ctx, &mut summary)
                .await?;
        } else {
            self.download_manifest(&manifest, &book_dir, ctx, &mut summary)
                .await?;
        }

        info!(
            book_id = %summary.book_id,
            downloaded = summary.downloaded,
            skipped = summary.skipped_existing,
            failed = summary.failed,
            "book finished"
        );
        Ok(summary)
    }
}

/// Maps an image-service endpoint to a deep-zoom `info.json` or a full image.
#[derive(Debug)]
struct ImageServiceResolver {
    use_dzi: bool,
    format: String,
    /// Pages with no image service; their URI is the image itself.
    direct: HashSet<usize>,
}

#[async_trait]
impl PageResolver for ImageServiceResolver {
    async fn resolve_page(
        &self,
        page: &PageResource,
        _cancel: &CancellationToken,
    ) -> Result<ResolvedPage, DownloadError> {
        let endpoint = &page.resource_uri;
        Ok(if self.direct.contains(&page.index) {
            ResolvedPage::image(endpoint)
        } else if self.use_dzi {
            ResolvedPage::deep_zoom(format!("{endpoint}/info.json"))
        } else {
            ResolvedPage::image(format!("{endpoint}/{}", self.format))
        })
    }
}
