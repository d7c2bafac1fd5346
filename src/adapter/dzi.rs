//! Deep-zoom adapter for `.../<id>/tiles/infos.json` descriptors.
//!
//! The descriptor is one page; the tile stitcher rebuilds it into `0001`.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::pipeline::{PageLoop, PassThrough, number_pages};
use super::utils::tile_book_id;
use super::{Adapter, AdapterEnv, AdapterError, RunContext, RunSummary, SourceDescriptor};
use crate::download::{DownloadManager, ResourceKind};

const NAME: &str = "dzi";

/// Adapter for single deep-zoom tile descriptors.
#[derive(Debug)]
pub struct DziAdapter {
    manager: DownloadManager,
}

impl DziAdapter {
    /// Creates the adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Client`] when HTTP client construction fails.
    pub fn new(env: &AdapterEnv) -> Result<Self, AdapterError> {
        let manager = env.manager().map_err(|e| AdapterError::client(NAME, e))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Adapter for DziAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(adapter = NAME, url = %raw_url))]
    async fn run(&self, raw_url: &str, ctx: &RunContext) -> Result<RunSummary, AdapterError> {
        let book_id = tile_book_id(raw_url).ok_or_else(|| AdapterError::unrecognized(NAME, raw_url))?;
        let source = SourceDescriptor::new(raw_url, book_id);
        let book_dir = ctx.config.book_dir(&source.book_id);
        let mut summary = RunSummary::new(&source, book_dir.clone());

        PageLoop {
            manager: &self.manager,
            resolver: &PassThrough(ResourceKind::DeepZoom),
            config: &ctx.config,
            cancel: &ctx.cancel,
            page_rate: 1,
        }
        .run(
            number_pages(&ctx.config, [raw_url.trim().to_string()]),
            &book_dir,
            ctx.config.pages,
            &mut summary,
        )
        .await?;

        info!(book_id = %summary.book_id, downloaded = summary.downloaded, "book finished");
        Ok(summary)
    }
}
