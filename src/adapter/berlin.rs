//! Staatsbibliothek zu Berlin adapter for `digital.staatsbibliothek-berlin.de`.
//!
//! The viewer URL carries `PPN=<id>`. The IIIF manifest lists one image per
//! page; each image id names a METS physical division, and the METS image
//! endpoint answers with the URL of that page's DZI descriptor. Pages are
//! rebuilt by the tile stitcher with `Origin`/`Referer` set to the viewer
//! host.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::manifest::Manifest;
use super::pipeline::{PageLoop, PageResolver, number_pages};
use super::utils::compile_static_regex;
use super::{Adapter, AdapterEnv, AdapterError, RunContext, RunSummary, SourceDescriptor};
use crate::download::{DownloadError, DownloadManager, HttpClient, PageResource, ResolvedPage};

const NAME: &str = "berlin";
const DEFAULT_CONTENT_BASE_URL: &str = "https://content.staatsbibliothek-berlin.de";

static PPN_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"PPN=([A-Za-z0-9_-]+)"));
static IMAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/dc/([A-Za-z0-9]+)-([A-Za-z0-9]+)/full"));

/// Adapter for the Berlin State Library digitized collections.
pub struct BerlinAdapter {
    manager: DownloadManager,
    content_base_url: String,
}

impl BerlinAdapter {
    /// Viewer host this adapter is registered under.
    pub const HOST: &'static str = "digital.staatsbibliothek-berlin.de";

    /// Creates the adapter against the production content server.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Client`] when HTTP client construction fails.
    pub fn new(env: &AdapterEnv) -> Result<Self, AdapterError> {
        Self::with_base_url(env, DEFAULT_CONTENT_BASE_URL)
    }

    /// Creates the adapter with a custom content server (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Client`] when HTTP client construction fails.
    pub fn with_base_url(
        env: &AdapterEnv,
        content_base_url: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let manager = env.manager().map_err(|e| AdapterError::client(NAME, e))?;
        Ok(Self {
            manager,
            content_base_url: content_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn manifest_url(&self, ppn: &str) -> String {
        format!("{}/dc/{ppn}/manifest", self.content_base_url)
    }

    fn mets_image_url(&self, ppn: &str, division: &str) -> String {
        format!(
            "{}/?action=metsImage&metsFile={}&divID=PHYS_{division}&dzi=true",
            self.content_base_url,
            urlencoding::encode(ppn)
        )
    }

    /// METS image endpoints for every recognizable page image.
    fn page_endpoints(&self, ppn: &str, manifest: &Manifest) -> Vec<String> {
        manifest
            .images()
            .filter_map(|image| {
                let division = IMAGE_ID_RE
                    .captures(&image.id)
                    .and_then(|caps| caps.get(2))
                    .map(|m| m.as_str());
                if division.is_none() {
                    warn!(image = %image.id, "image id has no METS division; skipped");
                }
                division.map(|division| self.mets_image_url(ppn, division))
            })
            .collect()
    }
}

impl std::fmt::Debug for BerlinAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BerlinAdapter")
            .field("content_base_url", &self.content_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Adapter for BerlinAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(adapter = NAME, url = %raw_url))]
    async fn run(&self, raw_url: &str, ctx: &RunContext) -> Result<RunSummary, AdapterError> {
        let ppn = PPN_RE
            .captures(raw_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| AdapterError::unrecognized(NAME, raw_url))?;
        let source = SourceDescriptor::new(raw_url, ppn);
        let book_dir = ctx.config.book_dir(&source.book_id);
        let mut summary = RunSummary::new(&source, book_dir.clone());

        let manifest_url = self.manifest_url(&source.book_id);
        let manifest: Manifest = self
            .manager
            .client()
            .get_json(&manifest_url, &ctx.cancel)
            .await
            .map_err(|e| AdapterError::manifest_fetch(&manifest_url, e))?;

        let endpoints = self.page_endpoints(&source.book_id, &manifest);
        let resolver = MetsDziResolver {
            client: self.manager.client(),
            origin_host: source.host.clone().unwrap_or_else(|| Self::HOST.to_string()),
        };

        PageLoop {
            manager: &self.manager,
            resolver: &resolver,
            config: &ctx.config,
            cancel: &ctx.cancel,
            page_rate: 1,
        }
        .run(
            number_pages(&ctx.config, endpoints),
            &book_dir,
            ctx.config.pages,
            &mut summary,
        )
        .await?;

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

/// Second round trip: the METS endpoint body is the DZI descriptor URL.
struct MetsDziResolver<'a> {
    client: &'a HttpClient,
    origin_host: String,
}

#[async_trait]
impl PageResolver for MetsDziResolver<'_> {
    async fn resolve_page(
        &self,
        page: &PageResource,
        cancel: &CancellationToken,
    ) -> Result<ResolvedPage, DownloadError> {
        let dzi_url = self.client.get_text(&page.resource_uri, cancel).await?;
        if !dzi_url.starts_with("http") {
            return Err(DownloadError::decode(
                &page.resource_uri,
                "METS endpoint did not return a descriptor URL",
            ));
        }
        Ok(ResolvedPage::deep_zoom(dzi_url).with_origin(&self.origin_host))
    }
}
