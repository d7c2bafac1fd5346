//! Site adapters and the router that dispatches source URLs to them.
//!
//! Each digital-library backend is handled by an [`Adapter`]: given a raw
//! URL it derives a book id, fetches the manifest, filters the page list,
//! and materializes every surviving page through a
//! [`DownloadManager`](crate::download::DownloadManager).
//!
//! # Architecture
//!
//! - [`Adapter`] - Async trait that individual site strategies implement
//! - [`AdapterRegistry`] - Source key to adapter table
//! - [`Router`] - Builds the registry once and applies the override rules
//! - [`IiifAdapter`] - Generic IIIF Presentation manifests and collections
//! - [`BerlinAdapter`] - Staatsbibliothek zu Berlin digitized collections
//! - [`DziAdapter`] - Single deep-zoom `tiles/infos.json` descriptors
//! - [`GenericAdapter`] - Plain URLs and numeric URL templates
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bookget_core::adapter::{AdapterEnv, RunContext, Router};
//! use bookget_core::Config;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::default());
//! let cancel = CancellationToken::new();
//! let env = AdapterEnv::from_config(Arc::clone(&config))?;
//! let router = Router::with_defaults(env, cancel.clone());
//!
//! let url = "https://iiif.example/book/manifest.json";
//! let adapter = router.resolve("iiif.example", url).await?;
//! let summary = adapter.run(url, &RunContext::new(config, cancel)).await?;
//! println!("{} pages written", summary.downloaded);
//! # Ok(())
//! # }
//! ```

mod berlin;
mod dzi;
mod error;
mod generic;
mod iiif;
mod manifest;
mod pipeline;
mod registry;
mod utils;

pub use berlin::BerlinAdapter;
pub use dzi::DziAdapter;
pub use error::AdapterError;
pub use generic::GenericAdapter;
pub use iiif::IiifAdapter;
pub use manifest::Manifest;
pub use registry::{
    AdapterRegistry, ContentClass, ContentProbe, DZI_KEY, GENERIC_KEY, HttpContentProbe,
    IIIF_KEY, Router, build_default_registry, classify_content_type, select_source_key,
};
pub use utils::source_key_for;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, CookieHeaderStore, RequestDecorator};
use crate::config::Config;
use crate::download::{DezoomifyCommand, DownloadError, DownloadManager, HttpClient, TileStitcher};

/// Everything an adapter needs at construction time.
///
/// Every call to [`manager`](Self::manager) builds a fresh HTTP client, so
/// each adapter instance gets its own cookie jar.
#[derive(Debug, Clone)]
pub struct AdapterEnv {
    /// Read-only runtime configuration.
    pub config: Arc<Config>,
    /// Cookie and header injection.
    pub decorator: Arc<dyn RequestDecorator>,
    /// Deep-zoom reassembly.
    pub stitcher: Arc<dyn TileStitcher>,
}

impl AdapterEnv {
    /// Creates an environment from explicit parts.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        decorator: Arc<dyn RequestDecorator>,
        stitcher: Arc<dyn TileStitcher>,
    ) -> Self {
        Self {
            config,
            decorator,
            stitcher,
        }
    }

    /// Loads the cookie and header files named by `config` and uses the
    /// configured tile program.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when an existing cookie or header file cannot
    /// be read.
    pub fn from_config(config: Arc<Config>) -> Result<Self, AuthError> {
        let store = CookieHeaderStore::load(
            config.cookie_file.as_deref(),
            config.header_file.as_deref(),
        )?;
        let stitcher = DezoomifyCommand::new(config.tile_program.clone(), config.retries);
        Ok(Self::new(config, Arc::new(store), Arc::new(stitcher)))
    }

    /// Builds a download manager with its own client and cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the settings.
    pub fn manager(&self) -> Result<DownloadManager, DownloadError> {
        let client = HttpClient::new(&self.config, Arc::clone(&self.decorator))?;
        Ok(DownloadManager::new(client, Arc::clone(&self.stitcher)))
    }
}

/// Per-run inputs shared by every adapter invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Read-only runtime configuration.
    pub config: Arc<Config>,
    /// Cooperative cancellation for the whole process.
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Creates a run context.
    #[must_use]
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }
}

/// The source of one run, with its book id already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// URL as given by the user.
    pub raw_url: String,
    /// Host of `raw_url`, when it has one.
    pub host: Option<String>,
    /// Stable per-work id; also the output directory name.
    pub book_id: String,
}

impl SourceDescriptor {
    /// Builds a descriptor, parsing the host from `raw_url`.
    #[must_use]
    pub fn new(raw_url: impl Into<String>, book_id: impl Into<String>) -> Self {
        let raw_url = raw_url.into();
        Self {
            host: utils::host_of(&raw_url),
            raw_url,
            book_id: book_id.into(),
        }
    }
}

/// Outcome counts for one adapter run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Book id the run wrote under.
    pub book_id: String,
    /// Pages listed by the manifest(s), before filtering.
    pub total: usize,
    /// Pages written or stitched in this run.
    pub downloaded: usize,
    /// Pages skipped because their file already existed.
    pub skipped_existing: usize,
    /// Pages or volumes' pages excluded by the range filters.
    pub filtered_out: usize,
    /// Pages that failed to resolve or download.
    pub failed: usize,
    /// Set when the run stopped early on cancellation.
    pub cancelled: bool,
    /// Book directory.
    pub directory: PathBuf,
}

impl RunSummary {
    /// Empty summary for `source`.
    #[must_use]
    pub fn new(source: &SourceDescriptor, directory: PathBuf) -> Self {
        Self {
            book_id: source.book_id.clone(),
            directory,
            ..Self::default()
        }
    }
}

/// A site-specific download strategy.
///
/// # Object Safety
///
/// This trait uses `async_trait` so adapters can live behind
/// `Arc<dyn Adapter>` in the registry.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter's name (e.g., "iiif", "berlin").
    fn name(&self) -> &'static str;

    /// Downloads the work at `raw_url`.
    ///
    /// Page-level failures are counted in the summary; only manifest-level
    /// failures are returned as errors.
    async fn run(&self, raw_url: &str, ctx: &RunContext) -> Result<RunSummary, AdapterError>;
}
