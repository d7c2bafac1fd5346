//! Page materialization: HTTP fetch, streaming to disk, and tile stitching.
//!
//! Adapters build a [`DownloadJob`] for every page that survives range
//! filtering and is not already on disk, resolve it to a [`ResolvedPage`],
//! and hand both to the [`DownloadManager`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bookget_core::download::{
//!     DezoomifyCommand, DownloadJob, DownloadManager, HttpClient, PageResource, ResolvedPage,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DownloadManager::new(
//!     HttpClient::plain()?,
//!     Arc::new(DezoomifyCommand::new("dezoomify-rs", 3)),
//! );
//! let page = PageResource::new(0, "https://example.com/p1.jpg", "0001.jpg");
//! let job = DownloadJob::new(page, std::path::Path::new("./downloads/book"));
//! let resolved = ResolvedPage::image("https://example.com/p1.jpg");
//! manager.materialize(&job, &resolved, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod job;
mod manager;
mod tile;

pub use client::{HttpClient, partial_path};
pub use error::DownloadError;
pub use job::{DownloadJob, PageResource, ResolvedPage, ResourceKind};
pub use manager::{DownloadManager, PageOutcome};
pub use tile::{DezoomifyCommand, TileStitcher, stitch_path};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
