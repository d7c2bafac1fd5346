//! bookget Core Library
//!
//! Downloads digitized books from digital-library backends. A source URL is
//! routed to a site adapter, which fetches the work's manifest, filters its
//! pages and volumes, and writes each page to `<root>/<book id>/NNNN.ext`.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`adapter`] - Site adapters and the router that selects them
//! - [`app`] - Single, batch and interactive run modes
//! - [`auth`] - Cookie and custom header injection
//! - [`config`] - Runtime configuration and the TOML config file
//! - [`download`] - HTTP client, page materialization and tile stitching
//! - [`queue`] - Bounded concurrent task queue
//! - [`range`] - Page and volume range filters
//! - [`sidecar`] - `urls.txt` written next to each book

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod app;
pub mod auth;
pub mod config;
pub mod download;
pub mod queue;
pub mod range;
pub mod sidecar;
pub(crate) mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use adapter::{Adapter, AdapterError, Router, RunContext, RunSummary};
pub use app::{App, BatchReport};
pub use auth::{CookieHeaderStore, RequestDecorator};
pub use config::{Config, DownloaderMode};
pub use download::{DownloadError, DownloadManager, HttpClient};
pub use queue::{ConcurrentQueue, QueueError, QueueStats};
pub use range::{RangeSpec, in_range};
