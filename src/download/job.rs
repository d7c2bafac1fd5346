//! Page-level data types passed between adapters and the download manager.

use std::path::{Path, PathBuf};

use super::constants::TILE_TE_HEADER;

/// One page of a work, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResource {
    /// 0-based position in the manifest.
    pub index: usize,
    /// Image, descriptor, or intermediate endpoint for this page.
    pub resource_uri: String,
    /// `0001.jpg`-style output name.
    pub filename: String,
}

impl PageResource {
    /// Creates a page resource.
    #[must_use]
    pub fn new(index: usize, resource_uri: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            index,
            resource_uri: resource_uri.into(),
            filename: filename.into(),
        }
    }
}

/// How a resolved URI turns into a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The response body is the image.
    Image,
    /// The response is a deep-zoom descriptor handed to the tile stitcher.
    DeepZoom,
}

/// Final fetchable URI for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    /// URI written to the sidecar and fetched.
    pub uri: String,
    /// Plain image or deep-zoom descriptor.
    pub kind: ResourceKind,
    /// Extra headers forwarded to the tile stitcher.
    pub tile_headers: Vec<(String, String)>,
}

impl ResolvedPage {
    /// A plain image.
    #[must_use]
    pub fn image(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            kind: ResourceKind::Image,
            tile_headers: Vec::new(),
        }
    }

    /// A deep-zoom descriptor with no extra stitcher headers.
    #[must_use]
    pub fn deep_zoom(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            kind: ResourceKind::DeepZoom,
            tile_headers: Vec::new(),
        }
    }

    /// Adds `Origin`, `Referer` and `TE` headers for `host`.
    #[must_use]
    pub fn with_origin(mut self, host: &str) -> Self {
        let origin = format!("https://{host}");
        self.tile_headers.push(("Origin".to_string(), origin.clone()));
        self.tile_headers.push(("Referer".to_string(), origin));
        self.tile_headers
            .push((TILE_TE_HEADER.0.to_string(), TILE_TE_HEADER.1.to_string()));
        self
    }
}

/// A surviving page bound to its destination file.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Page being materialized.
    pub page: PageResource,
    /// Output file.
    pub dest: PathBuf,
}

impl DownloadJob {
    /// Binds `page` to `<dir>/<filename>`.
    #[must_use]
    pub fn new(page: PageResource, dir: &Path) -> Self {
        let dest = dir.join(&page.filename);
        Self { page, dest }
    }

    /// True when the output already exists from an earlier run.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.dest.is_file()
    }
}
