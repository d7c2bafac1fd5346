//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so a logged failure
//! always identifies the offending page.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a manifest or materializing a page.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with anything other than 200 or 206.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing a page.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Response body could not be decoded into the expected document.
    #[error("cannot decode response from {url}: {reason}")]
    Decode {
        /// Source URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The run was cancelled while this request was in flight.
    #[error("cancelled while fetching {url}")]
    Cancelled {
        /// URL of the interrupted request.
        url: String,
    },

    /// The external tile stitcher failed or could not be launched.
    #[error("tile stitching failed for {url}: {reason}")]
    TileStitch {
        /// Deep-zoom descriptor URL.
        url: String,
        /// Exit status or launch error.
        reason: String,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a tile stitching error.
    pub fn tile_stitch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TileStitch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the error came from cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let error = DownloadError::timeout("https://example.com/0001.jpg");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/0001.jpg"));
    }

    #[test]
    fn test_http_status_display() {
        let error = DownloadError::http_status("https://example.com/manifest", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/manifest"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/book/0001.jpg"), io_error);
        assert!(error.to_string().contains("/tmp/book/0001.jpg"));
    }

    #[test]
    fn test_tile_stitch_display() {
        let error = DownloadError::tile_stitch("https://example.com/a.dzi", "exit status 1");
        let msg = error.to_string();
        assert!(msg.contains("a.dzi"));
        assert!(msg.contains("exit status 1"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(DownloadError::cancelled("https://example.com").is_cancelled());
        assert!(!DownloadError::timeout("https://example.com").is_cancelled());
    }
}
