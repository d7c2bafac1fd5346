//! Error types for adapter dispatch and book-level runs.

use thiserror::Error;

use crate::download::DownloadError;
use crate::sidecar::SidecarError;

/// Errors that abort a whole book (or the dispatch of one URL).
///
/// Page-level failures never surface here; they are logged and counted in
/// [`RunSummary::failed`](super::RunSummary::failed).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter is registered for the source and the content probe could
    /// not classify it.
    #[error("unsupported source '{source_key}' for {url}")]
    UnsupportedSource {
        /// Source key that was looked up.
        source_key: String,
        /// Raw input URL.
        url: String,
    },

    /// The adapter could not derive a book id from the URL.
    #[error("unrecognized URL for {adapter}: {url}")]
    UnrecognizedUrl {
        /// Adapter name.
        adapter: &'static str,
        /// Raw input URL.
        url: String,
    },

    /// The manifest or catalog document was unreachable or unparsable.
    #[error("manifest fetch failed for {url}: {source}")]
    ManifestFetch {
        /// Manifest URL.
        url: String,
        /// Underlying fetch or decode error.
        #[source]
        source: DownloadError,
    },

    /// The URL list could not be written.
    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    /// HTTP client construction failed while building an adapter.
    #[error("cannot build client for {adapter}: {source}")]
    Client {
        /// Adapter name.
        adapter: &'static str,
        /// Underlying error.
        #[source]
        source: DownloadError,
    },

    /// The run was cancelled before the manifest was read.
    #[error("cancelled: {url}")]
    Cancelled {
        /// Raw input URL.
        url: String,
    },
}

impl AdapterError {
    /// Creates an unsupported-source error.
    pub fn unsupported(source_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            source_key: source_key.into(),
            url: url.into(),
        }
    }

    /// Creates an unrecognized-URL error.
    pub fn unrecognized(adapter: &'static str, url: impl Into<String>) -> Self {
        Self::UnrecognizedUrl {
            adapter,
            url: url.into(),
        }
    }

    /// Wraps a manifest-level fetch failure, keeping cancellation distinct.
    pub fn manifest_fetch(url: impl Into<String>, source: DownloadError) -> Self {
        let url = url.into();
        if source.is_cancelled() {
            Self::Cancelled { url }
        } else {
            Self::ManifestFetch { url, source }
        }
    }

    /// Wraps a client construction failure.
    pub fn client(adapter: &'static str, source: DownloadError) -> Self {
        Self::Client { adapter, source }
    }

    /// True when the error came from cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
