//! `urls.txt` sidecar: the ordered list of resolved page URIs for a book.
//!
//! The file sits in the book directory next to the images, one URI per line
//! in page order. It is an audit trail for what was fetched and lets users
//! re-drive downloads with other tools.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

/// File name of the URL list inside a book directory.
pub const URLS_FILE_NAME: &str = "urls.txt";

/// Errors produced while writing the URL list.
#[derive(Debug, Error)]
pub enum SidecarError {
    /// I/O error writing the sidecar file to disk.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// Sidecar path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Writes `uris` to `<dir>/urls.txt`, replacing any earlier list.
///
/// Returns `None` (with a `debug!` log) when `uris` is empty, so a resumed
/// run that fetched nothing keeps the list from the run that did.
///
/// # Errors
///
/// Returns [`SidecarError`] on I/O failure.
#[instrument(skip(uris), fields(dir = %dir.display(), count = uris.len()))]
pub fn write_url_list<S: AsRef<str>>(dir: &Path, uris: &[S]) -> Result<Option<PathBuf>, SidecarError> {
    if uris.is_empty() {
        debug!("no resolved URIs, keeping existing sidecar");
        return Ok(None);
    }

    let path = dir.join(URLS_FILE_NAME);
    let io_err = |source| SidecarError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let file = fs::File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for uri in uris {
        writeln!(writer, "{}", uri.as_ref()).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    debug!(path = %path.display(), "sidecar written");
    Ok(Some(path))
}
