//! External deep-zoom reassembly.
//!
//! Tiled pyramids (DZI, IIIF image services) are rebuilt by an outside
//! program. The program owns its own tile retries; this module only builds
//! the command line and maps the exit status.
//!
//! The program writes to a sibling such as `0001.part.jpg` (it picks the
//! encoder from the extension), which is renamed to the page path only on a
//! clean exit. A failed stitch leaves neither file behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::constants::{PARTIAL_SUFFIX, STITCH_STDERR_LIMIT};
use super::error::DownloadError;

/// Reconstructs one image from a deep-zoom descriptor URL.
#[async_trait]
pub trait TileStitcher: Send + Sync + std::fmt::Debug {
    /// Writes the stitched image for `descriptor_url` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::TileStitch`] when the stitch fails.
    async fn stitch(
        &self,
        descriptor_url: &str,
        dest: &Path,
        headers: &[(String, String)],
    ) -> Result<(), DownloadError>;
}

/// Runs `dezoomify-rs` (or a compatible program) as a subprocess.
#[derive(Debug, Clone)]
pub struct DezoomifyCommand {
    program: PathBuf,
    retries: u32,
}

impl DezoomifyCommand {
    /// Creates a stitcher for `program`, forwarding `retries`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, retries: u32) -> Self {
        Self {
            program: program.into(),
            retries,
        }
    }

    /// Arguments passed to the program, in order.
    #[must_use]
    pub fn args(&self, descriptor_url: &str, dest: &Path, headers: &[(String, String)]) -> Vec<String> {
        let mut args = Vec::with_capacity(headers.len() * 2 + 4);
        for (name, value) in headers {
            args.push("-H".to_string());
            args.push(format!("{name}: {value}"));
        }
        args.push("--retries".to_string());
        args.push(self.retries.to_string());
        args.push(descriptor_url.to_string());
        args.push(dest.display().to_string());
        args
    }
}

#[async_trait]
impl TileStitcher for DezoomifyCommand {
    #[instrument(skip(self, headers), fields(url = %descriptor_url, dest = %dest.display()))]
    async fn stitch(
        &self,
        descriptor_url: &str,
        dest: &Path,
        headers: &[(String, String)],
    ) -> Result<(), DownloadError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let staging = stitch_path(dest);
        let args = self.args(descriptor_url, &staging, headers);
        debug!(program = %self.program.display(), ?args, "launching tile stitcher");

        let launched = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let failure = match launched {
            Err(e) => Some(format!("cannot launch {}: {e}", self.program.display())),
            Ok(output) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail: String = stderr.trim().chars().take(STITCH_STDERR_LIMIT).collect();
                Some(format!("{} ({tail})", output.status))
            }
            Ok(_) => None,
        };

        if let Some(reason) = failure {
            discard(&staging).await;
            discard(dest).await;
            return Err(DownloadError::tile_stitch(descriptor_url, reason));
        }

        if let Err(e) = tokio::fs::rename(&staging, dest).await {
            discard(&staging).await;
            return Err(DownloadError::tile_stitch(
                descriptor_url,
                format!("no stitched image at {}: {e}", staging.display()),
            ));
        }

        info!(path = %dest.display(), "tiles stitched");
        Ok(())
    }
}

/// Path the stitcher writes to before the result is accepted.
///
/// Keeps the image extension last: `0001.jpg` becomes `0001.part.jpg`.
#[must_use]
pub fn stitch_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_stem()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    if let Some(ext) = dest.extension() {
        name.push(".");
        name.push(ext);
    }
    dest.with_file_name(name)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed incomplete stitch output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove stitch output"),
    }
}
