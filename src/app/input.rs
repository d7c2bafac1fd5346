//! URL list files for batch mode.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Extracts URLs from list text: one per line, only lines starting with
/// `http` after trimming.
#[must_use]
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            let keep = line.starts_with("http");
            if !keep && !line.is_empty() {
                debug!(line, "skipping non-URL line");
            }
            keep
        })
        .map(ToString::to_string)
        .collect()
}

/// Reads a URL list file.
///
/// # Errors
///
/// Fails when the file cannot be read.
pub fn load_url_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read URL list {}", path.display()))?;
    Ok(parse_url_list(&text))
}
