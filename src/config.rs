//! Runtime configuration shared by every adapter.
//!
//! A [`Config`] is assembled once at startup (CLI flags layered over an
//! optional TOML file) and then shared read-only as `Arc<Config>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::range::RangeSpec;
use crate::user_agent;

/// Default IIIF image request suffix appended to an image service.
pub const DEFAULT_IIIF_FORMAT: &str = "full/full/0/default.jpg";

/// Default output file extension.
pub const DEFAULT_FILE_EXT: &str = ".jpg";

/// Default external tile-stitching program.
pub const DEFAULT_TILE_PROGRAM: &str = "dezoomify-rs";

/// Default number of concurrently running books.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// How source URLs are routed to adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum DownloaderMode {
    /// Route by hostname.
    #[default]
    Auto,
    /// Treat every URL as a plain batch download.
    Generic,
    /// Treat every URL as an IIIF manifest.
    IiifManifest,
}

impl TryFrom<u8> for DownloaderMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Generic),
            2 => Ok(Self::IiifManifest),
            other => Err(ConfigError::InvalidMode(other)),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mode flag outside `0..=2`.
    #[error("invalid downloader mode {0}: expected 0 (auto), 1 (generic) or 2 (IIIF manifest)")]
    InvalidMode(u8),

    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`FileConfig`].
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A numeric setting is out of bounds.
    #[error("invalid config value for `{field}`: {value} ({expected})")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Provided value.
        value: u64,
        /// Human-readable bound.
        expected: &'static str,
    },
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; each book is written to `<directory>/<book_id>/`.
    pub directory: PathBuf,
    /// Routing override.
    pub downloader_mode: DownloaderMode,
    /// Page range filter.
    pub pages: RangeSpec,
    /// Volume range filter.
    pub volumes: RangeSpec,
    /// IIIF image request suffix used when tiles are disabled.
    pub format: String,
    /// User-Agent sent on every request.
    pub user_agent: String,
    /// Hand deep-zoom capable images to the tile stitcher.
    pub use_dzi: bool,
    /// Single-line raw cookie header file.
    pub cookie_file: Option<PathBuf>,
    /// `Key: Value` header file.
    pub header_file: Option<PathBuf>,
    /// Books processed in parallel in batch mode.
    pub threads: usize,
    /// Upper bound for concurrently running books.
    pub max_concurrent: usize,
    /// Page-level concurrency inside IIIF adapters (1 = sequential).
    pub page_rate: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry count forwarded to the tile stitcher.
    pub retries: u32,
    /// Pause between sequential page fetches. The CLI defaults it to three
    /// seconds; library callers start from zero.
    pub sleep: Duration,
    /// Output file extension including the dot.
    pub file_ext: String,
    /// External tile-stitching program.
    pub tile_program: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("downloads"),
            downloader_mode: DownloaderMode::Auto,
            pages: RangeSpec::unrestricted(),
            volumes: RangeSpec::unrestricted(),
            format: DEFAULT_IIIF_FORMAT.to_string(),
            user_agent: user_agent::default_user_agent().to_string(),
            use_dzi: true,
            cookie_file: None,
            header_file: None,
            threads: 1,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            page_rate: 1,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: 3,
            sleep: Duration::ZERO,
            file_ext: DEFAULT_FILE_EXT.to_string(),
            tile_program: PathBuf::from(DEFAULT_TILE_PROGRAM),
        }
    }
}

impl Config {
    /// Destination directory for a single book.
    #[must_use]
    pub fn book_dir(&self, book_id: &str) -> PathBuf {
        self.directory.join(book_id)
    }

    /// Zero-padded 1-based filename for the page at `index`.
    #[must_use]
    pub fn page_filename(&self, index: usize) -> String {
        format!("{:04}{}", index + 1, self.file_ext)
    }

    /// Applies values from a config file that the command line left unset.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(directory) = &file.directory {
            self.directory.clone_from(directory);
        }
        if let Some(mode) = file.downloader_mode {
            self.downloader_mode = mode;
        }
        if let Some(sequence) = &file.sequence {
            self.pages = RangeSpec::parse(sequence);
        }
        if let Some(volume) = &file.volume {
            self.volumes = RangeSpec::parse(volume);
        }
        if let Some(format) = &file.format {
            self.format.clone_from(format);
        }
        if let Some(user_agent) = &file.user_agent {
            self.user_agent.clone_from(user_agent);
        }
        if let Some(use_dzi) = file.use_dzi {
            self.use_dzi = use_dzi;
        }
        if let Some(path) = &file.cookie_file {
            self.cookie_file = Some(path.clone());
        }
        if let Some(path) = &file.header_file {
            self.header_file = Some(path.clone());
        }
        if let Some(threads) = file.threads {
            self.threads = threads;
        }
        if let Some(max_concurrent) = file.max_concurrent {
            self.max_concurrent = max_concurrent;
        }
        if let Some(page_rate) = file.page_rate {
            self.page_rate = page_rate;
        }
        if let Some(timeout) = file.timeout_secs {
            self.timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = file.retries {
            self.retries = retries;
        }
        if let Some(sleep) = file.sleep_secs {
            self.sleep = Duration::from_secs(sleep);
        }
        if let Some(ext) = &file.file_ext {
            self.file_ext = normalize_ext(ext);
        }
        if let Some(program) = &file.tile_program {
            self.tile_program.clone_from(program);
        }
    }

    /// Checks numeric settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for a zero worker count or timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("threads", self.threads)?;
        check_positive("max_concurrent", self.max_concurrent)?;
        check_positive("page_rate", self.page_rate)?;
        if self.timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "timeout",
                value: 0,
                expected: "at least 1 second",
            });
        }
        Ok(())
    }
}

fn check_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange {
            field,
            value: 0,
            expected: "at least 1",
        });
    }
    Ok(())
}

/// Ensures an extension carries its leading dot (`jpg` -> `.jpg`).
#[must_use]
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim();
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// TOML-backed defaults; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Output root directory.
    pub directory: Option<PathBuf>,
    /// `0`, `1` or `2`.
    pub downloader_mode: Option<DownloaderMode>,
    /// Page range, e.g. `"4:434"`.
    pub sequence: Option<String>,
    /// Volume range.
    pub volume: Option<String>,
    /// IIIF image request suffix.
    pub format: Option<String>,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// Use the tile stitcher.
    pub use_dzi: Option<bool>,
    /// Cookie file path.
    pub cookie_file: Option<PathBuf>,
    /// Header file path.
    pub header_file: Option<PathBuf>,
    /// Batch worker count.
    pub threads: Option<usize>,
    /// Book-level concurrency cap.
    pub max_concurrent: Option<usize>,
    /// IIIF page concurrency.
    pub page_rate: Option<usize>,
    /// Request timeout.
    pub timeout_secs: Option<u64>,
    /// Tile stitcher retries.
    pub retries: Option<u32>,
    /// Pause between pages.
    pub sleep_secs: Option<u64>,
    /// Output extension.
    pub file_ext: Option<String>,
    /// Tile stitcher program.
    pub tile_program: Option<PathBuf>,
}

impl FileConfig {
    /// Loads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
