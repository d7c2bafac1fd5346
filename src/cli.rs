//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use bookget_core::config::{ConfigError, DownloaderMode, FileConfig, normalize_ext};
use bookget_core::{Config, RangeSpec};

/// Cookie file looked up in the working directory when none is configured.
pub const DEFAULT_COOKIE_FILE: &str = "cookie.txt";

/// Header file looked up in the working directory when none is configured.
pub const DEFAULT_HEADER_FILE: &str = "header.txt";

/// Pause between sequential pages when neither a flag nor the file sets one.
pub const DEFAULT_SLEEP_SECS: u64 = 3;

/// Download digitized books from digital-library backends.
///
/// Pass one URL, a file of URLs with -I, or type URLs on stdin. Each book
/// is written to <dir>/<book id>/ as 0001.jpg, 0002.jpg, ...
#[derive(Parser, Debug)]
#[command(name = "bookget")]
#[command(author, version, about)]
pub struct Args {
    /// Book URL (same as -i)
    #[arg(value_name = "URL", conflicts_with = "input")]
    pub url: Option<String>,

    /// Book URL
    #[arg(short = 'i', long, value_name = "URL")]
    pub input: Option<String>,

    /// File with one URL per line (lines not starting with http are skipped)
    #[arg(short = 'I', long, value_name = "FILE", conflicts_with_all = ["url", "input"])]
    pub input_file: Option<PathBuf>,

    /// TOML file with defaults for any option below
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output root directory
    #[arg(short = 'O', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Page range, e.g. 4:434, 10: or 7
    #[arg(short = 'p', long, value_name = "RANGE")]
    pub sequence: Option<String>,

    /// Volume range for multi-volume works, e.g. 2:3
    #[arg(long, value_name = "RANGE")]
    pub volume: Option<String>,

    /// IIIF image request [default: full/full/0/default.jpg]
    #[arg(long)]
    pub format: Option<String>,

    /// User-Agent header
    #[arg(short = 'U', long)]
    pub user_agent: Option<String>,

    /// Rebuild deep-zoom images from tiles [default: true]
    #[arg(short = 'd', long, value_name = "BOOL")]
    pub dzi: Option<bool>,

    /// Raw cookie header file [default: cookie.txt]
    #[arg(short = 'C', long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// `Key: Value` header file [default: header.txt]
    #[arg(short = 'H', long, value_name = "FILE")]
    pub headers: Option<PathBuf>,

    /// Books downloaded in parallel from a URL file [default: 1]
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: Option<u16>,

    /// Books downloaded in parallel from stdin [default: 16]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrent: Option<u16>,

    /// Pages fetched in parallel for IIIF books [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub page_rate: Option<u16>,

    /// Output file extension [default: .jpg]
    #[arg(long)]
    pub ext: Option<String>,

    /// Retries passed to the tile stitcher (0-100) [default: 3]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub retries: Option<u32>,

    /// Request timeout in seconds [default: 300]
    #[arg(short = 'T', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Pause between pages in seconds [default: 3]
    #[arg(long)]
    pub sleep: Option<u64>,

    /// 0 = route by host, 1 = plain downloads, 2 = IIIF manifest [default: 0]
    #[arg(short = 'm', long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub downloader_mode: Option<u8>,

    /// Tile stitching program [default: dezoomify-rs]
    #[arg(long, value_name = "PROGRAM")]
    pub tile_program: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// The single URL given positionally or with `-i`.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.input
            .as_deref()
            .or(self.url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Layers the explicit flags over `file` over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the result fails validation.
    pub fn to_config(&self, file: Option<&FileConfig>) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        if let Some(file) = file {
            config.apply_file(file);
        }

        if let Some(dir) = &self.dir {
            config.directory.clone_from(dir);
        }
        if let Some(mode) = self.downloader_mode {
            config.downloader_mode = DownloaderMode::try_from(mode)?;
        }
        if let Some(sequence) = &self.sequence {
            config.pages = RangeSpec::parse(sequence);
        }
        if let Some(volume) = &self.volume {
            config.volumes = RangeSpec::parse(volume);
        }
        if let Some(format) = &self.format {
            config.format.clone_from(format);
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(dzi) = self.dzi {
            config.use_dzi = dzi;
        }
        if let Some(cookies) = &self.cookies {
            config.cookie_file = Some(cookies.clone());
        }
        if let Some(headers) = &self.headers {
            config.header_file = Some(headers.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = usize::from(threads);
        }
        if let Some(concurrent) = self.concurrent {
            config.max_concurrent = usize::from(concurrent);
        }
        if let Some(page_rate) = self.page_rate {
            config.page_rate = usize::from(page_rate);
        }
        if let Some(ext) = &self.ext {
            config.file_ext = normalize_ext(ext);
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        let sleep = self
            .sleep
            .or_else(|| file.and_then(|f| f.sleep_secs))
            .unwrap_or(DEFAULT_SLEEP_SECS);
        config.sleep = Duration::from_secs(sleep);
        if let Some(program) = &self.tile_program {
            config.tile_program.clone_from(program);
        }

        config
            .cookie_file
            .get_or_insert_with(|| PathBuf::from(DEFAULT_COOKIE_FILE));
        config
            .header_file
            .get_or_insert_with(|| PathBuf::from(DEFAULT_HEADER_FILE));

        config.validate()?;
        Ok(config)
    }
}
