//! CLI entry point for bookget.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bookget_core::app::{App, load_url_file};
use bookget_core::config::FileConfig;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let file_config = args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()
        .context("failed to load config file")?;
    let config = Arc::new(
        args.to_config(file_config.as_ref())
            .context("invalid configuration")?,
    );
    info!(dir = %config.directory.display(), mode = ?config.downloader_mode, "bookget starting");

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let app = Arc::new(
        App::new(Arc::clone(&config), cancel).context("failed to load cookies or headers")?,
    );

    if let Some(url) = args.source_url() {
        app.process_url(url).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = if let Some(path) = &args.input_file {
        let urls = load_url_file(path)?;
        info!(urls = urls.len(), file = %path.display(), "batch started");
        app.run_batch(urls).await?
    } else {
        if io::stdin().is_terminal() {
            info!("Enter book URLs, one per line (Ctrl-D to finish, Ctrl-C to abort).");
        }
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        app.run_interactive(stdin).await?
    };

    info!(
        submitted = report.submitted,
        completed = report.completed,
        failed = report.failed,
        panicked = report.panicked,
        "all books processed"
    );
    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Cancels `cancel` on the first Ctrl-C.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received; stopping after in-flight requests");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });
}
