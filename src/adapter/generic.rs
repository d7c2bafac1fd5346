//! Generic batch downloader for plain URLs.
//!
//! A URL with a numeric template such as `https://x/scan_(001-120).jpg`
//! expands into one page per number; any other URL is a single page. Bodies
//! are saved as is.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::pipeline::{PageLoop, PassThrough, number_pages};
use super::utils::{PAGE_TEMPLATE_RE, expand_page_template, generic_book_id};
use super::{Adapter, AdapterEnv, AdapterError, RunContext, RunSummary, SourceDescriptor};
use crate::download::{DownloadManager, ResourceKind};

const NAME: &str = "generic";

/// Adapter that downloads URLs directly.
#[derive(Debug)]
pub struct GenericAdapter {
    manager: DownloadManager,
}

impl GenericAdapter {
    /// Creates the adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Client`] when HTTP client construction fails.
    pub fn new(env: &AdapterEnv) -> Result<Self, AdapterError> {
        let manager = env.manager().map_err(|e| AdapterError::client(NAME, e))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl Adapter for GenericAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self, ctx), fields(adapter = NAME, url = %raw_url))]
    async fn run(&self, raw_url: &str, ctx: &RunContext) -> Result<RunSummary, AdapterError> {
        let raw_url = raw_url.trim();
        let book_id =
            generic_book_id(raw_url).ok_or_else(|| AdapterError::unrecognized(NAME, raw_url))?;
        let source = SourceDescriptor::new(raw_url, book_id);
        let book_dir = ctx.config.book_dir(&source.book_id);
        let mut summary = RunSummary::new(&source, book_dir.clone());

        let uris = match expand_page_template(raw_url) {
            Some(uris) => uris,
            None if PAGE_TEMPLATE_RE.is_match(raw_url) => {
                return Err(AdapterError::unrecognized(NAME, raw_url));
            }
            None => vec![raw_url.to_string()],
        };
        debug!(pages = uris.len(), "expanded URL template");

        PageLoop {
            manager: &self.manager,
            resolver: &PassThrough(ResourceKind::Image),
            config: &ctx.config,
            cancel: &ctx.cancel,
            page_rate: 1,
        }
        .run(
            number_pages(&ctx.config, uris),
            &book_dir,
            ctx.config.pages,
            &mut summary,
        )
        .await?;

        info!(
            book_id = %summary.book_id,
            downloaded = summary.downloaded,
            failed = summary.failed,
            "book finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::auth::CookieHeaderStore;
    use crate::config::Config;
    use crate::download::DezoomifyCommand;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    #[tokio::test]
    async fn test_template_expands_and_failures_do_not_abort() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();

        for n in ["08", "10"] {
            Mock::given(method("GET"))
                .and(path(format!("/scans/p{n}.jpg")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(n.as_bytes().to_vec()))
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/scans/p09.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let config = Arc::new(Config {
            directory: dir.path().to_path_buf(),
            ..Config::default()
        });
        let env = AdapterEnv::new(
            Arc::clone(&config),
            Arc::new(CookieHeaderStore::empty()),
            Arc::new(DezoomifyCommand::new("dezoomify-rs", 1)),
        );
        let adapter = GenericAdapter::new(&env).unwrap();
        let url = format!("{}/scans/p(08-10).jpg", mock_server.uri());

        let summary = adapter
            .run(&url, &RunContext::new(config, CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, 1);
        let book_dir = summary.directory;
        assert_eq!(std::fs::read(book_dir.join("0001.jpg")).unwrap(), b"08");
        assert!(!book_dir.join("0002.jpg").exists());
        assert_eq!(std::fs::read(book_dir.join("0003.jpg")).unwrap(), b"10");
    }

    #[tokio::test]
    async fn test_oversized_or_reversed_template_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(Config {
            directory: dir.path().to_path_buf(),
            ..Config::default()
        });
        let env = AdapterEnv::new(
            Arc::clone(&config),
            Arc::new(CookieHeaderStore::empty()),
            Arc::new(DezoomifyCommand::new("dezoomify-rs", 1)),
        );
        let adapter = GenericAdapter::new(&env).unwrap();

        for url in [
            "https://lib.example/scans/p(0-9999999999).jpg",
            "https://lib.example/scans/p(9-3).jpg",
        ] {
            let result = adapter
                .run(url, &RunContext::new(Arc::clone(&config), CancellationToken::new()))
                .await;
            assert!(
                matches!(result, Err(AdapterError::UnrecognizedUrl { .. })),
                "{url}: {result:?}"
            );
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
