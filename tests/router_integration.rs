//! Integration tests for source routing and the run modes built on it.

mod support;

use std::sync::Arc;

use bookget_core::adapter::{AdapterEnv, AdapterError, Router, source_key_for};
use bookget_core::download::DezoomifyCommand;
use bookget_core::{App, Config, CookieHeaderStore, DownloaderMode};
use support::socket_guard::start_mock_server_or_skip;
use support::{file_names, iiif_manifest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

fn router(mode: DownloaderMode) -> Router {
    let config = Arc::new(Config {
        downloader_mode: mode,
        ..Config::default()
    });
    let env = AdapterEnv::new(
        config,
        Arc::new(CookieHeaderStore::empty()),
        Arc::new(DezoomifyCommand::new("dezoomify-rs", 1)),
    );
    Router::with_defaults(env, CancellationToken::new())
}

async fn resolve_name(router: &Router, url: &str) -> Result<&'static str, AdapterError> {
    let key = source_key_for(url).unwrap_or_default();
    router.resolve(&key, url).await.map(|adapter| adapter.name())
}

#[tokio::test]
async fn test_known_hosts_resolve_to_their_adapters() {
    let router = router(DownloaderMode::Auto);

    assert_eq!(
        resolve_name(
            &router,
            "https://digital.staatsbibliothek-berlin.de/werkansicht/?PPN=PPN1"
        )
        .await
        .unwrap(),
        "berlin"
    );
    assert_eq!(
        resolve_name(&router, "https://dcollections.lib.keio.ac.jp/ja/page/132X-44-1")
            .await
            .unwrap(),
        "iiif"
    );
    assert_eq!(
        resolve_name(&router, "https://any.example/data/4119/tiles/infos.json")
            .await
            .unwrap(),
        "dzi"
    );
}

#[tokio::test]
async fn test_json_url_without_override_resolves_to_iiif() {
    let router = router(DownloaderMode::Auto);
    assert_eq!(
        resolve_name(&router, "https://unknown.example/book/manifest.json")
            .await
            .unwrap(),
        "iiif"
    );
}

#[tokio::test]
async fn test_generic_mode_overrides_every_host() {
    let router = router(DownloaderMode::Generic);
    for url in [
        "https://digital.staatsbibliothek-berlin.de/werkansicht/?PPN=PPN1",
        "https://unknown.example/book/manifest.json",
        "https://unknown.example/scan_(1-9).jpg",
    ] {
        assert_eq!(resolve_name(&router, url).await.unwrap(), "generic", "{url}");
    }
}

#[tokio::test]
async fn test_iiif_mode_overrides_host() {
    let router = router(DownloaderMode::IiifManifest);
    assert_eq!(
        resolve_name(&router, "https://unknown.example/book/7").await.unwrap(),
        "iiif"
    );
}

#[tokio::test]
async fn test_unknown_html_page_is_unsupported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(path("/viewer/7"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let router = router(DownloaderMode::Auto);
    let url = format!("{}/viewer/7", server.uri());

    let result = resolve_name(&router, &url).await;

    assert!(matches!(result, Err(AdapterError::UnsupportedSource { .. })));
}

#[tokio::test]
async fn test_app_downloads_manifest_found_by_content_probe() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/works/book7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(iiif_manifest(&server.uri(), 2), "application/json"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/iiif/p\d+/full/full/0/default\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .expect(2)
        .mount(&server)
        .await;

    let config = Arc::new(Config {
        directory: dir.path().to_path_buf(),
        use_dzi: false,
        ..Config::default()
    });
    let app = App::new(config, CancellationToken::new()).unwrap();

    let summary = app
        .process_url(&format!("{}/works/book7", server.uri()))
        .await
        .unwrap();

    assert_eq!(summary.book_id, "book7");
    assert_eq!(
        file_names(&dir.path().join("book7")),
        vec!["0001.jpg", "0002.jpg", "urls.txt"]
    );
}

#[tokio::test]
async fn test_generic_batch_downloads_every_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path_regex(r"^/set/b\d/scan\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"scan".to_vec()))
        .expect(3)
        .mount(&server)
        .await;

    let config = Arc::new(Config {
        directory: dir.path().to_path_buf(),
        downloader_mode: DownloaderMode::Generic,
        threads: 2,
        ..Config::default()
    });
    let app = Arc::new(App::new(config, CancellationToken::new()).unwrap());
    let urls = (1..=3).map(|n| format!("{}/set/b{n}/scan.jpg", server.uri()));

    let report = app.run_batch(urls).await.unwrap();

    assert_eq!(report.submitted, 3);
    assert_eq!(report.completed, 3);
    assert!(report.all_succeeded());
    assert_eq!(file_names(dir.path()).len(), 3);
}
