//! HTTP client wrapper for manifest fetches and page downloads.
//!
//! Each adapter owns one [`HttpClient`], which owns its own cookie jar.
//! Cookies and custom headers loaded from disk are attached per request
//! through a [`RequestDecorator`], and every call races the run's
//! cancellation token.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PARTIAL_SUFFIX};
use super::error::DownloadError;
use crate::auth::{CookieHeaderStore, RequestDecorator};
use crate::config::Config;

/// HTTP client shared by one adapter across all of its runs.
///
/// Cloning is cheap and keeps the same connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    decorator: Arc<dyn RequestDecorator>,
}

impl HttpClient {
    /// Builds a client from runtime configuration with a fresh cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the settings.
    #[instrument(level = "debug", skip(config, decorator))]
    pub fn new(
        config: &Config,
        decorator: Arc<dyn RequestDecorator>,
    ) -> Result<Self, DownloadError> {
        Self::with_timeout(&config.user_agent, config.timeout, decorator)
    }

    /// Builds a client with explicit User-Agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the settings.
    pub fn with_timeout(
        user_agent: &str,
        timeout: Duration,
        decorator: Arc<dyn RequestDecorator>,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .timeout(timeout)
            .user_agent(user_agent)
            .cookie_provider(Arc::new(Jar::default()))
            .gzip(true)
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self { client, decorator })
    }

    /// Client with default settings and no decoration, for tests and probes.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the settings.
    pub fn plain() -> Result<Self, DownloadError> {
        Self::new(&Config::default(), Arc::new(CookieHeaderStore::empty()))
    }

    /// Sends a request and accepts only 200 and 206.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, network failures,
    /// cancellation, and any other status code.
    #[instrument(level = "debug", skip(self, extra_headers, cancel), fields(url = %url))]
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        extra_headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self.decorator.decorate(self.client.request(method, url));
        if !extra_headers.is_empty() {
            request = request.headers(extra_headers.clone());
        }

        let response = cancellable(url, cancel, request.send())
            .await?
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Fetches a body into memory.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`send`](Self::send).
    pub async fn get_bytes(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, DownloadError> {
        let response = self.send(Method::GET, url, &HeaderMap::new(), cancel).await?;
        let body = cancellable(url, cancel, response.bytes())
            .await?
            .map_err(|e| DownloadError::network(url, e))?;
        Ok(body.to_vec())
    }

    /// Fetches a body as trimmed UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Decode`] for non-UTF-8 bodies, plus the
    /// errors of [`send`](Self::send).
    pub async fn get_text(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        let body = self.get_bytes(url, cancel).await?;
        let text = String::from_utf8(body).map_err(|e| DownloadError::decode(url, e))?;
        Ok(text.trim().to_string())
    }

    /// Fetches and deserializes a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Decode`] when the body is not the expected
    /// JSON, plus the errors of [`send`](Self::send).
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, DownloadError> {
        let body = self.get_bytes(url, cancel).await?;
        serde_json::from_slice(&body).map_err(|e| DownloadError::decode(url, e))
    }

    /// Returns the `Content-Type` of `url`, trying `HEAD` before `GET`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`send`](Self::send) from the `GET` attempt.
    pub async fn content_type(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, DownloadError> {
        let response = match self.send(Method::HEAD, url, &HeaderMap::new(), cancel).await {
            Ok(response) => response,
            Err(DownloadError::HttpStatus { status, .. }) => {
                debug!(url, status, "HEAD rejected; probing with GET");
                self.send(Method::GET, url, &HeaderMap::new(), cancel).await?
            }
            Err(e) => return Err(e),
        };
        Ok(response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase))
    }

    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// The body lands in `<dest>.part` first and is renamed on success, so a
    /// half-written page never passes the "already downloaded" check.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on request, stream, or file system failure.
    /// The partial file is removed on failure.
    #[instrument(skip(self, cancel), fields(url = %url, dest = %dest.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let response = self.send(Method::GET, url, &HeaderMap::new(), cancel).await?;
        self.write_response(response, url, dest, cancel).await
    }

    /// Writes an already accepted response to `dest` via a partial file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on stream or file system failure.
    pub async fn write_response(
        &self,
        response: reqwest::Response,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let partial = partial_path(dest);
        let mut file = File::create(&partial)
            .await
            .map_err(|e| DownloadError::io(partial.clone(), e))?;

        let result = stream_to_file(&mut file, response, url, &partial, cancel).await;
        drop(file);

        let bytes_written = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %partial.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        info!(path = %dest.display(), bytes = bytes_written, "page written");
        Ok(bytes_written)
    }
}

/// `0001.jpg` -> `0001.jpg.part`.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    dest.with_file_name(name)
}

/// Runs `fut` unless the token fires first.
async fn cancellable<T>(
    url: &str,
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, DownloadError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DownloadError::cancelled(url)),
        out = fut => Ok(out),
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = cancellable(url, cancel, stream.next()).await? {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/books/b1/0001.jpg")),
            PathBuf::from("/books/b1/0001.jpg.part")
        );
    }

    #[tokio::test]
    async fn test_download_writes_file_and_removes_partial() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/page.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg bytes".to_vec()))
            .mount(&mock_server)
            .await;

        let client = HttpClient::plain().unwrap();
        let dest = temp_dir.path().join("book").join("0001.jpg");
        let url = format!("{}/page.jpg", mock_server.uri());

        let bytes = client
            .download_to_path(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg bytes");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error_and_leaves_nothing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = HttpClient::plain().unwrap();
        let dest = temp_dir.path().join("0001.jpg");
        let url = format!("{}/busy.jpg", mock_server.uri());

        let result = client
            .download_to_path(&url, &dest, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 503, .. })
        ));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_partial_content_is_accepted() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(206).set_body_string("part"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::plain().unwrap();
        let body = client
            .get_text(&mock_server.uri(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "part");
    }

    #[tokio::test]
    async fn test_decorator_headers_are_sent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(header("cookie", "sid=42"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "k".parse().unwrap());
        let store = CookieHeaderStore::from_parts(crate::auth::CookieValue::new("sid=42"), headers);
        let client = HttpClient::new(&Config::default(), Arc::new(store)).unwrap();

        let body = client
            .get_text(&mock_server.uri(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_request() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let client = HttpClient::plain().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.get_bytes(&mock_server.uri(), &cancel).await;
        assert!(matches!(result, Err(DownloadError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = HttpClient::plain().unwrap();
        let result = client
            .get_bytes("not-a-valid-url", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_content_type_falls_back_to_get() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/JSON; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let client = HttpClient::plain().unwrap();
        let content_type = client
            .content_type(&mock_server.uri(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(content_type.as_deref(), Some("application/json; charset=utf-8"));
    }
}
