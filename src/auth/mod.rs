//! Cookie and custom header injection.
//!
//! Users export a session cookie and any extra headers a backend demands
//! (Referer checks, API tokens) into two plain-text files. The
//! [`CookieHeaderStore`] loads them once at startup and decorates every
//! outbound request through the [`RequestDecorator`] seam.

mod cookies;
mod headers;

pub use cookies::{CookieValue, parse_cookie_line};
pub use headers::{ParsedHeaders, parse_header_lines};

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use reqwest::RequestBuilder;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

/// Errors raised while loading the cookie or header file.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The file exists but could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading lines failed midway.
    #[error("failed to read auth file: {0}")]
    Read(#[source] io::Error),
}

/// Applies per-request decoration (cookies, custom headers).
pub trait RequestDecorator: Send + Sync + std::fmt::Debug {
    /// Returns the request with extra headers attached.
    fn decorate(&self, request: RequestBuilder) -> RequestBuilder;
}

/// Cookie header and custom headers applied to every request.
#[derive(Debug, Clone, Default)]
pub struct CookieHeaderStore {
    cookie: Option<CookieValue>,
    headers: HeaderMap,
}

impl CookieHeaderStore {
    /// A store that adds nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a store from already parsed parts.
    #[must_use]
    pub fn from_parts(cookie: Option<CookieValue>, headers: HeaderMap) -> Self {
        Self { cookie, headers }
    }

    /// Loads the cookie and header files.
    ///
    /// A path that does not exist is treated as "no cookies" / "no headers",
    /// since both files are optional.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when an existing file cannot be read.
    pub fn load(cookie_file: Option<&Path>, header_file: Option<&Path>) -> Result<Self, AuthError> {
        let cookie = match cookie_file.map(open_optional).transpose()?.flatten() {
            Some(reader) => parse_cookie_line(reader)?,
            None => None,
        };

        let headers = match header_file.map(open_optional).transpose()?.flatten() {
            Some(reader) => {
                let parsed = parse_header_lines(reader)?;
                for (line, reason) in &parsed.warnings {
                    warn!(line, %reason, "header file line ignored");
                }
                parsed.headers
            }
            None => HeaderMap::new(),
        };

        info!(
            cookie = cookie.is_some(),
            headers = headers.len(),
            "loaded request decoration"
        );

        Ok(Self { cookie, headers })
    }

    /// The cookie header value, if any.
    #[must_use]
    pub fn cookie(&self) -> Option<&CookieValue> {
        self.cookie.as_ref()
    }

    /// Custom headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// True when nothing would be injected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookie.is_none() && self.headers.is_empty()
    }
}

impl RequestDecorator for CookieHeaderStore {
    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(cookie) = &self.cookie
            && let Ok(value) = HeaderValue::from_str(cookie.as_str())
        {
            request = request.header(COOKIE, value);
        }
        if !self.headers.is_empty() {
            request = request.headers(self.headers.clone());
        }
        request
    }
}

fn open_optional(path: &Path) -> Result<Option<BufReader<File>>, AuthError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "auth file not present");
            Ok(None)
        }
        Err(source) => Err(AuthError::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}
