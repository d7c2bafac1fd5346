//! Raw cookie header file loader.
//!
//! The cookie file holds a single `Cookie` header value as copied from a
//! browser's developer tools, e.g. `JSESSIONID=abc; token=xyz`.

use std::fmt;
use std::io::BufRead;

use tracing::{debug, instrument};

use super::AuthError;

/// A cookie header value.
///
/// The value is redacted in Debug output to prevent accidental logging of
/// session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieValue(String);

impl CookieValue {
    /// Wraps a raw cookie header value, returning `None` when blank.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Returns the header value (sensitive, never log).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of `name=value` pairs in the header.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.0
            .split(';')
            .filter(|pair| pair.contains('='))
            .count()
    }
}

impl fmt::Debug for CookieValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CookieValue").field(&"[REDACTED]").finish()
    }
}

/// Reads the first non-blank, non-comment line of a cookie file.
///
/// # Errors
///
/// Returns [`AuthError::Read`] on read failure.
#[instrument(level = "debug", skip(reader))]
pub fn parse_cookie_line(reader: impl BufRead) -> Result<Option<CookieValue>, AuthError> {
    for line in reader.lines() {
        let line = line.map_err(AuthError::Read)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cookie = CookieValue::new(line);
        if let Some(cookie) = &cookie {
            debug!(pairs = cookie.pair_count(), "parsed cookie header");
        }
        return Ok(cookie);
    }
    Ok(None)
}
