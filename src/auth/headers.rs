//! `Key: Value` header file parser.

use std::io::BufRead;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument, warn};

use super::AuthError;

/// Result of parsing a header file: the usable headers plus skipped lines.
#[derive(Debug, Default)]
pub struct ParsedHeaders {
    /// Headers in file order (later duplicates replace earlier ones).
    pub headers: HeaderMap,
    /// 1-based line number and reason for every skipped line.
    pub warnings: Vec<(usize, String)>,
}

/// Parses line-oriented `Key: Value` pairs.
///
/// Blank lines and `#` comments are ignored. Malformed lines are collected
/// as warnings instead of failing the whole file.
///
/// # Errors
///
/// Returns [`AuthError::Read`] on read failure.
#[instrument(level = "debug", skip(reader))]
pub fn parse_header_lines(reader: impl BufRead) -> Result<ParsedHeaders, AuthError> {
    let mut parsed = ParsedHeaders::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line.map_err(AuthError::Read)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_header_line(line) {
            Ok((name, value)) => {
                debug!(line = line_number, header = %name, "parsed header");
                parsed.headers.insert(name, value);
            }
            Err(reason) => {
                warn!(line = line_number, %reason, "skipping malformed header line");
                parsed.warnings.push((line_number, reason));
            }
        }
    }

    Ok(parsed)
}

fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), String> {
    let Some((name, value)) = line.split_once(':') else {
        return Err("expected `Key: Value`".to_string());
    };
    let name = name.trim();
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| format!("invalid header name '{name}'"))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| format!("invalid value for header '{name}'"))?;
    Ok((name, value))
}
