//! Shared helpers for adapters: source keys, book-id extraction, and common regexes.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Numeric page template in a batch URL, e.g. `scan_(001-120).jpg`.
pub static PAGE_TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\((\d+)-(\d+)\)"));

/// Largest number of pages a single URL template may expand to.
pub const MAX_TEMPLATE_PAGES: u64 = 100_000;

/// Registry key for a URL: its host, plus `:port` when the URL names one.
///
/// Returns `None` for inputs that are not absolute URLs with a host.
#[must_use]
pub fn source_key_for(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Host without port, for `Origin`/`Referer` headers.
#[must_use]
pub fn host_of(raw_url: &str) -> Option<String> {
    Url::parse(raw_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

/// Replaces anything outside `[A-Za-z0-9._-]` with `_` so the id is a safe
/// directory name.
#[must_use]
pub fn sanitize_book_id(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Non-empty path segments of `url`.
fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Book id for an IIIF manifest or collection URL.
///
/// `.../<id>/manifest.json` and `.../<id>/manifest` yield `<id>`; any other
/// URL yields its last path segment without a `.json` suffix.
#[must_use]
pub fn iiif_book_id(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url.trim()).ok()?;
    let segs = segments(&url);
    let (&last, rest) = segs.split_last()?;

    let lowered = last.to_ascii_lowercase();
    let candidate = if lowered.starts_with("manifest") || lowered.starts_with("collection") {
        rest.last().copied().unwrap_or(last)
    } else {
        last.strip_suffix(".json").unwrap_or(last)
    };

    let id = sanitize_book_id(&urlencoding::decode(candidate).ok()?);
    (!id.is_empty()).then_some(id)
}

/// Book id for a deep-zoom `.../<id>/tiles/infos.json` URL: the segment
/// before `tiles`.
#[must_use]
pub fn tile_book_id(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url.trim()).ok()?;
    let segs = segments(&url);
    let pos = segs.iter().position(|s| *s == "tiles")?;
    let id = sanitize_book_id(segs.get(pos.checked_sub(1)?)?);
    (!id.is_empty()).then_some(id)
}

/// Book id for a plain download URL: host plus directory path.
///
/// `https://lib.example/scans/b7/0001.jpg` yields `lib.example_scans_b7`.
#[must_use]
pub fn generic_book_id(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url.trim()).ok()?;
    let host = url.host_str()?;
    let segs = segments(&url);
    let dirs = segs.split_last().map(|(_, dirs)| dirs).unwrap_or_default();

    let mut raw = host.to_string();
    for dir in dirs {
        raw.push('_');
        raw.push_str(dir);
    }
    let id = sanitize_book_id(&raw);
    (!id.is_empty()).then_some(id)
}

/// Expands a `(<start>-<end>)` template into one URL per number.
///
/// Zero padding follows the width of `<start>`. Returns `None` when the URL
/// has no template, the bounds are reversed, or the span exceeds
/// [`MAX_TEMPLATE_PAGES`].
#[must_use]
pub fn expand_page_template(raw_url: &str) -> Option<Vec<String>> {
    let caps = PAGE_TEMPLATE_RE.captures(raw_url)?;
    let whole = caps.get(0)?;
    let start_str = caps.get(1)?.as_str();
    let start: u64 = start_str.parse().ok()?;
    let end: u64 = caps.get(2)?.as_str().parse().ok()?;
    if start > end || end - start >= MAX_TEMPLATE_PAGES {
        return None;
    }

    let width = start_str.len();
    let prefix = &raw_url[..whole.start()];
    let suffix = &raw_url[whole.end()..];
    Some(
        (start..=end)
            .map(|n| format!("{prefix}{n:0width$}{suffix}"))
            .collect(),
    )
}
