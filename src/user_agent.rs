//! Shared User-Agent string for manifest and image requests.
//!
//! Many library backends reject obvious tool signatures, so the default
//! mimics a desktop browser. Users can override it with `--user-agent`.

/// Desktop browser User-Agent sent when none is configured.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:139.0) Gecko/20100101 Firefox/139.0";

/// Default User-Agent for every outbound request.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_looks_like_browser() {
        let ua = default_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "unexpected UA: {ua}");
        assert!(ua.contains("Firefox"), "unexpected UA: {ua}");
    }
}
