//! Page and volume range filtering.
//!
//! A [`RangeSpec`] is parsed from the `--sequence` / `--volume` flags and
//! evaluated against 0-based indices with [`in_range`]. Bounds are 1-based
//! and inclusive on the command line; a negative end counts back from the
//! last element, and a start of zero (or less) disables filtering.
//!
//! | spec      | 5 items, kept (0-based) |
//! |-----------|-------------------------|
//! | *(empty)* | 0, 1, 2, 3, 4           |
//! | `2:4`     | 1, 2, 3                 |
//! | `3:`      | 2, 3, 4                 |
//! | `3`       | 2                       |
//! | `1:-2`    | 0, 1, 2                 |

use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Inclusive range over pages or volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeSpec {
    /// 1-based first element; `<= 0` means unrestricted.
    pub start: i64,
    /// Upper cutoff; `0` is open, negative counts back from the end.
    pub end: i64,
}

impl RangeSpec {
    /// The range that keeps everything.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Creates a range from raw bounds.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Returns true when this range filters nothing.
    #[must_use]
    pub const fn is_unrestricted(&self) -> bool {
        self.start <= 0
    }

    /// Parses `"<start>:<end>"`, `"<start>:"`, `":<end>"` or a single integer.
    ///
    /// Malformed input is not an error: it logs a warning and yields the
    /// unrestricted range so a typo never blocks a download.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match try_parse(raw) {
            Ok(spec) => spec,
            Err(reason) => {
                warn!(range = raw, %reason, "ignoring invalid range; downloading everything");
                Self::unrestricted()
            }
        }
    }

    /// Evaluates this range for a 0-based `index` out of `total` elements.
    #[must_use]
    pub fn contains(&self, index: usize, total: usize) -> bool {
        in_range(index, total, self.start, self.end)
    }
}

impl FromStr for RangeSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            f.write_str("all")
        } else if self.end == 0 {
            write!(f, "{}:", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

fn try_parse(raw: &str) -> Result<RangeSpec, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(RangeSpec::unrestricted());
    }

    let parse_bound = |value: &str| -> Result<i64, String> {
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("'{value}' is not an integer: {e}"))
    };

    match raw.split_once(':') {
        None => {
            let value = parse_bound(raw)?;
            Ok(RangeSpec::new(value, value))
        }
        Some((start, end)) => {
            let start = if start.trim().is_empty() {
                1
            } else {
                parse_bound(start)?
            };
            let end = if end.trim().is_empty() {
                0
            } else {
                parse_bound(end)?
            };
            if end > 0 && start > end {
                return Err(format!("start {start} is after end {end}"));
            }
            Ok(RangeSpec::new(start, end))
        }
    }
}

/// Returns true when the 0-based `index` of `total` elements lies in `start..=end`.
///
/// The same rule serves pages and volumes.
#[must_use]
pub fn in_range(index: usize, total: usize, start: i64, end: i64) -> bool {
    if start <= 0 {
        return true;
    }

    let index = i64::try_from(index).unwrap_or(i64::MAX);
    let total = i64::try_from(total).unwrap_or(i64::MAX);

    if end < 0 && index.saturating_sub(total) >= end {
        return false;
    }
    if end > 0 && index >= end {
        return false;
    }
    index + 1 >= start
}
