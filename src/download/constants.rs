//! Constants for the download module.

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Suffix for a page that is still being written.
pub const PARTIAL_SUFFIX: &str = "part";

/// Headers the tile stitcher sends with every tile request.
pub const TILE_TE_HEADER: (&str, &str) = ("TE", "trailers");

/// Maximum bytes of stitcher stderr kept in an error message.
pub const STITCH_STDERR_LIMIT: usize = 512;
