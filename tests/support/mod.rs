//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;

/// IIIF 2.x manifest with one canvas per image service under `base`.
pub fn iiif_manifest(base: &str, pages: usize) -> String {
    let canvases: Vec<String> = (1..=pages)
        .map(|n| {
            format!(
                r#"{{"images": [{{"resource": {{"@id": "{base}/iiif/p{n}/full/full/0/default.jpg", "service": {{"@id": "{base}/iiif/p{n}"}}}}}}]}}"#
            )
        })
        .collect();
    format!(
        r#"{{"@context": "http://iiif.io/api/presentation/2/context.json", "sequences": [{{"canvases": [{}]}}]}}"#,
        canvases.join(",")
    )
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
