//! Artifact naming.
//!
//! Every location is a pure function of a task's parameters, so the same
//! identity always maps to the same file.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::geometry::MeshFormat;

/// Hex digits of the URL digest prefixed to raw downloads.
const DIGEST_LEN: usize = 12;

/// `<work_dir>/<product_id>.json`
pub fn metadata_path(work_dir: &Path, product_id: &str) -> PathBuf {
    work_dir.join(format!("{}.json", sanitize(product_id)))
}

/// `<work_dir>/<digest12>-<basename>`
pub fn raw_path(work_dir: &Path, url: &str) -> PathBuf {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    work_dir.join(format!("{}-{}", &digest[..DIGEST_LEN], url_basename(url)))
}

/// `<dir of raw>/converted-<raw name>`
pub fn converted_path(raw: &Path) -> PathBuf {
    let name = raw
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    raw.with_file_name(format!("converted-{name}"))
}

/// Default mesh file name: `mesh-<product_id>.<format>`.
pub fn mesh_filename(product_id: &str, format: MeshFormat) -> String {
    format!("mesh-{}.{}", sanitize(product_id), format.extension())
}

/// `<output_dir>/stat-<product_id>.json`
pub fn stat_path(output_dir: &Path, product_id: &str) -> PathBuf {
    output_dir.join(format!("stat-{}.json", sanitize(product_id)))
}

/// Last path segment of `url`, without query or fragment.
fn url_basename(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let segment = without_scheme
        .split_once('/')
        .map(|(_, path)| path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(""))
        .unwrap_or("");
    if segment.is_empty() {
        "download".to_string()
    } else {
        sanitize(segment)
    }
}

/// Replace characters that are unsafe in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
