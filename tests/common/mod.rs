//! Common test utilities shared across integration tests.

use lasmesh::config::ConverterConfig;
use lasmesh::testing::{MemoryFetcher, las_bytes, terrain};
use lasmesh::{NativeGeometry, Pipeline, PipelineConfig, RetryCondition, RetryPolicy};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Samples per side of each synthetic source tile.
pub const TILE_SIDE: usize = 12;

/// Sandbox with an in-memory remote and scratch directories.
pub struct Fixture {
    pub dir: TempDir,
    pub fetcher: Arc<MemoryFetcher>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            fetcher: Arc::new(MemoryFetcher::new()),
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("mesh")
    }

    /// Configuration pointing every location into the sandbox.
    pub fn config(&self, converter: ConverterConfig) -> PipelineConfig {
        PipelineConfig {
            metadata_url_template: "memory://products/{product_id}.json".to_string(),
            work_dir: self.work_dir(),
            output_dir: self.output_dir(),
            converter,
            fetch_retry: RetryPolicy::fixed(2, Duration::from_millis(1))
                .with_condition(RetryCondition::TransientOnly),
            ..PipelineConfig::default()
        }
    }

    pub fn pipeline(&self, converter: ConverterConfig) -> Pipeline {
        Pipeline::new(
            self.config(converter),
            self.fetcher.clone(),
            Arc::new(NativeGeometry),
        )
    }

    /// Publish a product whose sources are adjacent terrain tiles named
    /// `<name>.las`. Returns the source URLs.
    pub fn publish_product(&self, product_id: &str, names: &[&str]) -> Vec<String> {
        let urls: Vec<String> = names
            .iter()
            .map(|name| format!("memory://tiles/{product_id}/{name}.las"))
            .collect();
        for (i, url) in urls.iter().enumerate() {
            let origin = [(i * TILE_SIDE) as f64, 0.0];
            self.fetcher
                .insert(url.clone(), las_bytes(&terrain(TILE_SIDE, 1.0, origin)));
        }
        let metadata = serde_json::json!({ "lasUrls": { "value": urls } });
        self.fetcher.insert(
            self.metadata_url(product_id),
            serde_json::to_vec(&metadata).unwrap(),
        );
        urls
    }

    pub fn metadata_url(&self, product_id: &str) -> String {
        format!("memory://products/{product_id}.json")
    }
}

/// Contents of every file below `root`, keyed by relative path.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let bytes = std::fs::read(&path).unwrap();
                files.insert(path.strip_prefix(root).unwrap().to_path_buf(), bytes);
            }
        }
    }
    files
}
