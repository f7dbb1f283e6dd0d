//! The LAS to mesh task set.
//!
//! [`Pipeline`] owns the shared configuration and collaborators and
//! constructs every task, so all tasks of one run agree on naming and
//! settings:
//!
//! ```text
//! CreateMesh
//!  ├─ FetchMetadata                  (static)
//!  └─ ConvertPointFormat × sources   (dynamic, one batch)
//!      └─ FetchBinary                (static)
//! ```

mod convert;
mod download;
mod fetch;
mod mesh;
mod metadata;
pub mod paths;
mod stats;

pub use convert::ConvertPointFormat;
pub use download::FetchBinary;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use mesh::{CreateMesh, MeshRequest};
pub use metadata::{FetchMetadata, ProductMetadata};
pub use stats::MeshStats;

use std::path::Path;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::geometry::Geometry;

/// Factory for pipeline tasks.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    fetcher: Arc<dyn Fetcher>,
    geometry: Arc<dyn Geometry>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        geometry: Arc<dyn Geometry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            geometry,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn geometry(&self) -> Arc<dyn Geometry> {
        Arc::clone(&self.geometry)
    }

    /// Metadata fetch for `product_id`, stored under `work_dir`.
    pub fn fetch_metadata(&self, product_id: &str, work_dir: &Path) -> Arc<FetchMetadata> {
        Arc::new(FetchMetadata::new(
            product_id,
            self.config.metadata_url(product_id),
            paths::metadata_path(work_dir, product_id),
            Arc::clone(&self.fetcher),
            self.config.fetch_retry.clone(),
        ))
    }

    /// Download of `url` into `work_dir`.
    pub fn fetch_binary(&self, url: &str, work_dir: &Path) -> Arc<FetchBinary> {
        Arc::new(FetchBinary::new(
            url,
            paths::raw_path(work_dir, url),
            Arc::clone(&self.fetcher),
            self.config.fetch_retry.clone(),
        ))
    }

    /// Conversion of the download of `url`.
    pub fn convert(&self, url: &str, work_dir: &Path) -> Arc<ConvertPointFormat> {
        let source = self.fetch_binary(url, work_dir);
        let output = paths::converted_path(source.path());
        Arc::new(ConvertPointFormat::new(
            source,
            output,
            self.config.converter.clone(),
        ))
    }

    /// Mesh request for `product_id` using the configured defaults.
    pub fn mesh_request(&self, product_id: &str) -> MeshRequest {
        MeshRequest::new(product_id, &self.config)
    }

    /// Mesh build described by `request`.
    pub fn create_mesh(&self, request: MeshRequest) -> Arc<CreateMesh> {
        Arc::new(CreateMesh::new(request, self.clone()))
    }
}
