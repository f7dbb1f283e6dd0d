//! Surface reconstruction task.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::Pipeline;
use super::metadata::{FetchMetadata, ProductMetadata};
use super::paths;
use super::stats::{MeshStats, mean};
use crate::config::{MeshType, PipelineConfig, ReconstructionParams, SimplifyType};
use crate::core::context::TaskContext;
use crate::core::target::{Artifact, BinaryTarget, Target, TextTarget};
use crate::core::task::{Task, TaskError};
use crate::core::types::Params;
use crate::geometry::{Geometry, GeometryError, MeshFormat, TriangleMesh};
use crate::pointcloud::{PointRecord, read_las};

/// Parameters of a mesh build.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRequest {
    pub product_id: String,
    pub output_dir: PathBuf,
    /// Defaults to `mesh-<product_id>.<file_format>`.
    pub output_filename: Option<String>,
    pub work_dir: PathBuf,
    pub file_format: MeshFormat,
    pub mesh_type: MeshType,
    pub simplify_type: SimplifyType,
}

impl MeshRequest {
    /// Request for `product_id` with every other parameter taken from `config`.
    pub fn new(product_id: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            product_id: product_id.into(),
            output_dir: config.output_dir.clone(),
            output_filename: None,
            work_dir: config.work_dir.clone(),
            file_format: config.file_format,
            mesh_type: config.mesh_type,
            simplify_type: config.simplify_type,
        }
    }

    /// Location of the mesh file. Reconstruction and simplification variants
    /// share it unless `output_filename` tells them apart.
    pub fn mesh_path(&self) -> PathBuf {
        let name = self
            .output_filename
            .clone()
            .unwrap_or_else(|| paths::mesh_filename(&self.product_id, self.file_format));
        self.output_dir.join(name)
    }

    /// Location of the stat file.
    pub fn stat_path(&self) -> PathBuf {
        paths::stat_path(&self.output_dir, &self.product_id)
    }
}

/// Builds a mesh and its stat file from every source of a product.
///
/// The metadata fetch is a static dependency. The conversions are only known
/// once the metadata is read, so they are required as one batch while the
/// task runs.
pub struct CreateMesh {
    request: MeshRequest,
    metadata: Arc<FetchMetadata>,
    pipeline: Pipeline,
}

impl CreateMesh {
    pub(crate) fn new(request: MeshRequest, pipeline: Pipeline) -> Self {
        let metadata = pipeline.fetch_metadata(&request.product_id, &request.work_dir);
        Self {
            request,
            metadata,
            pipeline,
        }
    }

    pub fn request(&self) -> &MeshRequest {
        &self.request
    }

    pub fn mesh_target(&self) -> BinaryTarget {
        BinaryTarget::new(self.request.mesh_path())
    }

    pub fn stat_target(&self) -> TextTarget {
        TextTarget::new(self.request.stat_path())
    }
}

#[async_trait]
impl Task for CreateMesh {
    fn family(&self) -> &'static str {
        "CreateMesh"
    }

    fn params(&self) -> Params {
        let r = &self.request;
        Params::new()
            .with("product_id", &r.product_id)
            .with("output_dir", r.output_dir.display())
            .with_optional("output_filename", r.output_filename.as_ref())
            .with("work_dir", r.work_dir.display())
            .with("file_format", r.file_format)
            .with("mesh_type", r.mesh_type)
            .with("simplify_type", r.simplify_type)
    }

    fn dependencies(&self) -> Vec<Arc<dyn Task>> {
        vec![self.metadata.clone() as Arc<dyn Task>]
    }

    fn outputs(&self) -> Vec<Target> {
        vec![
            Target::Binary(self.mesh_target()),
            Target::Text(self.stat_target()),
        ]
    }

    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let product = &self.request.product_id;
        let metadata: ProductMetadata = ctx
            .input(0)?
            .iter()
            .find_map(Target::as_text)
            .ok_or_else(|| TaskError::MissingOutput(self.metadata.path().to_path_buf()))?
            .read_json()?;
        if metadata.source_urls().is_empty() {
            return Err(TaskError::Decode(format!(
                "product {product} lists no source files"
            )));
        }

        let conversions: Vec<Arc<dyn Task>> = metadata
            .source_urls()
            .iter()
            .map(|url| self.pipeline.convert(url, &self.request.work_dir) as Arc<dyn Task>)
            .collect();
        info!(product = %product, sources = conversions.len(), "Requiring converted sources");
        let converted = ctx.require(conversions).await?;

        let sources: Vec<PathBuf> = converted
            .iter()
            .filter_map(|targets| targets.first())
            .map(|t| t.path().to_path_buf())
            .collect();

        let job = Reconstruction {
            product_id: product.clone(),
            sources,
            sampling_rate: self.pipeline.config().sampling_rate,
            params: self.pipeline.config().reconstruction.clone(),
            mesh_type: self.request.mesh_type,
            simplify_type: self.request.simplify_type,
            file_format: self.request.file_format,
            mesh: self.mesh_target(),
            stats: self.stat_target(),
            geometry: self.pipeline.geometry(),
        };
        let span = tracing::Span::current();
        let summary = tokio::task::spawn_blocking(move || span.in_scope(|| job.run()))
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("reconstruction panicked: {e}")))??;

        info!(
            product = %product,
            points = summary.points,
            vertices = summary.vertices,
            triangles = summary.triangles,
            mesh = %self.request.mesh_path().display(),
            "Mesh written"
        );
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        Some("Reconstruct a surface mesh from a product's point files")
    }
}

/// Counts reported after a reconstruction.
#[derive(Debug, Clone, Copy)]
struct Summary {
    points: usize,
    vertices: usize,
    triangles: usize,
}

/// CPU-bound part of [`CreateMesh`], run on the blocking pool.
struct Reconstruction {
    product_id: String,
    sources: Vec<PathBuf>,
    sampling_rate: f64,
    params: ReconstructionParams,
    mesh_type: MeshType,
    simplify_type: SimplifyType,
    file_format: MeshFormat,
    mesh: BinaryTarget,
    stats: TextTarget,
    geometry: Arc<dyn Geometry>,
}

impl Reconstruction {
    fn run(self) -> Result<Summary, TaskError> {
        let record = PointRecord::concat(
            self.sources
                .iter()
                .map(|path| read_las(path, self.sampling_rate))
                .collect::<Result<Vec<_>, _>>()?,
        );
        if record.is_empty() {
            return Err(GeometryError::EmptyInput(format!(
                "no points decoded for product {}",
                self.product_id
            ))
            .into());
        }
        debug!(points = record.len(), sources = self.sources.len(), "Merged point records");

        let cloud = record.to_point_cloud();
        let average = mean(&self.geometry.nearest_neighbor_distances(&cloud)?);
        self.stats
            .write_json(&MeshStats::new(&self.product_id, record.shape(), average))?;
        debug!(average_distance = average, path = %self.stats.path().display(), "Stats written");

        let voxel = average * self.params.voxel_multiplier;
        let mut down = self.geometry.voxel_down_sample(&cloud, voxel)?;
        self.geometry
            .estimate_normals(&mut down, voxel, self.params.normal_max_neighbors)?;
        self.geometry
            .orient_normals_towards(&mut down, self.params.camera_location)?;
        debug!(voxel, points = down.len(), "Prepared oriented cloud");

        let mesh = match self.mesh_type {
            MeshType::Poisson => self.geometry.poisson(&down, self.params.poisson_depth)?,
            MeshType::BallPivoting => {
                let radii: Vec<f64> = self
                    .params
                    .ball_pivoting_radii
                    .iter()
                    .map(|r| r * voxel)
                    .collect();
                self.geometry.ball_pivoting(&down, &radii)?
            }
        };
        let mesh = self.simplify(mesh, record.len(), voxel)?;

        let mut writer = self.mesh.open_write()?;
        self.geometry
            .write_mesh(&mesh, self.file_format, &mut writer)?;
        writer.commit()?;

        Ok(Summary {
            points: record.len(),
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
        })
    }

    fn simplify(
        &self,
        mesh: TriangleMesh,
        points: usize,
        voxel: f64,
    ) -> Result<TriangleMesh, GeometryError> {
        match self.simplify_type {
            SimplifyType::None => Ok(mesh),
            SimplifyType::QuadricDecimation => {
                let target = ((points as f64 * self.params.decimation_ratio) as usize).max(1);
                self.geometry.simplify_quadric_decimation(&mesh, target)
            }
            SimplifyType::VertexClustering => self
                .geometry
                .simplify_vertex_clustering(&mesh, voxel * self.params.clustering_multiplier),
        }
    }
}
