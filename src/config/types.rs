//! Configuration type definitions.
//!
//! [`PipelineConfig`] is an immutable value: it is loaded once, validated and
//! then shared (behind an `Arc`) by every task the pipeline constructs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::retry::{RetryCondition, RetryPolicy};
use crate::geometry::MeshFormat;

/// Default location of product metadata documents.
pub const DEFAULT_METADATA_URL_TEMPLATE: &str =
    "https://raw.githubusercontent.com/colspan/pcd-open-datasets/master/shizuokapcd/product/{product_id}.json";

/// Pipeline configuration (lasmesh.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// URL of a product's metadata; `{product_id}` is substituted.
    pub metadata_url_template: String,
    /// Directory for metadata, raw and converted point files.
    pub work_dir: PathBuf,
    /// Directory for meshes and stat files.
    pub output_dir: PathBuf,
    /// Default mesh file format.
    pub file_format: MeshFormat,
    /// Default reconstruction algorithm.
    pub mesh_type: MeshType,
    /// Default simplification.
    pub simplify_type: SimplifyType,
    /// Fraction of points kept from each source, in `(0, 1]`.
    pub sampling_rate: f64,
    /// Worker pool size.
    pub max_workers: usize,
    /// External point format normaliser.
    pub converter: ConverterConfig,
    /// Retry policy applied to fetch tasks.
    pub fetch_retry: RetryPolicy,
    /// Reconstruction constants.
    pub reconstruction: ReconstructionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_url_template: DEFAULT_METADATA_URL_TEMPLATE.to_string(),
            work_dir: PathBuf::from("tmp/work"),
            output_dir: PathBuf::from("tmp/mesh"),
            file_format: MeshFormat::Ply,
            mesh_type: MeshType::Poisson,
            simplify_type: SimplifyType::None,
            sampling_rate: 0.5,
            max_workers: 4,
            converter: ConverterConfig::default(),
            fetch_retry: RetryPolicy::fixed(3, Duration::from_secs(1))
                .with_condition(RetryCondition::TransientOnly),
            reconstruction: ReconstructionParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Metadata URL for a product.
    pub fn metadata_url(&self, product_id: &str) -> String {
        self.metadata_url_template
            .replace("{product_id}", product_id)
    }
}

/// External normaliser invocation.
///
/// `args` may contain the placeholders `{input}`, `{output}` and `{version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Program to execute.
    pub program: String,
    /// Argument template.
    pub args: Vec<String>,
    /// Target point format version.
    pub version: String,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "las2las".to_string(),
            args: ["-f", "{version}", "{input}", "{output}"]
                .into_iter()
                .map(String::from)
                .collect(),
            version: "1.0".to_string(),
            timeout_secs: None,
        }
    }
}

/// Constants of the reconstruction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParams {
    /// Voxel size as a multiple of the mean nearest-neighbour distance.
    pub voxel_multiplier: f64,
    /// Maximum neighbours considered by normal estimation.
    pub normal_max_neighbors: usize,
    /// Point normals are oriented toward this location.
    pub camera_location: [f64; 3],
    /// Octree depth of Poisson reconstruction.
    pub poisson_depth: u32,
    /// Ball-pivoting radii as multiples of the voxel size.
    pub ball_pivoting_radii: Vec<f64>,
    /// Vertex clustering cell as a multiple of the voxel size.
    pub clustering_multiplier: f64,
    /// Quadric decimation target as a fraction of the point count.
    pub decimation_ratio: f64,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            voxel_multiplier: 3.0,
            normal_max_neighbors: 30,
            camera_location: [0.0, 0.0, 10000.0],
            poisson_depth: 11,
            ball_pivoting_radii: vec![0.5, 1.0, 2.0, 4.0, 8.0, 16.0],
            clustering_multiplier: 1.1,
            decimation_ratio: 0.5,
        }
    }
}

/// Surface reconstruction algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeshType {
    #[default]
    Poisson,
    BallPivoting,
}

/// Mesh simplification applied after reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimplifyType {
    #[default]
    None,
    QuadricDecimation,
    VertexClustering,
}

impl MeshType {
    /// Parameter spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshType::Poisson => "poisson",
            MeshType::BallPivoting => "ball-pivoting",
        }
    }
}

impl SimplifyType {
    /// Parameter spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimplifyType::None => "none",
            SimplifyType::QuadricDecimation => "quadric-decimation",
            SimplifyType::VertexClustering => "vertex-clustering",
        }
    }
}

impl fmt::Display for MeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SimplifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poisson" => Ok(MeshType::Poisson),
            "ball-pivoting" | "ball_pivoting" => Ok(MeshType::BallPivoting),
            other => Err(format!(
                "unknown mesh type '{other}' (expected poisson or ball-pivoting)"
            )),
        }
    }
}

impl FromStr for SimplifyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SimplifyType::None),
            "quadric-decimation" | "quadric_decimation" => Ok(SimplifyType::QuadricDecimation),
            "vertex-clustering" | "vertex_clustering" => Ok(SimplifyType::VertexClustering),
            other => Err(format!(
                "unknown simplify type '{other}' (expected none, quadric-decimation or vertex-clustering)"
            )),
        }
    }
}
