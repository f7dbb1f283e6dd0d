//! Point cloud and mesh geometry.
//!
//! The reconstruction task talks to geometry through the [`Geometry`] trait so
//! the backend can be swapped. [`NativeGeometry`] is the built-in pure-Rust
//! backend.

mod mesh_io;
mod native;
mod spatial;

pub use mesh_io::{write_obj, write_ply_ascii};
pub use native::NativeGeometry;
pub use spatial::PointIndex;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

/// A point or vector in 3D space.
pub type Point3 = [f64; 3];

/// Errors raised by geometry operations.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The operation needs more input than it was given.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A parameter is out of range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Writing a mesh failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A set of points with optional per-point normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3>,
    /// Empty, or one unit normal per point.
    pub normals: Vec<Point3>,
}

impl PointCloud {
    /// Create a cloud without normals.
    pub fn from_points(points: Vec<Point3>) -> Self {
        Self {
            points,
            normals: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether every point carries a normal.
    pub fn has_normals(&self) -> bool {
        !self.points.is_empty() && self.normals.len() == self.points.len()
    }
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3>,
    /// Empty, or one normal per vertex.
    pub vertex_normals: Vec<Point3>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn has_vertex_normals(&self) -> bool {
        !self.vertices.is_empty() && self.vertex_normals.len() == self.vertices.len()
    }
}

/// Mesh serialisation format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    /// ASCII Stanford PLY.
    #[default]
    Ply,
    /// Wavefront OBJ.
    Obj,
}

impl MeshFormat {
    /// File extension (also the parameter spelling).
    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Ply => "ply",
            MeshFormat::Obj => "obj",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MeshFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ply" => Ok(MeshFormat::Ply),
            "obj" => Ok(MeshFormat::Obj),
            other => Err(format!("unknown file format '{other}' (expected ply or obj)")),
        }
    }
}

/// Geometry operations used by mesh reconstruction.
///
/// Implementations are synchronous and CPU-bound; callers run them on the
/// blocking pool.
pub trait Geometry: Send + Sync {
    /// Distance from every point to its nearest other point.
    fn nearest_neighbor_distances(&self, cloud: &PointCloud) -> Result<Vec<f64>, GeometryError>;

    /// Replace the points of every occupied voxel by their centroid.
    fn voxel_down_sample(&self, cloud: &PointCloud, voxel: f64)
    -> Result<PointCloud, GeometryError>;

    /// Estimate unit normals from up to `max_neighbors` neighbours within `radius`.
    fn estimate_normals(
        &self,
        cloud: &mut PointCloud,
        radius: f64,
        max_neighbors: usize,
    ) -> Result<(), GeometryError>;

    /// Flip normals so they face `camera`.
    fn orient_normals_towards(
        &self,
        cloud: &mut PointCloud,
        camera: Point3,
    ) -> Result<(), GeometryError>;

    /// Reconstruct a closed-surface approximation at the given octree depth.
    fn poisson(&self, cloud: &PointCloud, depth: u32) -> Result<TriangleMesh, GeometryError>;

    /// Reconstruct a surface by pivoting balls of the given radii.
    fn ball_pivoting(&self, cloud: &PointCloud, radii: &[f64])
    -> Result<TriangleMesh, GeometryError>;

    /// Reduce the mesh to at most `target_triangles` triangles.
    fn simplify_quadric_decimation(
        &self,
        mesh: &TriangleMesh,
        target_triangles: usize,
    ) -> Result<TriangleMesh, GeometryError>;

    /// Merge all vertices within each voxel of size `voxel`.
    fn simplify_vertex_clustering(
        &self,
        mesh: &TriangleMesh,
        voxel: f64,
    ) -> Result<TriangleMesh, GeometryError>;

    /// Serialise `mesh` in `format`.
    fn write_mesh(
        &self,
        mesh: &TriangleMesh,
        format: MeshFormat,
        out: &mut dyn Write,
    ) -> Result<(), GeometryError>;
}
