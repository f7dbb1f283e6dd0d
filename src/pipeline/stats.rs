//! Statistics written next to every mesh.

use serde::{Deserialize, Serialize};

/// Summary of the merged point set a mesh was built from.
///
/// Serialised as `{"id": ..., "shape": [points, dims], "average_distance": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Product the mesh was built for.
    pub id: String,
    /// `[point count, values per point]` of the merged record.
    pub shape: [usize; 2],
    /// Mean distance from each point to its nearest neighbour.
    pub average_distance: f64,
}

impl MeshStats {
    pub fn new(id: impl Into<String>, shape: [usize; 2], average_distance: f64) -> Self {
        Self {
            id: id.into(),
            shape,
            average_distance,
        }
    }
}

/// Arithmetic mean, zero for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
