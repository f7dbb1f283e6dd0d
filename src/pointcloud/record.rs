//! Sampled point rows.

use crate::geometry::{Point3, PointCloud};

/// Number of values per row: x, y, z, intensity.
pub const DIMENSIONS: usize = 4;

/// One `[x, y, z, intensity]` row.
pub type PointRow = [f64; DIMENSIONS];

/// A table of point rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointRecord {
    rows: Vec<PointRow>,
}

impl PointRecord {
    pub fn new(rows: Vec<PointRow>) -> Self {
        Self { rows }
    }

    /// Concatenate records in order.
    pub fn concat(records: impl IntoIterator<Item = PointRecord>) -> Self {
        let mut rows = Vec::new();
        for record in records {
            rows.extend(record.rows);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[PointRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `[row count, values per row]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.rows.len(), DIMENSIONS]
    }

    /// Positions only, as a point cloud without normals.
    pub fn to_point_cloud(&self) -> PointCloud {
        PointCloud::from_points(
            self.rows
                .iter()
                .map(|r| -> Point3 { [r[0], r[1], r[2]] })
                .collect(),
        )
    }
}

/// Number of rows kept when sampling `total` rows at `rate`.
///
/// Rates at or above 1 keep everything; non-positive rates keep nothing.
pub fn sampled_len(total: usize, rate: f64) -> usize {
    if rate.is_nan() || rate <= 0.0 {
        0
    } else if rate >= 1.0 {
        total
    } else {
        ((total as f64 * rate).ceil() as usize).min(total)
    }
}

/// Indices kept when sampling `total` rows at `rate`, evenly strided from
/// the first row.
pub fn sample_indices(total: usize, rate: f64) -> impl Iterator<Item = usize> {
    let kept = sampled_len(total, rate);
    let stride = if kept == total { 1.0 } else { 1.0 / rate };
    (0..kept).map(move |k| ((k as f64 * stride) as usize).min(total.saturating_sub(1)))
}
