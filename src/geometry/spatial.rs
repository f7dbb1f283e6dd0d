//! R-tree backed neighbour queries over point sets.

use rstar::RTree;
use rstar::primitives::GeomWithData;

use super::Point3;

/// A point tagged with its position in the source slice.
type IndexedPoint = GeomWithData<Point3, usize>;

/// Euclidean distance between two points.
pub(crate) fn distance(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Axis-aligned bounds `(min, max)` of a non-empty point set.
pub(crate) fn bounds(points: &[Point3]) -> Option<(Point3, Point3)> {
    let first = *points.first()?;
    let mut min = first;
    let mut max = first;
    for p in &points[1..] {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    Some((min, max))
}

/// Bulk-loaded R-tree over a point slice, answering queries with slice
/// indices.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn new(points: &[Point3]) -> Self {
        let items = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest point to `point` other than the one stored at `index`, with
    /// its distance.
    pub fn nearest_other(&self, index: usize, point: &Point3) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(point)
            .find(|(item, _)| item.data != index)
            .map(|(item, d2)| (item.data, d2.sqrt()))
    }

    /// All points within `radius` of `center`, closest first.
    pub fn within_radius(&self, center: &Point3, radius: f64) -> Vec<(usize, f64)> {
        let mut found: Vec<(usize, f64)> = self
            .tree
            .locate_within_distance(*center, radius * radius)
            .map(|item| (item.data, distance(center, item.geom())))
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }
}
