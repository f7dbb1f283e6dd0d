//! Pure-Rust geometry backend.
//!
//! Surfaces are reconstructed as 2.5D height fields over the XY plane, which
//! fits airborne and terrestrial survey data where every column holds one
//! surface. Results are deterministic: every grouping step iterates cells in
//! sorted order.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use super::spatial::{PointIndex, bounds, distance};
use super::{Geometry, GeometryError, MeshFormat, Point3, PointCloud, TriangleMesh, mesh_io};

/// Maximum Poisson depth accepted.
const MAX_POISSON_DEPTH: u32 = 16;

/// Built-in geometry backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGeometry;

impl NativeGeometry {
    pub fn new() -> Self {
        Self
    }
}

impl Geometry for NativeGeometry {
    fn nearest_neighbor_distances(&self, cloud: &PointCloud) -> Result<Vec<f64>, GeometryError> {
        if cloud.is_empty() {
            return Err(GeometryError::EmptyInput("point cloud has no points".into()));
        }
        let index = PointIndex::new(&cloud.points);
        Ok(cloud
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| index.nearest_other(i, p).map(|(_, d)| d).unwrap_or(0.0))
            .collect())
    }

    fn voxel_down_sample(
        &self,
        cloud: &PointCloud,
        voxel: f64,
    ) -> Result<PointCloud, GeometryError> {
        positive("voxel", voxel)?;
        let Some((origin, _)) = bounds(&cloud.points) else {
            return Ok(PointCloud::default());
        };

        let with_normals = cloud.has_normals();
        let mut voxels: BTreeMap<[i64; 3], Accumulator> = BTreeMap::new();
        for (i, p) in cloud.points.iter().enumerate() {
            let normal = with_normals.then(|| cloud.normals[i]);
            voxels
                .entry(cell_key(p, &origin, voxel))
                .or_default()
                .add(p, normal.as_ref());
        }

        let mut out = PointCloud::default();
        for acc in voxels.values() {
            out.points.push(acc.mean());
            if with_normals {
                out.normals.push(acc.mean_normal());
            }
        }
        Ok(out)
    }

    fn estimate_normals(
        &self,
        cloud: &mut PointCloud,
        radius: f64,
        max_neighbors: usize,
    ) -> Result<(), GeometryError> {
        positive("radius", radius)?;
        if max_neighbors == 0 {
            return Err(GeometryError::InvalidParameter {
                name: "max_neighbors",
                reason: "must be at least 1".into(),
            });
        }

        let index = PointIndex::new(&cloud.points);
        let normals = cloud
            .points
            .iter()
            .map(|p| {
                let neighbours: Vec<usize> = index
                    .within_radius(p, radius)
                    .into_iter()
                    .take(max_neighbors)
                    .map(|(j, _)| j)
                    .collect();
                if neighbours.len() < 3 {
                    return [0.0, 0.0, 1.0];
                }
                let (values, vectors) = symmetric_eigen(covariance(&cloud.points, &neighbours));
                let smallest = (0..3)
                    .min_by(|a, b| values[*a].total_cmp(&values[*b]))
                    .unwrap_or(2);
                let mut n = normalize([
                    vectors[0][smallest],
                    vectors[1][smallest],
                    vectors[2][smallest],
                ]);
                if n[2] < 0.0 {
                    n = scale(&n, -1.0);
                }
                n
            })
            .collect();

        cloud.normals = normals;
        Ok(())
    }

    fn orient_normals_towards(
        &self,
        cloud: &mut PointCloud,
        camera: Point3,
    ) -> Result<(), GeometryError> {
        require_normals(cloud)?;
        for (p, n) in cloud.points.iter().zip(cloud.normals.iter_mut()) {
            if dot(n, &sub(&camera, p)) < 0.0 {
                *n = scale(n, -1.0);
            }
        }
        Ok(())
    }

    fn poisson(&self, cloud: &PointCloud, depth: u32) -> Result<TriangleMesh, GeometryError> {
        if depth == 0 || depth > MAX_POISSON_DEPTH {
            return Err(GeometryError::InvalidParameter {
                name: "depth",
                reason: format!("must be in 1..={MAX_POISSON_DEPTH}, got {depth}"),
            });
        }
        surface_input(cloud)?;

        let (min, max) = bounds(&cloud.points).unwrap_or(([0.0; 3], [0.0; 3]));
        let extent = (max[0] - min[0]).max(max[1] - min[1]);
        let finest = extent / f64::from(1u32 << depth);
        let cell = finest.max(1.5 * planar_spacing(&cloud.points));

        let mut columns: BTreeMap<(i64, i64), Accumulator> = BTreeMap::new();
        for (p, n) in cloud.points.iter().zip(&cloud.normals) {
            columns
                .entry(column_key(p, &min, cell))
                .or_default()
                .add(p, Some(n));
        }

        let mut mesh = TriangleMesh::default();
        let mut index = BTreeMap::new();
        for (key, acc) in &columns {
            index.insert(*key, mesh.vertices.len());
            mesh.vertices.push(acc.mean());
            mesh.vertex_normals.push(acc.mean_normal());
        }
        mesh.triangles = triangulate_columns(&index, &mesh.vertices, None);
        Ok(mesh)
    }

    fn ball_pivoting(
        &self,
        cloud: &PointCloud,
        radii: &[f64],
    ) -> Result<TriangleMesh, GeometryError> {
        if radii.is_empty() {
            return Err(GeometryError::InvalidParameter {
                name: "radii",
                reason: "at least one radius is required".into(),
            });
        }
        for r in radii {
            positive("radii", *r)?;
        }
        surface_input(cloud)?;

        let smallest = radii.iter().copied().fold(f64::INFINITY, f64::min);
        let largest = radii.iter().copied().fold(0.0, f64::max);
        let (min, _) = bounds(&cloud.points).unwrap_or(([0.0; 3], [0.0; 3]));
        let cell = (2.0 * smallest).max(1.5 * planar_spacing(&cloud.points));

        // representative: the input point closest to its column centre
        let mut columns: BTreeMap<(i64, i64), (usize, f64)> = BTreeMap::new();
        for (i, p) in cloud.points.iter().enumerate() {
            let key = column_key(p, &min, cell);
            let centre = [
                min[0] + (key.0 as f64 + 0.5) * cell,
                min[1] + (key.1 as f64 + 0.5) * cell,
            ];
            let d = (p[0] - centre[0]).hypot(p[1] - centre[1]);
            columns
                .entry(key)
                .and_modify(|best| {
                    if d < best.1 {
                        *best = (i, d);
                    }
                })
                .or_insert((i, d));
        }

        let mut mesh = TriangleMesh::default();
        let mut index = BTreeMap::new();
        for (key, (i, _)) in &columns {
            index.insert(*key, mesh.vertices.len());
            mesh.vertices.push(cloud.points[*i]);
            mesh.vertex_normals.push(cloud.normals[*i]);
        }
        mesh.triangles = triangulate_columns(&index, &mesh.vertices, Some(2.0 * largest));
        Ok(mesh)
    }

    /// Approximated by progressively coarser vertex clustering until the
    /// triangle budget is met.
    fn simplify_quadric_decimation(
        &self,
        mesh: &TriangleMesh,
        target_triangles: usize,
    ) -> Result<TriangleMesh, GeometryError> {
        if target_triangles == 0 {
            return Err(GeometryError::InvalidParameter {
                name: "target_triangles",
                reason: "must be at least 1".into(),
            });
        }
        if mesh.triangle_count() <= target_triangles {
            return Ok(mesh.clone());
        }

        let (min, max) = bounds(&mesh.vertices).unwrap_or(([0.0; 3], [0.0; 3]));
        let diagonal = distance(&min, &max);
        let mut voxel = (diagonal / (target_triangles as f64).sqrt() / 4.0).max(1e-9);

        let mut simplified = cluster_vertices(mesh, voxel);
        for _ in 0..64 {
            if simplified.triangle_count() <= target_triangles {
                break;
            }
            voxel *= 1.5;
            simplified = cluster_vertices(mesh, voxel);
        }
        Ok(simplified)
    }

    fn simplify_vertex_clustering(
        &self,
        mesh: &TriangleMesh,
        voxel: f64,
    ) -> Result<TriangleMesh, GeometryError> {
        positive("voxel", voxel)?;
        Ok(cluster_vertices(mesh, voxel))
    }

    fn write_mesh(
        &self,
        mesh: &TriangleMesh,
        format: MeshFormat,
        out: &mut dyn Write,
    ) -> Result<(), GeometryError> {
        match format {
            MeshFormat::Ply => mesh_io::write_ply_ascii(mesh, out),
            MeshFormat::Obj => mesh_io::write_obj(mesh, out),
        }
    }
}

/// Running sums of positions and normals.
#[derive(Debug, Default)]
struct Accumulator {
    sum: Point3,
    normal_sum: Point3,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, p: &Point3, normal: Option<&Point3>) {
        self.sum = add(&self.sum, p);
        if let Some(n) = normal {
            self.normal_sum = add(&self.normal_sum, n);
        }
        self.count += 1;
    }

    fn mean(&self) -> Point3 {
        scale(&self.sum, 1.0 / self.count.max(1) as f64)
    }

    fn mean_normal(&self) -> Point3 {
        let n = normalize(self.normal_sum);
        if n == [0.0; 3] { [0.0, 0.0, 1.0] } else { n }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

fn require_normals(cloud: &PointCloud) -> Result<(), GeometryError> {
    if cloud.has_normals() {
        Ok(())
    } else {
        Err(GeometryError::InvalidParameter {
            name: "cloud",
            reason: "point normals are required".into(),
        })
    }
}

fn surface_input(cloud: &PointCloud) -> Result<(), GeometryError> {
    if cloud.len() < 3 {
        return Err(GeometryError::EmptyInput(format!(
            "surface reconstruction needs at least 3 points, got {}",
            cloud.len()
        )));
    }
    require_normals(cloud)
}

/// Mean point spacing over the XY footprint.
fn planar_spacing(points: &[Point3]) -> f64 {
    let Some((min, max)) = bounds(points) else {
        return 0.0;
    };
    let area = (max[0] - min[0]) * (max[1] - min[1]);
    (area / points.len().max(1) as f64).sqrt()
}

fn cell_key(p: &Point3, origin: &Point3, size: f64) -> [i64; 3] {
    [
        ((p[0] - origin[0]) / size).floor() as i64,
        ((p[1] - origin[1]) / size).floor() as i64,
        ((p[2] - origin[2]) / size).floor() as i64,
    ]
}

fn column_key(p: &Point3, origin: &Point3, size: f64) -> (i64, i64) {
    (
        ((p[0] - origin[0]) / size).floor() as i64,
        ((p[1] - origin[1]) / size).floor() as i64,
    )
}

/// Triangulate occupied columns: two triangles per full 2x2 block, one per
/// block with three occupied corners. Triangles are counter-clockwise seen
/// from +Z.
fn triangulate_columns(
    index: &BTreeMap<(i64, i64), usize>,
    vertices: &[Point3],
    max_edge: Option<f64>,
) -> Vec<[usize; 3]> {
    let mut triangles = Vec::new();
    let mut emit = |t: [usize; 3]| {
        if let Some(limit) = max_edge {
            let [a, b, c] = t;
            if distance(&vertices[a], &vertices[b]) > limit
                || distance(&vertices[b], &vertices[c]) > limit
                || distance(&vertices[c], &vertices[a]) > limit
            {
                return;
            }
        }
        triangles.push(t);
    };

    for &(i, j) in index.keys() {
        for (di, dj) in [(-1, -1), (0, -1), (-1, 0), (0, 0)] {
            // each block is visited once, from its lowest occupied corner
            let (bi, bj) = (i + di, j + dj);
            let corners = [
                index.get(&(bi, bj)).copied(),
                index.get(&(bi + 1, bj)).copied(),
                index.get(&(bi, bj + 1)).copied(),
                index.get(&(bi + 1, bj + 1)).copied(),
            ];
            let first_occupied = [(bi, bj), (bi + 1, bj), (bi, bj + 1), (bi + 1, bj + 1)]
                .into_iter()
                .zip(corners)
                .find(|(_, c)| c.is_some())
                .map(|(k, _)| k);
            if first_occupied != Some((i, j)) {
                continue;
            }
            match corners {
                [Some(a), Some(b), Some(c), Some(d)] => {
                    emit([a, b, d]);
                    emit([a, d, c]);
                }
                [None, Some(b), Some(c), Some(d)] => emit([b, d, c]),
                [Some(a), None, Some(c), Some(d)] => emit([a, d, c]),
                [Some(a), Some(b), None, Some(d)] => emit([a, b, d]),
                [Some(a), Some(b), Some(c), None] => emit([a, b, c]),
                _ => {}
            }
        }
    }
    triangles
}

/// Merge vertices sharing a voxel; drop collapsed and duplicate triangles.
fn cluster_vertices(mesh: &TriangleMesh, voxel: f64) -> TriangleMesh {
    let Some((origin, _)) = bounds(&mesh.vertices) else {
        return mesh.clone();
    };
    let with_normals = mesh.has_vertex_normals();

    let keys: Vec<[i64; 3]> = mesh
        .vertices
        .iter()
        .map(|v| cell_key(v, &origin, voxel))
        .collect();
    let mut clusters: BTreeMap<[i64; 3], Accumulator> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        let normal = with_normals.then(|| mesh.vertex_normals[i]);
        clusters
            .entry(*key)
            .or_default()
            .add(&mesh.vertices[i], normal.as_ref());
    }

    let mut out = TriangleMesh::default();
    let mut new_index = BTreeMap::new();
    for (key, acc) in &clusters {
        new_index.insert(*key, out.vertices.len());
        out.vertices.push(acc.mean());
        if with_normals {
            out.vertex_normals.push(acc.mean_normal());
        }
    }

    let mut seen = HashSet::new();
    for t in &mesh.triangles {
        let mapped = t.map(|v| new_index[&keys[v]]);
        let [a, b, c] = mapped;
        if a == b || b == c || c == a {
            continue;
        }
        let mut canonical = mapped;
        canonical.sort_unstable();
        if seen.insert(canonical) {
            out.triangles.push(mapped);
        }
    }
    out
}

fn covariance(points: &[Point3], indices: &[usize]) -> [[f64; 3]; 3] {
    let n = indices.len() as f64;
    let mut mean = [0.0; 3];
    for &i in indices {
        mean = add(&mean, &points[i]);
    }
    mean = scale(&mean, 1.0 / n);

    let mut cov = [[0.0; 3]; 3];
    for &i in indices {
        let d = sub(&points[i], &mean);
        for r in 0..3 {
            for c in 0..3 {
                cov[r][c] += d[r] * d[c] / n;
            }
        }
    }
    cov
}

/// Eigen decomposition of a symmetric 3x3 matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues and a matrix whose column `i` is the eigenvector
/// of eigenvalue `i`.
fn symmetric_eigen(mut a: [[f64; 3]; 3]) -> ([f64; 3], [[f64; 3]; 3]) {
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    for _ in 0..50 {
        let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off < 1e-30 {
            break;
        }
        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            if a[p][q].abs() < 1e-300 {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            for row in a.iter_mut() {
                let (kp, kq) = (row[p], row[q]);
                row[p] = c * kp - s * kq;
                row[q] = s * kp + c * kq;
            }
            for k in 0..3 {
                let (pk, qk) = (a[p][k], a[q][k]);
                a[p][k] = c * pk - s * qk;
                a[q][k] = s * pk + c * qk;
            }
            for row in v.iter_mut() {
                let (kp, kq) = (row[p], row[q]);
                row[p] = c * kp - s * kq;
                row[q] = s * kp + c * kq;
            }
        }
    }
    ([a[0][0], a[1][1], a[2][2]], v)
}

fn add(a: &Point3, b: &Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub(a: &Point3, b: &Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: &Point3, k: f64) -> Point3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn dot(a: &Point3, b: &Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(a: Point3) -> Point3 {
    let len = dot(&a, &a).sqrt();
    if len > 0.0 { scale(&a, 1.0 / len) } else { [0.0; 3] }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(n: usize, spacing: f64, height: impl Fn(f64, f64) -> f64) -> PointCloud {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f64 * spacing, j as f64 * spacing);
                points.push([x, y, height(x, y)]);
            }
        }
        PointCloud::from_points(points)
    }

    fn with_normals(mut cloud: PointCloud) -> PointCloud {
        NativeGeometry
            .estimate_normals(&mut cloud, 1.5, 30)
            .unwrap();
        cloud
    }

    fn assert_valid(mesh: &TriangleMesh) {
        for t in &mesh.triangles {
            assert!(t.iter().all(|v| *v < mesh.vertex_count()), "{t:?}");
            assert!(t[0] != t[1] && t[1] != t[2] && t[0] != t[2], "{t:?}");
        }
    }

    #[test]
    fn test_nearest_neighbor_distances() {
        let cloud = lattice(6, 0.5, |_, _| 0.0);

        let distances = NativeGeometry.nearest_neighbor_distances(&cloud).unwrap();

        assert_eq!(distances.len(), 36);
        assert!(distances.iter().all(|d| (d - 0.5).abs() < 1e-9));
    }

    #[test]
    fn test_nearest_neighbor_distance_of_far_outlier() {
        let mut cloud = lattice(100, 1.0, |_, _| 0.0);
        cloud.points.push([50.0, 50.0, 1000.0]);

        let distances = NativeGeometry.nearest_neighbor_distances(&cloud).unwrap();

        assert_eq!(distances.len(), 10_001);
        assert!((distances[10_000] - 1000.0).abs() < 1e-9);
        assert!(distances[..10_000].iter().all(|d| (d - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_nearest_neighbor_distances_empty() {
        let result = NativeGeometry.nearest_neighbor_distances(&PointCloud::default());

        assert!(matches!(result, Err(GeometryError::EmptyInput(_))));
    }

    #[test]
    fn test_voxel_down_sample_merges_cells() {
        let cloud = lattice(10, 1.0, |_, _| 0.0);

        let down = NativeGeometry.voxel_down_sample(&cloud, 2.0).unwrap();

        assert_eq!(down.len(), 25);
        assert_eq!(down.points[0], [0.5, 0.5, 0.0]);
        assert_eq!(down, NativeGeometry.voxel_down_sample(&cloud, 2.0).unwrap());
    }

    #[test]
    fn test_voxel_down_sample_rejects_bad_size() {
        let cloud = lattice(2, 1.0, |_, _| 0.0);

        for voxel in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                NativeGeometry.voxel_down_sample(&cloud, voxel),
                Err(GeometryError::InvalidParameter { name: "voxel", .. })
            ));
        }
    }

    #[test]
    fn test_normals_of_flat_and_tilted_planes() {
        let flat = with_normals(lattice(8, 1.0, |_, _| 2.0));
        for n in &flat.normals {
            assert!((n[2] - 1.0).abs() < 1e-6, "{n:?}");
        }

        let tilted = with_normals(lattice(8, 1.0, |x, _| x));
        let expected = [-1.0 / 2f64.sqrt(), 0.0, 1.0 / 2f64.sqrt()];
        for n in &tilted.normals {
            assert!(distance(n, &expected) < 1e-6, "{n:?}");
        }
    }

    #[test]
    fn test_orient_normals_towards_camera() {
        let mut cloud = with_normals(lattice(4, 1.0, |_, _| 0.0));

        NativeGeometry
            .orient_normals_towards(&mut cloud, [0.0, 0.0, -100.0])
            .unwrap();

        assert!(cloud.normals.iter().all(|n| n[2] < 0.0));
    }

    #[test]
    fn test_orient_requires_normals() {
        let mut cloud = lattice(4, 1.0, |_, _| 0.0);

        assert!(
            NativeGeometry
                .orient_normals_towards(&mut cloud, [0.0, 0.0, 1.0])
                .is_err()
        );
    }

    #[test]
    fn test_poisson_builds_height_field() {
        let cloud = with_normals(lattice(20, 1.0, |x, y| (x * 0.3).sin() + y * 0.1));

        let mesh = NativeGeometry.poisson(&cloud, 11).unwrap();

        assert!(mesh.triangle_count() > 100);
        assert!(mesh.vertex_count() <= cloud.len());
        assert!(mesh.has_vertex_normals());
        assert_valid(&mesh);
    }

    #[test]
    fn test_poisson_rejects_bad_input() {
        let bare = lattice(5, 1.0, |_, _| 0.0);
        assert!(matches!(
            NativeGeometry.poisson(&bare, 8),
            Err(GeometryError::InvalidParameter { name: "cloud", .. })
        ));

        let tiny = with_normals(PointCloud::from_points(vec![[0.0; 3], [1.0, 0.0, 0.0]]));
        assert!(matches!(
            NativeGeometry.poisson(&tiny, 8),
            Err(GeometryError::EmptyInput(_))
        ));

        let cloud = with_normals(lattice(5, 1.0, |_, _| 0.0));
        assert!(NativeGeometry.poisson(&cloud, 0).is_err());
    }

    #[test]
    fn test_ball_pivoting_keeps_input_points() {
        let cloud = with_normals(lattice(12, 1.0, |_, _| 0.0));
        let radii: Vec<f64> = [0.5, 1.0, 2.0, 4.0].to_vec();

        let mesh = NativeGeometry.ball_pivoting(&cloud, &radii).unwrap();

        assert!(mesh.triangle_count() > 0);
        assert!(mesh.vertices.iter().all(|v| cloud.points.contains(v)));
        assert_valid(&mesh);
    }

    #[test]
    fn test_ball_pivoting_small_balls_fall_through() {
        let cloud = with_normals(lattice(12, 1.0, |_, _| 0.0));

        let mesh = NativeGeometry.ball_pivoting(&cloud, &[0.1]).unwrap();

        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_vertex_clustering_reduces_mesh() {
        let cloud = with_normals(lattice(20, 1.0, |_, _| 0.0));
        let mesh = NativeGeometry.poisson(&cloud, 11).unwrap();

        let simplified = NativeGeometry
            .simplify_vertex_clustering(&mesh, 4.0)
            .unwrap();

        assert!(simplified.vertex_count() < mesh.vertex_count());
        assert!(simplified.triangle_count() < mesh.triangle_count());
        assert!(simplified.triangle_count() > 0);
        assert_valid(&simplified);
    }

    #[test]
    fn test_quadric_decimation_meets_budget() {
        let cloud = with_normals(lattice(20, 1.0, |x, y| (x * y).sqrt()));
        let mesh = NativeGeometry.poisson(&cloud, 11).unwrap();
        let target = mesh.triangle_count() / 4;

        let simplified = NativeGeometry
            .simplify_quadric_decimation(&mesh, target)
            .unwrap();

        assert!(simplified.triangle_count() <= target);
        assert_valid(&simplified);

        let untouched = NativeGeometry
            .simplify_quadric_decimation(&mesh, mesh.triangle_count())
            .unwrap();
        assert_eq!(untouched, mesh);
        assert!(NativeGeometry.simplify_quadric_decimation(&mesh, 0).is_err());
    }

    #[test]
    fn test_symmetric_eigen_diagonalises() {
        let m = [[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];

        let (values, vectors) = symmetric_eigen(m);

        for i in 0..3 {
            let v = [vectors[0][i], vectors[1][i], vectors[2][i]];
            let mv = [dot(&m[0], &v), dot(&m[1], &v), dot(&m[2], &v)];
            assert!(distance(&mv, &scale(&v, values[i])) < 1e-9);
        }
        let trace: f64 = values.iter().sum();
        assert!((trace - 8.0).abs() < 1e-9);
    }
}
