//! Mesh serialisation.

use std::io::Write;

use super::{GeometryError, TriangleMesh};

/// Write `mesh` as ASCII PLY.
///
/// Vertex normals are written as `nx ny nz` properties when present. Faces use
/// the conventional `vertex_indices` list property.
pub fn write_ply_ascii(mesh: &TriangleMesh, out: &mut dyn Write) -> Result<(), GeometryError> {
    check_indices(mesh)?;
    let normals = mesh.has_vertex_normals();

    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "comment generated by lasmesh")?;
    writeln!(out, "element vertex {}", mesh.vertex_count())?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property double {axis}")?;
    }
    if normals {
        for axis in ["nx", "ny", "nz"] {
            writeln!(out, "property double {axis}")?;
        }
    }
    writeln!(out, "element face {}", mesh.triangle_count())?;
    writeln!(out, "property list uchar int vertex_indices")?;
    writeln!(out, "end_header")?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        if normals {
            let n = mesh.vertex_normals[i];
            writeln!(out, "{} {} {} {} {} {}", v[0], v[1], v[2], n[0], n[1], n[2])?;
        } else {
            writeln!(out, "{} {} {}", v[0], v[1], v[2])?;
        }
    }
    for [a, b, c] in &mesh.triangles {
        writeln!(out, "3 {a} {b} {c}")?;
    }
    out.flush()?;
    Ok(())
}

/// Write `mesh` as Wavefront OBJ (1-based indices).
pub fn write_obj(mesh: &TriangleMesh, out: &mut dyn Write) -> Result<(), GeometryError> {
    check_indices(mesh)?;
    let normals = mesh.has_vertex_normals();

    writeln!(out, "# generated by lasmesh")?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v[0], v[1], v[2])?;
    }
    if normals {
        for n in &mesh.vertex_normals {
            writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
        }
    }
    for t in &mesh.triangles {
        let [a, b, c] = t.map(|i| i + 1);
        if normals {
            writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(out, "f {a} {b} {c}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn check_indices(mesh: &TriangleMesh) -> Result<(), GeometryError> {
    let count = mesh.vertex_count();
    match mesh.triangles.iter().find(|t| t.iter().any(|i| *i >= count)) {
        Some(t) => Err(GeometryError::InvalidParameter {
            name: "mesh",
            reason: format!("triangle {t:?} references a vertex beyond {count}"),
        }),
        None => Ok(()),
    }
}
