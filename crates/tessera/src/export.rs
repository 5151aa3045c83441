//! Mesh export: Wavefront OBJ, binary STL and JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tessera_tessellate::MeshArtifact;

use crate::{Error, Result};

/// Export file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Wavefront OBJ (`.obj`).
    Obj,
    /// Binary STL (`.stl`).
    Stl,
    /// JSON dump of the mesh artifact (`.json`).
    Json,
}

impl ExportFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("obj") => Ok(ExportFormat::Obj),
            Some("stl") => Ok(ExportFormat::Stl),
            Some("json") => Ok(ExportFormat::Json),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Write the mesh as OBJ text. Normals and texture coordinates are emitted
/// when the mesh has them.
pub fn write_obj<W: Write>(mesh: &MeshArtifact, out: &mut W) -> Result<()> {
    writeln!(out, "# tessera {:?} mesh", mesh.kind)?;
    for v in mesh.vertices.chunks_exact(3) {
        writeln!(out, "v {} {} {}", v[0], v[1], v[2])?;
    }
    for t in mesh.tex_coords.chunks_exact(2) {
        writeln!(out, "vt {} {}", t[0], t[1])?;
    }
    for n in mesh.normals.chunks_exact(3) {
        writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
    }

    let has_tex = !mesh.tex_coords.is_empty();
    let has_normals = !mesh.normals.is_empty();
    for tri in mesh.indices.chunks_exact(3) {
        write!(out, "f")?;
        for &i in tri {
            // OBJ indices are 1-based.
            let i = i + 1;
            match (has_tex, has_normals) {
                (true, true) => write!(out, " {i}/{i}/{i}")?,
                (false, true) => write!(out, " {i}//{i}")?,
                (true, false) => write!(out, " {i}/{i}")?,
                (false, false) => write!(out, " {i}")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// OBJ text of the mesh.
pub fn to_obj_string(mesh: &MeshArtifact) -> Result<String> {
    let mut buf = Vec::new();
    write_obj(mesh, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Binary STL bytes of the mesh. Facet normals come from the triangle edges.
///
/// Triangles referencing a vertex past the end of the position buffer are
/// skipped.
pub fn to_stl_bytes(mesh: &MeshArtifact) -> Vec<u8> {
    let vertices = &mesh.vertices;
    let at = |i: u32| {
        let k = i as usize * 3;
        vertices
            .get(k..k + 3)
            .map(|v| [v[0], v[1], v[2]])
    };
    let triangles: Vec<[[f32; 3]; 3]> = mesh
        .indices
        .chunks_exact(3)
        .filter_map(|tri| Some([at(tri[0])?, at(tri[1])?, at(tri[2])?]))
        .collect();
    if triangles.len() != mesh.num_triangles() {
        log::warn!(
            "STL export skipped {} triangles with out-of-range indices",
            mesh.num_triangles() - triangles.len()
        );
    }
    let mut data = Vec::with_capacity(84 + triangles.len() * 50);

    // 80-byte header
    let mut header = [b' '; 80];
    let tag = b"tessera STL export";
    header[..tag.len()].copy_from_slice(tag);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(triangles.len() as u32).to_le_bytes());

    for [v0, v1, v2] in triangles {
        let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
        let nx = e1[1] * e2[2] - e1[2] * e2[1];
        let ny = e1[2] * e2[0] - e1[0] * e2[2];
        let nz = e1[0] * e2[1] - e1[1] * e2[0];
        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        let normal = if len > 1e-10 {
            [nx / len, ny / len, nz / len]
        } else {
            [0.0, 0.0, 1.0]
        };

        for v in [normal, v0, v1, v2] {
            for c in v {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        // Attribute byte count
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    data
}

/// Check that buffer lengths agree and every index names a vertex.
fn check_mesh(mesh: &MeshArtifact) -> Result<()> {
    if mesh.vertices.len() % 3 != 0 || mesh.indices.len() % 3 != 0 {
        return Err(Error::InvalidMesh(format!(
            "{} position floats and {} indices are not whole triples",
            mesh.vertices.len(),
            mesh.indices.len()
        )));
    }
    let n = mesh.num_vertices();
    if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= n) {
        return Err(Error::InvalidMesh(format!(
            "index {bad} out of range for {n} vertices"
        )));
    }
    let attr_ok = |len: usize, width: usize| len == 0 || len % width == 0;
    if !attr_ok(mesh.normals.len(), 3) || !attr_ok(mesh.tex_coords.len(), 2) {
        return Err(Error::InvalidMesh(
            "normal or texture coordinate buffer is ragged".into(),
        ));
    }
    Ok(())
}

/// Pretty-printed JSON of the mesh artifact.
pub fn to_json(mesh: &MeshArtifact) -> Result<String> {
    Ok(serde_json::to_string_pretty(mesh)?)
}

/// Parse a mesh artifact back from JSON, rejecting ragged buffers and
/// out-of-range indices with [`Error::InvalidMesh`].
pub fn from_json(json: &str) -> Result<MeshArtifact> {
    let mesh: MeshArtifact = serde_json::from_str(json)?;
    check_mesh(&mesh)?;
    Ok(mesh)
}

/// Write the mesh to `path` in the format its extension names.
pub fn export(mesh: &MeshArtifact, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = ExportFormat::from_path(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Obj => write_obj(mesh, &mut out)?,
        ExportFormat::Stl => out.write_all(&to_stl_bytes(mesh))?,
        ExportFormat::Json => serde_json::to_writer_pretty(&mut out, mesh)?,
    }
    out.flush()?;
    log::debug!(
        "exported {} triangles to {} as {:?}",
        mesh.num_triangles(),
        path.display(),
        format
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rebuild, rebuild_coarse, Point3, SurfaceDefinition, TessellationConfig};
    use std::fs;

    fn patch() -> SurfaceDefinition {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.5),
            Point3::new(2.0, 1.0, 0.0),
        ];
        SurfaceDefinition::new(3, 2, 3, 2, pts).with_tessellation(3.0, 2.0)
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path("a/b.OBJ").unwrap(), ExportFormat::Obj);
        assert_eq!(ExportFormat::from_path("mesh.stl").unwrap(), ExportFormat::Stl);
        assert_eq!(ExportFormat::from_path("mesh.json").unwrap(), ExportFormat::Json);
        assert!(matches!(
            ExportFormat::from_path("mesh.glb"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(ExportFormat::from_path("mesh").is_err());
    }

    #[test]
    fn test_obj_fine_mesh() {
        let mesh = rebuild(&patch(), &TessellationConfig::default(), None).unwrap();
        let obj = to_obj_string(&mesh).unwrap();
        assert_eq!(obj.lines().filter(|l| l.starts_with("v ")).count(), 6);
        assert_eq!(obj.lines().filter(|l| l.starts_with("vt ")).count(), 6);
        assert_eq!(obj.lines().filter(|l| l.starts_with("vn ")).count(), 6);
        let faces: Vec<_> = obj.lines().filter(|l| l.starts_with("f ")).collect();
        assert_eq!(faces.len(), 4);
        assert_eq!(faces[0], "f 1/1/1 2/2/2 4/4/4");
    }

    #[test]
    fn test_obj_coarse_mesh_positions_only() {
        let mesh = rebuild_coarse(&patch()).unwrap();
        let obj = to_obj_string(&mesh).unwrap();
        assert!(obj.starts_with("# tessera Coarse mesh"));
        assert!(!obj.contains("vn "));
        assert!(obj.lines().any(|l| l == "f 1 2 4"));
    }

    #[test]
    fn test_stl_layout() {
        let mesh = rebuild(&patch(), &TessellationConfig::default(), None).unwrap();
        let stl = to_stl_bytes(&mesh);
        assert_eq!(stl.len(), 84 + 4 * 50);
        assert!(stl.starts_with(b"tessera STL export"));
        assert_eq!(u32::from_le_bytes([stl[80], stl[81], stl[82], stl[83]]), 4);
    }

    #[test]
    fn test_json_round_trip() {
        let mesh = rebuild(&patch(), &TessellationConfig::default(), None).unwrap();
        let json = to_json(&mesh).unwrap();
        assert!(json.contains("\"kind\": \"fine\""));
        assert_eq!(from_json(&json).unwrap(), mesh);
    }

    #[test]
    fn test_from_json_rejects_out_of_range_index() {
        let mut mesh = rebuild(&patch(), &TessellationConfig::default(), None).unwrap();
        mesh.indices[4] = 99;
        let json = to_json(&mesh).unwrap();
        assert!(matches!(from_json(&json), Err(Error::InvalidMesh(_))));

        // Writing the same artifact drops the bad triangle instead of panicking.
        let stl = to_stl_bytes(&mesh);
        assert_eq!(u32::from_le_bytes([stl[80], stl[81], stl[82], stl[83]]), 3);
        assert_eq!(stl.len(), 84 + 3 * 50);
    }

    #[test]
    fn test_export_writes_file() {
        let mesh = rebuild(&patch(), &TessellationConfig::default(), None).unwrap();
        let path = std::env::temp_dir().join(format!("tessera_export_{}.stl", std::process::id()));
        export(&mesh, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), to_stl_bytes(&mesh));
        fs::remove_file(&path).unwrap();
    }
}
