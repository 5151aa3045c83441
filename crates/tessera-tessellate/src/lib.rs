#![warn(missing_docs)]

//! Triangle mesh construction for tessera.
//!
//! Two paths produce a [`MeshArtifact`]:
//! 1. [`build_fine`] triangulates an evaluated [`SampledGrid`]
//! 2. [`build_coarse`] triangulates the raw control net when the surface
//!    cannot be evaluated
//!
//! Both use the same fixed diagonal through each grid cell (see
//! [`grid_indices`]), so a bilinear patch sampled at its control points
//! yields the same topology on either path.

use serde::{Deserialize, Serialize};
use tessera_math::{point_to_f32, try_normalize, vec_to_f32, Tolerance, Vec3};
use tessera_nurbs::{SampledGrid, SurfaceDefinition, SurfaceError};

/// Which builder produced a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshKind {
    /// Evaluated surface samples.
    Fine,
    /// Raw control points.
    Coarse,
}

/// Indexed triangle mesh handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshArtifact {
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    pub indices: Vec<u32>,
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of vertex normals, same length as `vertices`. Empty on the
    /// coarse path.
    pub normals: Vec<f32>,
    /// Flat array of texture coordinates: `[s0, t0, s1, t1, ...]`. Empty on
    /// the coarse path.
    pub tex_coords: Vec<f32>,
    /// Back-face culling flag. Always false.
    pub solid: bool,
    /// Winding flag reported to the renderer. Always false.
    pub ccw: bool,
    /// Whether normals are smooth per vertex (false: flat per face).
    pub normal_per_vertex: bool,
    /// Builder path.
    pub kind: MeshKind,
}

impl MeshArtifact {
    fn empty(kind: MeshKind, normal_per_vertex: bool) -> Self {
        Self {
            indices: Vec::new(),
            vertices: Vec::new(),
            normals: Vec::new(),
            tex_coords: Vec::new(),
            solid: false,
            ccw: false,
            normal_per_vertex,
            kind,
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned bounds `(min, max)` of the vertices, `None` when there are
    /// none.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut chunks = self.vertices.chunks_exact(3);
        let first = chunks.next()?;
        let mut min = [first[0], first[1], first[2]];
        let mut max = min;
        for v in chunks {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        Some((min, max))
    }
}

/// External texture coordinate collaborator.
///
/// When supplied to [`build_fine`] it replaces the unit-square
/// parametrisation; it receives the surface parameters of each sample.
pub trait TexCoordSource: Send + Sync {
    /// Texture coordinate for surface parameters `(u, v)`.
    fn tex_coord(&self, u: f64, v: f64) -> [f32; 2];
}

/// Triangle indices for a `cols x rows` vertex grid stored row by row.
///
/// Each cell `(i, j)` becomes `(i,j) (i+1,j) (i,j+1)` and
/// `(i,j+1) (i+1,j) (i+1,j+1)`, with vertex `(i, j)` at `i + j * cols`.
/// Grids with fewer than two columns or rows produce no triangles.
pub fn grid_indices(cols: usize, rows: usize) -> Vec<u32> {
    if cols < 2 || rows < 2 {
        return Vec::new();
    }
    let stride = cols as u32;
    let mut indices = Vec::with_capacity(6 * (cols - 1) * (rows - 1));
    for j in 0..rows - 1 {
        for i in 0..cols - 1 {
            let bl = j as u32 * stride + i as u32;
            let br = bl + 1;
            let tl = bl + stride;
            let tr = tl + 1;
            indices.extend_from_slice(&[bl, br, tl, tl, br, tr]);
        }
    }
    indices
}

/// Build the mesh of an evaluated grid.
///
/// With `normal_per_vertex` the grid samples are shared between triangles and
/// carry their analytic normals. Otherwise every triangle gets three fresh
/// vertices sharing one face normal, and indices run sequentially.
pub fn build_fine(
    grid: &SampledGrid,
    normal_per_vertex: bool,
    tex_source: Option<&dyn TexCoordSource>,
) -> MeshArtifact {
    let mut mesh = MeshArtifact::empty(MeshKind::Fine, normal_per_vertex);
    let grid_tris = grid_indices(grid.u_samples, grid.v_samples);

    let tex_at = |idx: usize| -> [f32; 2] {
        match tex_source {
            Some(source) => {
                let (i, j) = (idx % grid.u_samples, idx / grid.u_samples);
                source.tex_coord(grid.u_params[i], grid.v_params[j])
            }
            None => {
                let [s, t] = grid.tex_coords[idx];
                [s as f32, t as f32]
            }
        }
    };

    if normal_per_vertex {
        mesh.vertices.reserve(grid.len() * 3);
        mesh.normals.reserve(grid.len() * 3);
        mesh.tex_coords.reserve(grid.len() * 2);
        for (idx, (p, n)) in grid.points.iter().zip(&grid.normals).enumerate() {
            mesh.vertices.extend_from_slice(&point_to_f32(p));
            mesh.normals.extend_from_slice(&vec_to_f32(n));
            mesh.tex_coords.extend_from_slice(&tex_at(idx));
        }
        mesh.indices = grid_tris;
        return mesh;
    }

    // Flat shading still reads `grid.normals`: a sliver triangle at a pole
    // takes the average of its corner normals.
    mesh.vertices.reserve(grid_tris.len() * 3);
    mesh.normals.reserve(grid_tris.len() * 3);
    mesh.tex_coords.reserve(grid_tris.len() * 2);
    mesh.indices.reserve(grid_tris.len());
    for tri in grid_tris.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let normal = vec_to_f32(&face_normal(grid, a, b, c));
        for idx in [a, b, c] {
            let next = mesh.num_vertices() as u32;
            mesh.indices.push(next);
            mesh.vertices.extend_from_slice(&point_to_f32(&grid.points[idx]));
            mesh.normals.extend_from_slice(&normal);
            mesh.tex_coords.extend_from_slice(&tex_at(idx));
        }
    }
    mesh
}

/// Flat normal of triangle `(a, b, c)`. Triangles are wound counter-clockwise
/// about `du x dv`, so the edge cross product agrees with the analytic
/// normals; a sliver falls back to their average.
fn face_normal(grid: &SampledGrid, a: usize, b: usize, c: usize) -> Vec3 {
    let tol = Tolerance::DEFAULT;
    let (pa, pb, pc) = (grid.points[a], grid.points[b], grid.points[c]);
    let cross = (pb - pa).cross(&(pc - pa));
    try_normalize(&cross, tol.normal)
        .or_else(|| {
            let sum = grid.normals[a] + grid.normals[b] + grid.normals[c];
            try_normalize(&sum, tol.normal)
        })
        .unwrap_or_else(Vec3::z)
}

/// Build the degraded mesh straight from the control net.
///
/// Vertices are the control points, indexed with the fine-path diagonal rule
/// over a `u_dimension x v_dimension` grid. No normals or texture
/// coordinates are produced. Only a structurally broken net fails.
pub fn build_coarse(def: &SurfaceDefinition) -> Result<MeshArtifact, SurfaceError> {
    def.validate_net()?;
    let mut mesh = MeshArtifact::empty(MeshKind::Coarse, true);
    mesh.vertices.reserve(def.control_point.len() * 3);
    for p in &def.control_point {
        mesh.vertices.extend_from_slice(&point_to_f32(p));
    }
    mesh.indices = grid_indices(def.u_dimension, def.v_dimension);
    log::debug!(
        "coarse mesh: {}x{} control net, {} triangles",
        def.u_dimension,
        def.v_dimension,
        mesh.num_triangles()
    );
    Ok(mesh)
}
