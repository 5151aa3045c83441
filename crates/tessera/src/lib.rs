#![warn(missing_docs)]

//! tessera: NURBS patch surface tessellation.
//!
//! Converts a [`SurfaceDefinition`] into an indexed triangle mesh
//! ([`MeshArtifact`]), falling back to a triangulation of the raw control
//! net when the surface has fewer control points than its order.
//!
//! # Example
//!
//! ```rust
//! use tessera::{tessellate, MeshKind, Point3, SurfaceDefinition, TessellationConfig};
//!
//! let pts = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(1.0, 1.0, 1.0),
//!     Point3::new(2.0, 1.0, 0.0),
//! ];
//! let def = SurfaceDefinition::new(3, 2, 3, 2, pts).with_tessellation(3.0, 2.0);
//! let mesh = tessellate(&def, &TessellationConfig::default(), None).unwrap();
//! assert_eq!(mesh.kind, MeshKind::Fine);
//! assert_eq!(mesh.num_triangles(), 4);
//! ```

use rayon::prelude::*;
use thiserror::Error;

pub mod config;
pub mod export;
pub mod node;

pub use config::TessellationConfig;
pub use node::{PatchSurface, RebuildOutcome, SurfaceField, SurfaceTrim};
pub use tessera_math::{Point3, Vec3};
pub use tessera_nurbs::{
    BasisCache, BasisCacheStats, Direction, SampledGrid, SurfaceDefinition, SurfaceError,
    SurfaceId, SurfaceSampler,
};
pub use tessera_tessellate::{MeshArtifact, MeshKind, TexCoordSource};

/// Errors returned by tessera operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Surface evaluation or mesh construction failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// A TOML configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// An I/O error occurred while reading input or writing export files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A field name is not part of the patch surface.
    #[error("unknown surface field: {0}")]
    UnknownField(String),
    /// A mesh artifact is inconsistent (ragged buffers or out-of-range indices).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    /// An export path has no supported extension.
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for tessera operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Sample the surface and build its fine mesh.
pub(crate) fn build_fine_mesh(
    def: &SurfaceDefinition,
    config: &TessellationConfig,
    cache: Option<(&BasisCache, SurfaceId)>,
    tex_source: Option<&dyn TexCoordSource>,
) -> std::result::Result<MeshArtifact, SurfaceError> {
    let mut sampler = SurfaceSampler::new(def, &config.sampling_options())?;
    if let (true, Some((cache, id))) = (config.cache, cache) {
        sampler = sampler.with_cache(cache, id);
    }
    let grid = sampler.sample()?;
    let mesh = tessera_tessellate::build_fine(&grid, def.normal_per_vertex, tex_source);
    log::debug!(
        "fine mesh: {}x{} samples, {} triangles",
        grid.u_samples,
        grid.v_samples,
        mesh.num_triangles()
    );
    Ok(mesh)
}

/// Full rebuild: evaluate the surface on its tessellation grid and
/// triangulate it.
///
/// `cache` routes basis evaluation through a shared [`BasisCache`] under the
/// given surface id (ignored when `config.cache` is off). Fails with
/// `MalformedControlNet` or `InsufficientControlPoints`; no partial mesh is
/// ever returned.
pub fn rebuild(
    def: &SurfaceDefinition,
    config: &TessellationConfig,
    cache: Option<(&BasisCache, SurfaceId)>,
) -> std::result::Result<MeshArtifact, SurfaceError> {
    build_fine_mesh(def, config, cache, None)
}

/// Degraded rebuild that triangulates the control net itself.
pub fn rebuild_coarse(def: &SurfaceDefinition) -> std::result::Result<MeshArtifact, SurfaceError> {
    tessera_tessellate::build_coarse(def)
}

/// [`rebuild`], falling back to [`rebuild_coarse`] when the surface has too
/// few control points to evaluate. Malformed input is still an error.
pub fn tessellate(
    def: &SurfaceDefinition,
    config: &TessellationConfig,
    cache: Option<(&BasisCache, SurfaceId)>,
) -> std::result::Result<MeshArtifact, SurfaceError> {
    match rebuild(def, config, cache) {
        Err(err @ SurfaceError::InsufficientControlPoints { .. }) => {
            log::warn!("{err}; using coarse control-net mesh");
            rebuild_coarse(def)
        }
        other => other,
    }
}

/// Tessellate many surfaces in parallel, sharing one basis cache.
///
/// Each entry pairs a surface with the id its cache slots live under.
/// Results come back in input order; a failure affects only its own entry.
pub fn rebuild_all(
    surfaces: &[(SurfaceId, SurfaceDefinition)],
    config: &TessellationConfig,
    cache: &BasisCache,
) -> Vec<std::result::Result<MeshArtifact, SurfaceError>> {
    surfaces
        .par_iter()
        .map(|(id, def)| tessellate(def, config, Some((cache, *id))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(nu: usize, nv: usize) -> Vec<Point3> {
        let mut pts = Vec::with_capacity(nu * nv);
        for j in 0..nv {
            for i in 0..nu {
                pts.push(Point3::new(i as f64, j as f64, ((i + j) % 2) as f64));
            }
        }
        pts
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let def = SurfaceDefinition::new(5, 4, 3, 3, net(5, 4));
        let cfg = TessellationConfig::default();
        let a = rebuild(&def, &cfg, None).unwrap();
        let b = rebuild(&def, &cfg, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_vertices(), 11 * 9);
    }

    #[test]
    fn test_cached_rebuild_matches_uncached() {
        let def = SurfaceDefinition::new(5, 4, 4, 2, net(5, 4));
        let cfg = TessellationConfig::default();
        let cache = BasisCache::new();
        let id = SurfaceId::next();
        let direct = rebuild(&def, &cfg, None).unwrap();
        let first = rebuild(&def, &cfg, Some((&cache, id))).unwrap();
        let second = rebuild(&def, &cfg, Some((&cache, id))).unwrap();
        assert_eq!(direct, first);
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_cache_disabled_by_config() {
        let def = SurfaceDefinition::new(3, 3, 2, 2, net(3, 3));
        let cfg = TessellationConfig {
            cache: false,
            ..TessellationConfig::default()
        };
        let cache = BasisCache::new();
        rebuild(&def, &cfg, Some((&cache, SurfaceId::next()))).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tessellate_falls_back_to_coarse() {
        let def = SurfaceDefinition::new(2, 2, 3, 3, net(2, 2));
        let cfg = TessellationConfig::default();
        assert!(matches!(
            rebuild(&def, &cfg, None),
            Err(SurfaceError::InsufficientControlPoints { .. })
        ));
        let mesh = tessellate(&def, &cfg, None).unwrap();
        assert_eq!(mesh.kind, MeshKind::Coarse);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_tessellate_malformed_is_error() {
        let def = SurfaceDefinition::new(3, 3, 2, 2, net(3, 2));
        assert!(matches!(
            tessellate(&def, &TessellationConfig::default(), None),
            Err(SurfaceError::MalformedControlNet(_))
        ));
    }

    #[test]
    fn test_max_samples_caps_hint() {
        let def = SurfaceDefinition::new(3, 3, 3, 3, net(3, 3)).with_tessellation(500.0, 4.0);
        let cfg = TessellationConfig {
            max_samples: 16,
            ..TessellationConfig::default()
        };
        let mesh = rebuild(&def, &cfg, None).unwrap();
        assert_eq!(mesh.num_vertices(), 16 * 4);
    }

    #[test]
    fn test_rebuild_all_keeps_order_and_isolates_failures() {
        let cache = BasisCache::new();
        let surfaces = vec![
            (SurfaceId::next(), SurfaceDefinition::new(4, 4, 3, 3, net(4, 4))),
            (SurfaceId::next(), SurfaceDefinition::new(3, 3, 2, 2, net(3, 2))),
            (SurfaceId::next(), SurfaceDefinition::new(2, 3, 4, 2, net(2, 3))),
        ];
        let results = rebuild_all(&surfaces, &TessellationConfig::default(), &cache);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().kind, MeshKind::Fine);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().kind, MeshKind::Coarse);
        assert_eq!(cache.len(), 2);
    }
}
