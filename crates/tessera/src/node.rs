//! The patch surface node: owns a definition and keeps its mesh current.
//!
//! A scene integration mutates fields through [`PatchSurface::definition_mut`]
//! and then calls [`PatchSurface::on_field_changed`]; initial construction
//! goes through [`PatchSurface::on_node_changed`]. Every notification
//! rebuilds the whole mesh. A new artifact replaces the old one only once it
//! is complete.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tessera_nurbs::{BasisCache, SurfaceDefinition, SurfaceError, SurfaceId};
use tessera_tessellate::{MeshArtifact, TexCoordSource};

use crate::{build_fine_mesh, rebuild_coarse, Error, TessellationConfig};

/// Optional trimming collaborator, applied to every fine mesh before it is
/// published.
pub trait SurfaceTrim: Send + Sync {
    /// Return the trimmed mesh.
    fn trim(&self, definition: &SurfaceDefinition, mesh: MeshArtifact) -> MeshArtifact;
}

/// What the last rebuild published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// A fine mesh from evaluated samples.
    Fine,
    /// The control-net mesh, because the surface could not be evaluated.
    Coarse,
    /// Nothing new; the previous mesh (if any) is still current.
    Retained,
}

/// Fields of a patch surface, by their X3D names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SurfaceField {
    UDimension,
    VDimension,
    UOrder,
    VOrder,
    UKnot,
    VKnot,
    Weight,
    ControlPoint,
    UClosed,
    VClosed,
    UTessellation,
    VTessellation,
    Solid,
    NormalPerVertex,
    TexCoord,
}

impl SurfaceField {
    /// Every field, in declaration order.
    pub const ALL: [SurfaceField; 15] = [
        SurfaceField::UDimension,
        SurfaceField::VDimension,
        SurfaceField::UOrder,
        SurfaceField::VOrder,
        SurfaceField::UKnot,
        SurfaceField::VKnot,
        SurfaceField::Weight,
        SurfaceField::ControlPoint,
        SurfaceField::UClosed,
        SurfaceField::VClosed,
        SurfaceField::UTessellation,
        SurfaceField::VTessellation,
        SurfaceField::Solid,
        SurfaceField::NormalPerVertex,
        SurfaceField::TexCoord,
    ];

    /// The X3D field name.
    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceField::UDimension => "uDimension",
            SurfaceField::VDimension => "vDimension",
            SurfaceField::UOrder => "uOrder",
            SurfaceField::VOrder => "vOrder",
            SurfaceField::UKnot => "uKnot",
            SurfaceField::VKnot => "vKnot",
            SurfaceField::Weight => "weight",
            SurfaceField::ControlPoint => "controlPoint",
            SurfaceField::UClosed => "uClosed",
            SurfaceField::VClosed => "vClosed",
            SurfaceField::UTessellation => "uTessellation",
            SurfaceField::VTessellation => "vTessellation",
            SurfaceField::Solid => "solid",
            SurfaceField::NormalPerVertex => "normalPerVertex",
            SurfaceField::TexCoord => "texCoord",
        }
    }
}

impl fmt::Display for SurfaceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SurfaceField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

/// A NURBS patch surface and its current mesh.
///
/// Dropping the node releases its basis cache slots.
pub struct PatchSurface {
    id: SurfaceId,
    definition: SurfaceDefinition,
    config: TessellationConfig,
    cache: Arc<BasisCache>,
    mesh: Option<Arc<MeshArtifact>>,
    outcome: Option<RebuildOutcome>,
    trim: Option<Box<dyn SurfaceTrim>>,
    tex_coords: Option<Box<dyn TexCoordSource>>,
}

impl PatchSurface {
    /// Create a node with a private cache and default configuration. No mesh
    /// exists until the first notification.
    pub fn new(definition: SurfaceDefinition) -> Self {
        Self {
            id: SurfaceId::next(),
            definition,
            config: TessellationConfig::default(),
            cache: Arc::new(BasisCache::new()),
            mesh: None,
            outcome: None,
            trim: None,
            tex_coords: None,
        }
    }

    /// Share `cache` with other nodes.
    pub fn with_cache(mut self, cache: Arc<BasisCache>) -> Self {
        self.cache.evict_surface(self.id);
        self.cache = cache;
        self
    }

    /// Use `config` for subsequent rebuilds.
    pub fn with_config(mut self, config: TessellationConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a trimming collaborator.
    pub fn with_trim(mut self, trim: Box<dyn SurfaceTrim>) -> Self {
        self.trim = Some(trim);
        self
    }

    /// Attach a texture coordinate collaborator.
    pub fn with_tex_coords(mut self, source: Box<dyn TexCoordSource>) -> Self {
        self.tex_coords = Some(source);
        self
    }

    /// Cache identity of this node.
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Current field values.
    pub fn definition(&self) -> &SurfaceDefinition {
        &self.definition
    }

    /// Mutable access to the fields. Call
    /// [`on_field_changed`](Self::on_field_changed) afterwards.
    pub fn definition_mut(&mut self) -> &mut SurfaceDefinition {
        &mut self.definition
    }

    /// Replace every field at once. Call
    /// [`on_node_changed`](Self::on_node_changed) afterwards.
    pub fn set_definition(&mut self, definition: SurfaceDefinition) {
        self.definition = definition;
    }

    /// The current mesh, if any rebuild has succeeded.
    pub fn mesh(&self) -> Option<Arc<MeshArtifact>> {
        self.mesh.clone()
    }

    /// What the last rebuild did.
    pub fn outcome(&self) -> Option<RebuildOutcome> {
        self.outcome
    }

    /// Initialisation path: rebuild from the current fields.
    pub fn on_node_changed(&mut self) -> Result<RebuildOutcome, SurfaceError> {
        self.rebuild()
    }

    /// A field was mutated; rebuild.
    pub fn on_field_changed(&mut self, field: SurfaceField) -> Result<RebuildOutcome, SurfaceError> {
        log::debug!("surface {}: {} changed", self.id.get(), field);
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<RebuildOutcome, SurfaceError> {
        let built = build_fine_mesh(
            &self.definition,
            &self.config,
            Some((self.cache.as_ref(), self.id)),
            self.tex_coords.as_deref(),
        );
        let (mesh, outcome) = match built {
            Ok(mesh) => {
                let mesh = match &self.trim {
                    Some(trim) => trim.trim(&self.definition, mesh),
                    None => mesh,
                };
                (mesh, RebuildOutcome::Fine)
            }
            Err(err @ SurfaceError::InsufficientControlPoints { .. }) => {
                log::warn!("surface {}: {err}; publishing coarse mesh", self.id.get());
                match rebuild_coarse(&self.definition) {
                    Ok(mesh) => (mesh, RebuildOutcome::Coarse),
                    Err(err) => return Err(self.retain(err)),
                }
            }
            Err(err) => return Err(self.retain(err)),
        };
        self.mesh = Some(Arc::new(mesh));
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    fn retain(&mut self, err: SurfaceError) -> SurfaceError {
        log::warn!("surface {}: {err}; keeping previous mesh", self.id.get());
        self.outcome = Some(RebuildOutcome::Retained);
        err
    }
}

impl fmt::Debug for PatchSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSurface")
            .field("id", &self.id)
            .field("definition", &self.definition)
            .field("config", &self.config)
            .field("outcome", &self.outcome)
            .field("trimmed", &self.trim.is_some())
            .field("tex_coords", &self.tex_coords.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for PatchSurface {
    fn drop(&mut self) {
        self.cache.evict_surface(self.id);
    }
}
