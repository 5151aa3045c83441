#![warn(missing_docs)]

//! NURBS patch surface evaluation for tessera.
//!
//! Turns a [`SurfaceDefinition`] (the X3D `NurbsPatchSurface` fields) into a
//! regular grid of points, normals and texture coordinates.
//!
//! # Key types
//!
//! - [`SurfaceDefinition`]: control net, weights, knots, orders and hints
//! - [`SurfaceSampler`]: validates a definition and evaluates its grid
//! - [`SampledGrid`]: the evaluated samples, u fastest
//! - [`BasisCache`]: per-surface memo of basis tables across rebuilds
//!
//! # Algorithms
//!
//! - **Cox–de Boor recurrence** for basis values and first derivatives
//! - **Rational quotient rule** for surface partials: `S_u = (A_u - w_u S) / w`

pub mod basis;
pub mod cache;
pub mod definition;
pub mod error;
pub mod knots;
pub mod sampler;

pub use basis::{
    basis_derivatives, basis_functions, evaluate_basis, evaluate_basis_clamped, find_span,
    BasisSample,
};
pub use cache::{BasisCache, BasisCacheStats, BasisKey, BasisTable, SurfaceId};
pub use definition::SurfaceDefinition;
pub use error::{Direction, Result, SurfaceError};
pub use knots::{clamped_uniform_knots, parameter_domain, sample_parameters, validate_knots};
pub use sampler::{
    resolve_sample_count, SampledGrid, SamplingOptions, SurfacePoint, SurfaceSampler,
};
