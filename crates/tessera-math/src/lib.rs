#![warn(missing_docs)]

//! Math types for the tessera NURBS tessellator.
//!
//! Thin aliases over nalgebra for points and vectors in model space, plus the
//! tolerance constants shared by the evaluator and the mesh builder.

use nalgebra::Vector3;

/// A point in 3D model space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D model space.
pub type Vec3 = Vector3<f64>;

/// Normalize `v`, or return `None` when its length is below `min_norm`.
pub fn try_normalize(v: &Vec3, min_norm: f64) -> Option<Vec3> {
    let norm = v.norm();
    if norm < min_norm || !norm.is_finite() {
        None
    } else {
        Some(v / norm)
    }
}

/// Narrow a point to the `f32` triple used in render buffers.
pub fn point_to_f32(p: &Point3) -> [f32; 3] {
    [p.x as f32, p.y as f32, p.z as f32]
}

/// Narrow a vector to the `f32` triple used in render buffers.
pub fn vec_to_f32(v: &Vec3) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Smallest vector length still treated as a usable normal/tangent.
    pub normal: f64,
    /// Smallest denominator accepted in knot-span divisions.
    pub knot: f64,
}

impl Tolerance {
    /// Default tolerances (1e-9 linear, 1e-15 normal length, 1e-30 knot span).
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        normal: 1e-15,
        knot: 1e-30,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a knot interval is effectively zero-length.
    pub fn is_zero_span(&self, d: f64) -> bool {
        d.abs() < self.knot
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
