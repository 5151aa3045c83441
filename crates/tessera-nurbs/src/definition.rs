//! The typed snapshot of a NURBS patch surface.

use serde::{Deserialize, Serialize};
use tessera_math::{Point3, Tolerance};

use crate::error::{Direction, Result, SurfaceError};
use crate::knots::{clamped_uniform_knots, parameter_domain, validate_knots};

/// A NURBS patch surface snapshot, with the X3D `NurbsPatchSurface` fields.
///
/// Control points and weights are stored flat with u varying fastest:
/// `control_point[i + j * u_dimension]` is the point in column `i` of row
/// `j`. Serialized field names follow X3D (`uDimension`, `controlPoint`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceDefinition {
    /// Number of control points in u.
    pub u_dimension: usize,
    /// Number of control points in v.
    pub v_dimension: usize,
    /// Order (degree + 1) in u.
    pub u_order: usize,
    /// Order (degree + 1) in v.
    pub v_order: usize,
    /// Knot vector in u; empty means clamped uniform.
    pub u_knot: Vec<f64>,
    /// Knot vector in v; empty means clamped uniform.
    pub v_knot: Vec<f64>,
    /// Per-point weights; empty means all 1 (non-rational).
    pub weight: Vec<f64>,
    /// Control net.
    pub control_point: Vec<Point3>,
    /// Closed in u. Accepted but not seam-blended.
    pub u_closed: bool,
    /// Closed in v. Accepted but not seam-blended.
    pub v_closed: bool,
    /// Tessellation hint in u: 0 default, > 0 sample count, < 0 adaptive.
    pub u_tessellation: f64,
    /// Tessellation hint in v: 0 default, > 0 sample count, < 0 adaptive.
    pub v_tessellation: f64,
    /// Requested back-face culling. Both builder paths report it off.
    pub solid: bool,
    /// Smooth per-vertex normals (true) or flat per-face normals (false).
    pub normal_per_vertex: bool,
}

impl Default for SurfaceDefinition {
    fn default() -> Self {
        Self {
            u_dimension: 0,
            v_dimension: 0,
            u_order: 3,
            v_order: 3,
            u_knot: Vec::new(),
            v_knot: Vec::new(),
            weight: Vec::new(),
            control_point: Vec::new(),
            u_closed: false,
            v_closed: false,
            u_tessellation: 0.0,
            v_tessellation: 0.0,
            solid: false,
            normal_per_vertex: true,
        }
    }
}

impl SurfaceDefinition {
    /// Create a definition from a control net and orders, with every other
    /// field at its default.
    pub fn new(
        u_dimension: usize,
        v_dimension: usize,
        u_order: usize,
        v_order: usize,
        control_point: Vec<Point3>,
    ) -> Self {
        Self {
            u_dimension,
            v_dimension,
            u_order,
            v_order,
            control_point,
            ..Self::default()
        }
    }

    /// Set explicit knot vectors.
    pub fn with_knots(mut self, u_knot: Vec<f64>, v_knot: Vec<f64>) -> Self {
        self.u_knot = u_knot;
        self.v_knot = v_knot;
        self
    }

    /// Set per-point weights.
    pub fn with_weights(mut self, weight: Vec<f64>) -> Self {
        self.weight = weight;
        self
    }

    /// Set both tessellation hints.
    pub fn with_tessellation(mut self, u: f64, v: f64) -> Self {
        self.u_tessellation = u;
        self.v_tessellation = v;
        self
    }

    /// Dimension (control point count) in the given direction.
    pub fn dimension(&self, direction: Direction) -> usize {
        match direction {
            Direction::U => self.u_dimension,
            Direction::V => self.v_dimension,
        }
    }

    /// Order in the given direction.
    pub fn order(&self, direction: Direction) -> usize {
        match direction {
            Direction::U => self.u_order,
            Direction::V => self.v_order,
        }
    }

    /// Supplied knot vector in the given direction (possibly empty).
    pub fn knots(&self, direction: Direction) -> &[f64] {
        match direction {
            Direction::U => &self.u_knot,
            Direction::V => &self.v_knot,
        }
    }

    /// Tessellation hint in the given direction.
    pub fn tessellation(&self, direction: Direction) -> f64 {
        match direction {
            Direction::U => self.u_tessellation,
            Direction::V => self.v_tessellation,
        }
    }

    /// The knot vector used for evaluation: the supplied one, or a clamped
    /// uniform vector when none was given.
    pub fn effective_knots(&self, direction: Direction) -> Vec<f64> {
        let knots = self.knots(direction);
        if knots.is_empty() {
            clamped_uniform_knots(self.dimension(direction), self.order(direction))
        } else {
            knots.to_vec()
        }
    }

    /// Weight of control point `(i, j)`; 1 when no weights are given.
    pub fn weight_at(&self, i: usize, j: usize) -> f64 {
        if self.weight.is_empty() {
            1.0
        } else {
            self.weight[i + j * self.u_dimension]
        }
    }

    /// Control point `(i, j)`.
    pub fn control_point_at(&self, i: usize, j: usize) -> &Point3 {
        &self.control_point[i + j * self.u_dimension]
    }

    /// Whether the closed flag in `direction` is honoured: it is set and every
    /// row (for u) or column (for v) starts and ends on the same point.
    ///
    /// Closed surfaces are still evaluated as open patches; this only reports
    /// whether the flag is consistent with the net.
    pub fn is_effectively_closed(&self, direction: Direction) -> bool {
        let tol = Tolerance::DEFAULT;
        let (flag, nu, nv) = (
            match direction {
                Direction::U => self.u_closed,
                Direction::V => self.v_closed,
            },
            self.u_dimension,
            self.v_dimension,
        );
        if !flag || nu < 2 || nv < 2 || nu.checked_mul(nv) != Some(self.control_point.len()) {
            return false;
        }
        match direction {
            Direction::U => (0..nv).all(|j| {
                tol.points_equal(self.control_point_at(0, j), self.control_point_at(nu - 1, j))
            }),
            Direction::V => (0..nu).all(|i| {
                tol.points_equal(self.control_point_at(i, 0), self.control_point_at(i, nv - 1))
            }),
        }
    }

    /// Check that the control net is structurally sound: point count equals
    /// `u_dimension * v_dimension`, the grid is non-empty, weights match the
    /// net and are non-negative, coordinates are finite.
    ///
    /// This is all the coarse path needs.
    pub fn validate_net(&self) -> Result<()> {
        let expected = self
            .u_dimension
            .checked_mul(self.v_dimension)
            .ok_or_else(|| {
                SurfaceError::MalformedControlNet(format!(
                    "dimension product {}x{} overflows",
                    self.u_dimension, self.v_dimension
                ))
            })?;
        if self.control_point.len() != expected {
            return Err(SurfaceError::MalformedControlNet(format!(
                "{} control points for a {}x{} net (expected {})",
                self.control_point.len(),
                self.u_dimension,
                self.v_dimension,
                expected
            )));
        }
        if expected == 0 {
            return Err(SurfaceError::MalformedControlNet(
                "control net is empty".into(),
            ));
        }
        if !self.weight.is_empty() && self.weight.len() != expected {
            return Err(SurfaceError::MalformedControlNet(format!(
                "{} weights for {} control points",
                self.weight.len(),
                expected
            )));
        }
        if let Some(w) = self.weight.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(SurfaceError::MalformedControlNet(format!(
                "weight {w} is not a finite non-negative value"
            )));
        }
        if let Some(idx) = self
            .control_point
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(SurfaceError::MalformedControlNet(format!(
                "control point {idx} has a non-finite coordinate"
            )));
        }
        Ok(())
    }

    /// Full validation for evaluation: [`validate_net`](Self::validate_net),
    /// orders of at least 2, and well-formed knot vectors in both directions.
    ///
    /// Dimensions smaller than the order are not a structural error here;
    /// the sampler reports them as `InsufficientControlPoints`.
    pub fn validate(&self) -> Result<()> {
        for direction in [Direction::U, Direction::V] {
            let order = self.order(direction);
            if order < 2 {
                return Err(SurfaceError::MalformedControlNet(format!(
                    "{direction} order {order} is below the minimum of 2"
                )));
            }
        }
        self.validate_net()?;
        for direction in [Direction::U, Direction::V] {
            let dimension = self.dimension(direction);
            let order = self.order(direction);
            let knots = self.knots(direction);
            if knots.is_empty() || dimension < order {
                continue;
            }
            validate_knots(knots, dimension, order)?;
            let (min, max) = parameter_domain(knots, dimension, order - 1);
            if min >= max {
                return Err(SurfaceError::MalformedControlNet(format!(
                    "{direction} knot domain [{min}, {max}] is empty"
                )));
            }
        }
        Ok(())
    }
}
