//! Error types for surface evaluation.

use std::fmt;
use thiserror::Error;

/// One of the two parametric directions of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The u direction (control points along a row).
    U,
    /// The v direction (rows of control points).
    V,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::U => f.write_str("u"),
            Direction::V => f.write_str("v"),
        }
    }
}

/// Errors that can occur while evaluating or tessellating a surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// Parameter lies outside the valid knot domain `[U[p], U[n]]`.
    #[error("parameter {t} outside knot domain [{min}, {max}]")]
    InvalidParameterDomain {
        /// The rejected parameter.
        t: f64,
        /// Lower end of the domain.
        min: f64,
        /// Upper end of the domain.
        max: f64,
    },

    /// Fewer control points than the order in some direction.
    #[error("{direction} dimension {dimension} is smaller than order {order}")]
    InsufficientControlPoints {
        /// Offending direction.
        direction: Direction,
        /// Number of control points in that direction.
        dimension: usize,
        /// Requested order.
        order: usize,
    },

    /// Point, weight, knot or dimension data is inconsistent.
    #[error("malformed control net: {0}")]
    MalformedControlNet(String),
}

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;
