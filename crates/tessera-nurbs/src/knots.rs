//! Knot vector utilities.

use crate::error::{Result, SurfaceError};

/// Validate a knot vector: non-decreasing, finite, and of length
/// `n_points + order`.
pub fn validate_knots(knots: &[f64], n_points: usize, order: usize) -> Result<()> {
    let expected = n_points.checked_add(order).ok_or_else(|| {
        SurfaceError::MalformedControlNet(format!(
            "knot count for dimension {n_points} + order {order} overflows"
        ))
    })?;
    if knots.len() != expected {
        return Err(SurfaceError::MalformedControlNet(format!(
            "knot vector has {} values, expected {} (dimension {} + order {})",
            knots.len(),
            expected,
            n_points,
            order
        )));
    }
    if let Some(bad) = knots.iter().find(|k| !k.is_finite()) {
        return Err(SurfaceError::MalformedControlNet(format!(
            "knot vector contains non-finite value {bad}"
        )));
    }
    for i in 1..knots.len() {
        if knots[i] < knots[i - 1] {
            return Err(SurfaceError::MalformedControlNet(format!(
                "knot vector decreases at index {i}: {} < {}",
                knots[i],
                knots[i - 1]
            )));
        }
    }
    Ok(())
}

/// Build a clamped (open) uniform knot vector on `[0, 1]`.
///
/// The first and last `order` knots are repeated; the `dimension - order`
/// interior knots are evenly spaced. Requires `dimension >= order`.
pub fn clamped_uniform_knots(dimension: usize, order: usize) -> Vec<f64> {
    let m = dimension + order;
    let mut knots = vec![0.0; m];
    let n_internal = dimension.saturating_sub(order);
    for i in 0..order.min(m) {
        knots[m - 1 - i] = 1.0;
    }
    for i in 1..=n_internal {
        knots[order - 1 + i] = i as f64 / (n_internal + 1) as f64;
    }
    knots
}

/// Parameter domain `(U[p], U[n])` of a knot vector for `dimension` control
/// points and the given degree.
pub fn parameter_domain(knots: &[f64], dimension: usize, degree: usize) -> (f64, f64) {
    (knots[degree], knots[dimension])
}

/// `count` evenly spaced parameters spanning `[min, max]`, endpoints included.
///
/// The last parameter is exactly `max`, so boundary samples land on the end
/// of the domain without rounding drift.
pub fn sample_parameters(min: f64, max: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let last = count - 1;
            (0..count)
                .map(|k| {
                    if k == last {
                        max
                    } else {
                        min + (max - min) * (k as f64 / last as f64)
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_uniform_shape() {
        let knots = clamped_uniform_knots(5, 3);
        assert_eq!(knots, vec![0.0, 0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0, 1.0]);
        assert!(validate_knots(&knots, 5, 3).is_ok());
    }

    #[test]
    fn test_clamped_uniform_no_interior() {
        // dimension == order is a single Bezier span
        assert_eq!(clamped_uniform_knots(2, 2), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(
            clamped_uniform_knots(3, 3),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_validate_knots_length() {
        let err = validate_knots(&[0.0, 0.0, 1.0], 2, 2).unwrap_err();
        assert!(matches!(err, SurfaceError::MalformedControlNet(_)));
    }

    #[test]
    fn test_validate_knots_count_overflow() {
        let err = validate_knots(&[0.0, 1.0], usize::MAX, 2).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_validate_knots_decreasing() {
        let err = validate_knots(&[0.0, 0.5, 0.25, 1.0], 2, 2).unwrap_err();
        assert!(err.to_string().contains("decreases at index 2"));
    }

    #[test]
    fn test_validate_knots_nan() {
        assert!(validate_knots(&[0.0, f64::NAN, 1.0, 1.0], 2, 2).is_err());
    }

    #[test]
    fn test_parameter_domain() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 2.0, 2.0, 2.0];
        assert_eq!(parameter_domain(&knots, 4, 2), (0.0, 2.0));
    }

    #[test]
    fn test_sample_parameters_endpoints() {
        let ts = sample_parameters(0.1, 0.7, 7);
        assert_eq!(ts.len(), 7);
        assert_eq!(ts[0], 0.1);
        assert_eq!(ts[6], 0.7);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        assert!(sample_parameters(0.0, 1.0, 0).is_empty());
        assert_eq!(sample_parameters(0.0, 1.0, 1), vec![0.0]);
    }
}
