//! Cox–de Boor basis function evaluation.
//!
//! Every routine works on one knot span and returns only the `degree + 1`
//! basis functions that are non-zero there. Zero-length knot intervals never
//! divide: a term whose denominator vanishes contributes 0.

use crate::error::{Result, SurfaceError};
use crate::knots::parameter_domain;
use tessera_math::Tolerance;

/// Non-zero basis values (and first derivatives) at one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisSample {
    /// Knot span index `s` with `U[s] <= t < U[s+1]`; the values cover control
    /// points `s - degree ..= s`.
    pub span: usize,
    /// `N[s-degree..=s]` at `t`.
    pub values: Vec<f64>,
    /// `N'[s-degree..=s]` at `t`.
    pub derivatives: Vec<f64>,
}

/// Find the knot span index for parameter `t`.
///
/// `n` is the index of the last control point. Returns `i` such that
/// `knots[i] <= t < knots[i+1]`, clamped to `degree..=n`; a `t` at the end of
/// the domain maps to the last non-empty span.
pub fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    if t >= knots[n + 1] {
        // Step back over trailing zero-length spans so the span is non-empty.
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        let mut span = degree;
        while span < n && knots[span + 1] <= knots[degree] {
            span += 1;
        }
        return span;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Compute the `degree + 1` non-zero basis function values at `t`.
pub fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let tol = Tolerance::DEFAULT;
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if tol.is_zero_span(denom) {
                0.0
            } else {
                n[r] / denom
            };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Compute the first derivatives of the `degree + 1` non-zero basis
/// functions at `t`, on the same span as [`basis_functions`].
///
/// Uses `N'(i,p) = p/(U[i+p]-U[i]) N(i,p-1) - p/(U[i+p+1]-U[i+1]) N(i+1,p-1)`
/// with the degree `p-1` values taken from the same span.
pub fn basis_derivatives(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut ders = vec![0.0; degree + 1];
    if degree == 0 {
        return ders;
    }
    let tol = Tolerance::DEFAULT;
    let p = degree as f64;
    // lower[k] = N(span - (degree - 1) + k, degree - 1)
    let lower = basis_functions(knots, span, degree - 1, t);

    for (j, d) in ders.iter_mut().enumerate() {
        let i = span - degree + j;
        let mut value = 0.0;
        if j >= 1 {
            let denom = knots[i + degree] - knots[i];
            if !tol.is_zero_span(denom) {
                value += p * lower[j - 1] / denom;
            }
        }
        if j < degree {
            let denom = knots[i + degree + 1] - knots[i + 1];
            if !tol.is_zero_span(denom) {
                value -= p * lower[j] / denom;
            }
        }
        *d = value;
    }
    ders
}

fn check_structure(knots: &[f64], dimension: usize, degree: usize) -> Result<()> {
    if dimension <= degree || knots.len() != dimension + degree + 1 {
        return Err(SurfaceError::MalformedControlNet(format!(
            "{} knots cannot serve {} control points at degree {}",
            knots.len(),
            dimension,
            degree
        )));
    }
    Ok(())
}

fn sample_at(knots: &[f64], dimension: usize, degree: usize, t: f64) -> BasisSample {
    let span = find_span(knots, dimension - 1, degree, t);
    BasisSample {
        span,
        values: basis_functions(knots, span, degree, t),
        derivatives: basis_derivatives(knots, span, degree, t),
    }
}

/// Evaluate basis values and derivatives at `t` for a knot vector serving
/// `dimension` control points.
///
/// Fails with [`SurfaceError::InvalidParameterDomain`] when `t` lies outside
/// `[U[degree], U[dimension]]`.
pub fn evaluate_basis(knots: &[f64], dimension: usize, degree: usize, t: f64) -> Result<BasisSample> {
    check_structure(knots, dimension, degree)?;
    let (min, max) = parameter_domain(knots, dimension, degree);
    if !(min..=max).contains(&t) {
        return Err(SurfaceError::InvalidParameterDomain { t, min, max });
    }
    Ok(sample_at(knots, dimension, degree, t))
}

/// Like [`evaluate_basis`], but clamps `t` to the knot domain instead of
/// failing on it. Non-finite parameters clamp to the start of the domain.
pub fn evaluate_basis_clamped(
    knots: &[f64],
    dimension: usize,
    degree: usize,
    t: f64,
) -> Result<BasisSample> {
    match evaluate_basis(knots, dimension, degree, t) {
        Err(SurfaceError::InvalidParameterDomain { min, max, .. }) => {
            let t = if t.is_nan() { min } else { t.clamp(min, max) };
            Ok(sample_at(knots, dimension, degree, t))
        }
        other => other,
    }
}
