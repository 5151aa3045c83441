//! Rational surface evaluation over a regular parameter grid.

use std::sync::Arc;

use tessera_math::{try_normalize, Point3, Tolerance, Vec3};

use crate::basis::{evaluate_basis_clamped, BasisSample};
use crate::cache::{BasisCache, BasisTable, SurfaceId};
use crate::definition::SurfaceDefinition;
use crate::error::{Direction, Result, SurfaceError};
use crate::knots::{parameter_domain, sample_parameters};

/// Relative parameter offset used to step off a degenerate point when the
/// analytic normal vanishes there.
const NORMAL_NUDGE: f64 = 1e-6;

/// Options controlling how tessellation hints become sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    /// Upper bound on the sample count in each direction.
    pub max_samples: usize,
    /// Sample count used for negative (adaptive) hints; `None` means the
    /// same default as a zero hint, `2 * dimension + 1`.
    pub adaptive_fallback: Option<usize>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            max_samples: 1024,
            adaptive_fallback: None,
        }
    }
}

/// Resolve a tessellation hint into a sample count.
///
/// - `0` (or non-finite): `2 * dimension + 1`
/// - positive: the hint rounded to the nearest integer
/// - negative: the adaptive fallback; chord-length sampling is not done
///
/// The result is always at least 2 and at most `options.max_samples`.
pub fn resolve_sample_count(hint: f64, dimension: usize, options: &SamplingOptions) -> usize {
    let default = 2 * dimension + 1;
    let count = if hint == 0.0 || !hint.is_finite() {
        default
    } else if hint > 0.0 {
        hint.round() as usize
    } else {
        options.adaptive_fallback.unwrap_or(default)
    };
    count.clamp(2, options.max_samples.max(2))
}

/// Position and first partial derivatives at one parameter pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// `S(u, v)`.
    pub point: Point3,
    /// `dS/du`.
    pub du: Vec3,
    /// `dS/dv`.
    pub dv: Vec3,
}

impl SurfacePoint {
    /// `normalize(du x dv)`, or `None` where the surface is degenerate.
    pub fn normal(&self) -> Option<Vec3> {
        try_normalize(&self.du.cross(&self.dv), Tolerance::DEFAULT.normal)
    }
}

/// The evaluated sample grid, row-major with u fastest
/// (`index = i + j * u_samples`).
#[derive(Debug, Clone, PartialEq)]
pub struct SampledGrid {
    /// Samples along u.
    pub u_samples: usize,
    /// Samples along v.
    pub v_samples: usize,
    /// Parameter values along u.
    pub u_params: Vec<f64>,
    /// Parameter values along v.
    pub v_params: Vec<f64>,
    /// Surface points.
    pub points: Vec<Point3>,
    /// Unit normals, `normalize(dS/du x dS/dv)`.
    pub normals: Vec<Vec3>,
    /// Unit-square texture coordinates `(i / (u_samples-1), j / (v_samples-1))`.
    pub tex_coords: Vec<[f64; 2]>,
}

impl SampledGrid {
    /// Flat index of sample `(i, j)`.
    pub fn index(&self, i: usize, j: usize) -> usize {
        i + j * self.u_samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the grid holds no samples.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Evaluates a [`SurfaceDefinition`] on its tessellation grid.
///
/// Construction validates the definition, synthesizes missing knot vectors
/// and resolves sample counts, so [`sample`](Self::sample) only fails on
/// conditions the cache itself reports.
#[derive(Debug, Clone)]
pub struct SurfaceSampler<'a> {
    def: &'a SurfaceDefinition,
    u_knots: Vec<f64>,
    v_knots: Vec<f64>,
    u_degree: usize,
    v_degree: usize,
    u_samples: usize,
    v_samples: usize,
    cache: Option<(&'a BasisCache, SurfaceId)>,
}

impl<'a> SurfaceSampler<'a> {
    /// Prepare a sampler.
    ///
    /// Fails with `MalformedControlNet` for structurally invalid input and
    /// with `InsufficientControlPoints` when a dimension is below its order.
    pub fn new(def: &'a SurfaceDefinition, options: &SamplingOptions) -> Result<Self> {
        def.validate()?;
        for direction in [Direction::U, Direction::V] {
            let dimension = def.dimension(direction);
            let order = def.order(direction);
            if dimension < order {
                return Err(SurfaceError::InsufficientControlPoints {
                    direction,
                    dimension,
                    order,
                });
            }
            if def.tessellation(direction) < 0.0 {
                log::warn!(
                    "{direction} tessellation {} is an adaptive hint; using fixed sampling",
                    def.tessellation(direction)
                );
            }
            if def.is_effectively_closed(direction) {
                log::debug!("{direction} closed surface evaluated without seam blending");
            }
        }

        let u_samples = resolve_sample_count(def.u_tessellation, def.u_dimension, options);
        let v_samples = resolve_sample_count(def.v_tessellation, def.v_dimension, options);
        Ok(Self {
            def,
            u_knots: def.effective_knots(Direction::U),
            v_knots: def.effective_knots(Direction::V),
            u_degree: def.u_order - 1,
            v_degree: def.v_order - 1,
            u_samples,
            v_samples,
            cache: None,
        })
    }

    /// Route basis evaluation through `cache`, under the slots of `surface`.
    pub fn with_cache(mut self, cache: &'a BasisCache, surface: SurfaceId) -> Self {
        self.cache = Some((cache, surface));
        self
    }

    /// Effective sample count along u.
    pub fn u_samples(&self) -> usize {
        self.u_samples
    }

    /// Effective sample count along v.
    pub fn v_samples(&self) -> usize {
        self.v_samples
    }

    /// Knot vector used for evaluation in `direction`.
    pub fn knots(&self, direction: Direction) -> &[f64] {
        match direction {
            Direction::U => &self.u_knots,
            Direction::V => &self.v_knots,
        }
    }

    /// Parameter domain `(min, max)` in `direction`.
    pub fn domain(&self, direction: Direction) -> (f64, f64) {
        let (knots, dimension, degree) = self.direction_data(direction);
        parameter_domain(knots, dimension, degree)
    }

    fn direction_data(&self, direction: Direction) -> (&[f64], usize, usize) {
        match direction {
            Direction::U => (&self.u_knots, self.def.u_dimension, self.u_degree),
            Direction::V => (&self.v_knots, self.def.v_dimension, self.v_degree),
        }
    }

    fn table(&self, direction: Direction, params: &[f64]) -> Result<Arc<BasisTable>> {
        let (knots, dimension, degree) = self.direction_data(direction);
        match self.cache {
            Some((cache, surface)) => {
                cache.get_or_compute(surface, direction, knots, dimension, degree, params)
            }
            None => Ok(Arc::new(BasisTable::compute(knots, dimension, degree, params)?)),
        }
    }

    /// Evaluate the whole grid.
    pub fn sample(&self) -> Result<SampledGrid> {
        let (u_min, u_max) = self.domain(Direction::U);
        let (v_min, v_max) = self.domain(Direction::V);
        let u_params = sample_parameters(u_min, u_max, self.u_samples);
        let v_params = sample_parameters(v_min, v_max, self.v_samples);
        let u_table = self.table(Direction::U, &u_params)?;
        let v_table = self.table(Direction::V, &v_params)?;

        let n = self.u_samples * self.v_samples;
        let mut points = Vec::with_capacity(n);
        let mut normals = Vec::with_capacity(n);
        let mut tex_coords = Vec::with_capacity(n);
        let s_last = (self.u_samples - 1) as f64;
        let t_last = (self.v_samples - 1) as f64;

        for (j, bv) in v_table.samples.iter().enumerate() {
            for (i, bu) in u_table.samples.iter().enumerate() {
                let sp = self.combine(bu, bv);
                let normal = match sp.normal() {
                    Some(n) => n,
                    None => self.fallback_normal(u_params[i], v_params[j])?,
                };
                points.push(sp.point);
                normals.push(normal);
                tex_coords.push([i as f64 / s_last, j as f64 / t_last]);
            }
        }

        Ok(SampledGrid {
            u_samples: self.u_samples,
            v_samples: self.v_samples,
            u_params,
            v_params,
            points,
            normals,
            tex_coords,
        })
    }

    /// Evaluate the surface point at `(u, v)`, clamped to the domain.
    pub fn point_at(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.derivatives_at(u, v)?.point)
    }

    /// Evaluate point and partial derivatives at `(u, v)`, clamped to the
    /// domain.
    pub fn derivatives_at(&self, u: f64, v: f64) -> Result<SurfacePoint> {
        let bu = evaluate_basis_clamped(&self.u_knots, self.def.u_dimension, self.u_degree, u)?;
        let bv = evaluate_basis_clamped(&self.v_knots, self.def.v_dimension, self.v_degree, v)?;
        Ok(self.combine(&bu, &bv))
    }

    /// Unit normal at `(u, v)`; see [`sample`](Self::sample) for the
    /// fallbacks at degenerate points.
    pub fn normal_at(&self, u: f64, v: f64) -> Result<Vec3> {
        match self.derivatives_at(u, v)?.normal() {
            Some(n) => Ok(n),
            None => self.fallback_normal(u, v),
        }
    }

    /// Rational tensor-product combination of one u and one v basis sample.
    ///
    /// With `A = sum N_i N_j w_ij P_ij` and `w = sum N_i N_j w_ij`:
    /// `S = A / w` and `S_u = (A_u - w_u S) / w` (likewise for v).
    fn combine(&self, bu: &BasisSample, bv: &BasisSample) -> SurfacePoint {
        let mut a = Vec3::zeros();
        let mut a_u = Vec3::zeros();
        let mut a_v = Vec3::zeros();
        let mut w = 0.0;
        let mut w_u = 0.0;
        let mut w_v = 0.0;

        for (l, (&nv, &dnv)) in bv.values.iter().zip(&bv.derivatives).enumerate() {
            let v_idx = bv.span - self.v_degree + l;
            for (k, (&nu, &dnu)) in bu.values.iter().zip(&bu.derivatives).enumerate() {
                let u_idx = bu.span - self.u_degree + k;
                let weight = self.def.weight_at(u_idx, v_idx);
                let p = self.def.control_point_at(u_idx, v_idx).coords * weight;

                let b = nu * nv;
                let b_u = dnu * nv;
                let b_v = nu * dnv;
                a += p * b;
                a_u += p * b_u;
                a_v += p * b_v;
                w += weight * b;
                w_u += weight * b_u;
                w_v += weight * b_v;
            }
        }

        if Tolerance::DEFAULT.is_zero_span(w) {
            // All contributing weights are zero.
            return SurfacePoint {
                point: Point3::origin(),
                du: Vec3::zeros(),
                dv: Vec3::zeros(),
            };
        }

        let s = a / w;
        SurfacePoint {
            point: Point3::from(s),
            du: (a_u - s * w_u) / w,
            dv: (a_v - s * w_v) / w,
        }
    }

    /// Normal where `du x dv` vanishes (collapsed edges, poles): evaluate a
    /// point nudged toward the domain centre, else +Z.
    fn fallback_normal(&self, u: f64, v: f64) -> Result<Vec3> {
        let (u_min, u_max) = self.domain(Direction::U);
        let (v_min, v_max) = self.domain(Direction::V);
        let u_mid = 0.5 * (u_min + u_max);
        let v_mid = 0.5 * (v_min + v_max);
        let nudged_u = u + (u_mid - u).signum() * NORMAL_NUDGE * (u_max - u_min);
        let nudged_v = v + (v_mid - v).signum() * NORMAL_NUDGE * (v_max - v_min);
        Ok(self
            .derivatives_at(nudged_u, nudged_v)?
            .normal()
            .unwrap_or_else(Vec3::z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{basis_functions, find_span};
    use approx::assert_abs_diff_eq;

    fn grid(nu: usize, nv: usize, height: impl Fn(usize, usize) -> f64) -> Vec<Point3> {
        let mut pts = Vec::with_capacity(nu * nv);
        for j in 0..nv {
            for i in 0..nu {
                pts.push(Point3::new(i as f64, j as f64, height(i, j)));
            }
        }
        pts
    }

    /// Independent non-rational tensor-product evaluation.
    fn bspline_point(def: &SurfaceDefinition, u: f64, v: f64) -> Point3 {
        let uk = def.effective_knots(Direction::U);
        let vk = def.effective_knots(Direction::V);
        let (p, q) = (def.u_order - 1, def.v_order - 1);
        let su = find_span(&uk, def.u_dimension - 1, p, u);
        let sv = find_span(&vk, def.v_dimension - 1, q, v);
        let bu = basis_functions(&uk, su, p, u);
        let bv = basis_functions(&vk, sv, q, v);
        let mut out = Vec3::zeros();
        for (l, nv) in bv.iter().enumerate() {
            for (k, nu) in bu.iter().enumerate() {
                out += def.control_point_at(su - p + k, sv - q + l).coords * (nu * nv);
            }
        }
        Point3::from(out)
    }

    #[test]
    fn test_resolve_sample_count() {
        let opts = SamplingOptions::default();
        assert_eq!(resolve_sample_count(0.0, 3, &opts), 7);
        assert_eq!(resolve_sample_count(5.0, 3, &opts), 5);
        assert_eq!(resolve_sample_count(4.6, 3, &opts), 5);
        assert_eq!(resolve_sample_count(1.0, 3, &opts), 2);
        assert_eq!(resolve_sample_count(-2.0, 3, &opts), 7);
        assert_eq!(resolve_sample_count(f64::NAN, 4, &opts), 9);
        assert_eq!(resolve_sample_count(1e9, 3, &opts), 1024);

        let opts = SamplingOptions {
            max_samples: 64,
            adaptive_fallback: Some(33),
        };
        assert_eq!(resolve_sample_count(-0.5, 3, &opts), 33);
        assert_eq!(resolve_sample_count(100.0, 3, &opts), 64);
    }

    #[test]
    fn test_insufficient_control_points() {
        let def = SurfaceDefinition::new(2, 3, 3, 2, grid(2, 3, |_, _| 0.0));
        let err = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::InsufficientControlPoints {
                direction: Direction::U,
                dimension: 2,
                order: 3
            }
        );
    }

    #[test]
    fn test_malformed_net_reported_first() {
        let def = SurfaceDefinition::new(2, 2, 3, 3, grid(2, 1, |_, _| 0.0));
        assert!(matches!(
            SurfaceSampler::new(&def, &SamplingOptions::default()),
            Err(SurfaceError::MalformedControlNet(_))
        ));
    }

    #[test]
    fn test_corner_interpolation_example() {
        // 3x2 flat net, quadratic in u, linear in v, synthesized knots.
        let def = SurfaceDefinition::new(3, 2, 3, 2, grid(3, 2, |_, _| 0.0))
            .with_tessellation(3.0, 2.0);
        let sampler = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap();
        let g = sampler.sample().unwrap();
        assert_eq!((g.u_samples, g.v_samples), (3, 2));
        assert_eq!(g.points[g.index(0, 0)], *def.control_point_at(0, 0));
        assert_eq!(g.points[g.index(2, 0)], *def.control_point_at(2, 0));
        assert_eq!(g.points[g.index(0, 1)], *def.control_point_at(0, 1));
        assert_eq!(g.points[g.index(2, 1)], *def.control_point_at(2, 1));
        for n in &g.normals {
            assert_abs_diff_eq!(n.z, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_default_sample_counts() {
        let def = SurfaceDefinition::new(4, 3, 3, 3, grid(4, 3, |_, _| 0.0));
        let sampler = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap();
        assert_eq!((sampler.u_samples(), sampler.v_samples()), (9, 7));
        let g = sampler.sample().unwrap();
        assert_eq!(g.len(), 63);
        assert_eq!(g.tex_coords[0], [0.0, 0.0]);
        assert_eq!(g.tex_coords[62], [1.0, 1.0]);
        assert_eq!(g.tex_coords[g.index(4, 3)], [0.5, 0.5]);
    }

    #[test]
    fn test_unit_weights_match_non_rational() {
        let pts = grid(5, 4, |i, j| ((i * 7 + j * 3) % 5) as f64 - 2.0);
        let plain = SurfaceDefinition::new(5, 4, 4, 3, pts.clone())
            .with_knots(
                vec![0.0, 0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0, 1.0],
                vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0],
            )
            .with_tessellation(11.0, 9.0);
        let weighted = plain.clone().with_weights(vec![1.0; 20]);

        let g = SurfaceSampler::new(&weighted, &SamplingOptions::default())
            .unwrap()
            .sample()
            .unwrap();
        for (j, &v) in g.v_params.iter().enumerate() {
            for (i, &u) in g.u_params.iter().enumerate() {
                let expected = bspline_point(&plain, u, v);
                let got = g.points[g.index(i, j)];
                assert!((expected - got).norm() < 1e-12, "({u}, {v}): {expected} vs {got}");
            }
        }
    }

    #[test]
    fn test_rational_quarter_cylinder() {
        // Quarter circle of radius 2 in u (exact with w = 1/sqrt(2)), extruded in v.
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let pts = vec![
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 3.0),
            Point3::new(2.0, 2.0, 3.0),
            Point3::new(0.0, 2.0, 3.0),
        ];
        let def = SurfaceDefinition::new(3, 2, 3, 2, pts)
            .with_weights(vec![1.0, h, 1.0, 1.0, h, 1.0])
            .with_tessellation(17.0, 3.0);
        let sampler = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap();
        let g = sampler.sample().unwrap();
        for (p, n) in g.points.iter().zip(&g.normals) {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert_abs_diff_eq!(r, 2.0, epsilon = 1e-12);
            // u runs counter-clockwise about +Z and v along +Z, so du x dv
            // points away from the axis.
            let radial = Vec3::new(p.x, p.y, 0.0) / r;
            assert_abs_diff_eq!(n.dot(&radial), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let pts = grid(4, 4, |i, j| (i as f64 - 1.5).powi(2) - (j as f64 * 0.5));
        let def = SurfaceDefinition::new(4, 4, 3, 3, pts)
            .with_weights(vec![1.0, 2.0, 0.5, 1.0, 1.0, 1.5, 1.0, 0.7, 1.2, 1.0, 1.0, 1.0, 0.9, 1.0, 3.0, 1.0]);
        let s = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap();
        let h = 1e-6;
        for &(u, v) in &[(0.2, 0.3), (0.5, 0.5), (0.8, 0.1), (0.35, 0.75)] {
            let d = s.derivatives_at(u, v).unwrap();
            let fd_u = (s.point_at(u + h, v).unwrap() - s.point_at(u - h, v).unwrap()) / (2.0 * h);
            let fd_v = (s.point_at(u, v + h).unwrap() - s.point_at(u, v - h).unwrap()) / (2.0 * h);
            assert!((d.du - fd_u).norm() < 1e-5, "du at ({u}, {v})");
            assert!((d.dv - fd_v).norm() < 1e-5, "dv at ({u}, {v})");
        }
    }

    #[test]
    fn test_degenerate_edge_normal_fallback() {
        // Triangle-like patch: the whole v = 1 row collapses to one apex.
        let apex = Point3::new(1.0, 2.0, 0.0);
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            apex,
            apex,
            apex,
        ];
        let def = SurfaceDefinition::new(3, 2, 2, 2, pts).with_tessellation(3.0, 2.0);
        let g = SurfaceSampler::new(&def, &SamplingOptions::default())
            .unwrap()
            .sample()
            .unwrap();
        for n in &g.normals {
            assert_abs_diff_eq!(n.z, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_point_at_clamps_parameters() {
        let def = SurfaceDefinition::new(2, 2, 2, 2, grid(2, 2, |_, _| 0.0));
        let s = SurfaceSampler::new(&def, &SamplingOptions::default()).unwrap();
        assert_eq!(s.point_at(-4.0, 9.0).unwrap(), Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_cached_sampling_is_identical() {
        let def = SurfaceDefinition::new(4, 3, 3, 2, grid(4, 3, |i, j| (i * j) as f64));
        let cache = BasisCache::new();
        let id = SurfaceId::next();
        let direct = SurfaceSampler::new(&def, &SamplingOptions::default())
            .unwrap()
            .sample()
            .unwrap();
        for _ in 0..2 {
            let cached = SurfaceSampler::new(&def, &SamplingOptions::default())
                .unwrap()
                .with_cache(&cache, id)
                .sample()
                .unwrap();
            assert_eq!(cached, direct);
        }
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
    }
}
