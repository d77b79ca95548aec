//! Non-uniform rational B-spline (NURBS) curves.
//!
//! A NURBS curve is defined as:
//!
//! ```text
//! C(u) = Σ N_i,p(u) * w_i * P_i / Σ N_i,p(u) * w_i
//! ```
//!
//! where `P_i` are control points, `w_i` positive weights and `N_i,p` the
//! B-spline basis functions of degree `p` over the knot vector.

use crate::basis::{
    basis_functions, basis_functions_with_derivatives, basis_functions_with_exact_derivatives,
    find_span,
};
use crate::{CurveError, KnotVector, Result};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Basis values at or below this threshold are skipped during evaluation.
pub const NEGLIGIBLE_BASIS: f64 = 1e-4;

/// Smallest weight a host-supplied CV weight is clamped to.
pub const MIN_CV_WEIGHT: f64 = 0.001;

/// Fraction of the domain the last sample is nudged back by.
const END_NUDGE: f64 = 1e-6;

/// A NURBS curve: control points, per-point weights, knot vector and degree.
///
/// Parameters live in the knot domain (for a clamped curve,
/// `[knots[0], knots[last]]`), not in a normalized `[0, 1]` range.
///
/// # Example
///
/// ```
/// use nurbs_eval::{KnotVector, NurbsCurve};
/// use nalgebra::Point3;
///
/// let curve = NurbsCurve::non_rational(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(2.0, 0.0, 0.0),
///     ],
///     KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap(),
///     2,
/// )
/// .unwrap();
///
/// let mid = curve.point_at(0.5).unwrap();
/// assert!((mid.x - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "CurveParts", into = "CurveParts"))]
pub struct NurbsCurve {
    control_points: Vec<Point3<f64>>,
    weights: Vec<f64>,
    knots: KnotVector,
    degree: usize,
}

/// Serialized form of a [`NurbsCurve`], validated by [`NurbsCurve::new`] on
/// the way back in.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct CurveParts {
    control_points: Vec<Point3<f64>>,
    weights: Vec<f64>,
    knots: KnotVector,
    degree: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<CurveParts> for NurbsCurve {
    type Error = CurveError;

    fn try_from(parts: CurveParts) -> Result<Self> {
        Self::new(parts.control_points, parts.weights, parts.knots, parts.degree)
    }
}

#[cfg(feature = "serde")]
impl From<NurbsCurve> for CurveParts {
    fn from(curve: NurbsCurve) -> Self {
        Self {
            control_points: curve.control_points,
            weights: curve.weights,
            knots: curve.knots,
            degree: curve.degree,
        }
    }
}

impl NurbsCurve {
    /// Create a NURBS curve with explicit weights and knot vector.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The degree is zero
    /// - Fewer than `degree + 1` control points
    /// - Control points and weights have different lengths
    ///   ([`CurveError::WeightCountMismatch`])
    /// - Any weight is non-positive or not finite
    /// - The knot vector length is not `n + degree + 1`
    pub fn new(
        control_points: Vec<Point3<f64>>,
        weights: Vec<f64>,
        knots: KnotVector,
        degree: usize,
    ) -> Result<Self> {
        let n = control_points.len();

        if n == 0 {
            return Err(CurveError::degenerate("curve has no control points"));
        }

        if degree == 0 || degree >= n {
            return Err(CurveError::InvalidDegree {
                degree,
                min: 1,
                max: n.saturating_sub(1).max(1),
            });
        }

        if weights.len() != n {
            return Err(CurveError::WeightCountMismatch {
                expected: n,
                actual: weights.len(),
            });
        }

        for (i, &w) in weights.iter().enumerate() {
            if !(w > 0.0 && w.is_finite()) {
                return Err(CurveError::InvalidWeight { index: i, value: w });
            }
        }

        let expected_knots = n + degree + 1;
        if knots.len() != expected_knots {
            return Err(CurveError::invalid_knot_vector(format!(
                "expected {} knots for {} control points and degree {}, got {}",
                expected_knots,
                n,
                degree,
                knots.len()
            )));
        }

        let curve = Self {
            control_points,
            weights,
            knots,
            degree,
        };

        let (min, max) = curve.domain();
        if min >= max {
            return Err(CurveError::degenerate(format!(
                "empty parameter domain [{min}, {max}]"
            )));
        }

        Ok(curve)
    }

    /// Create a curve with all weights equal to one (a plain B-spline).
    ///
    /// # Errors
    ///
    /// Same conditions as [`NurbsCurve::new`].
    pub fn non_rational(
        control_points: Vec<Point3<f64>>,
        knots: KnotVector,
        degree: usize,
    ) -> Result<Self> {
        let weights = vec![1.0; control_points.len()];
        Self::new(control_points, weights, knots, degree)
    }

    /// Create a clamped curve with uniform interior knots over `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`NurbsCurve::new`].
    pub fn clamped(
        control_points: Vec<Point3<f64>>,
        weights: Vec<f64>,
        degree: usize,
    ) -> Result<Self> {
        let knots = KnotVector::clamped_uniform(control_points.len(), degree)?;
        Self::new(control_points, weights, knots, degree)
    }

    /// The control points.
    #[must_use]
    pub fn control_points(&self) -> &[Point3<f64>] {
        &self.control_points
    }

    /// The per-control-point weights.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The knot vector.
    #[must_use]
    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }

    /// The polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The order, `degree + 1`.
    #[must_use]
    pub fn order(&self) -> usize {
        self.degree + 1
    }

    /// Number of control points.
    #[must_use]
    pub fn num_control_points(&self) -> usize {
        self.control_points.len()
    }

    /// Whether any weight differs from one.
    #[must_use]
    pub fn is_rational(&self) -> bool {
        self.weights.iter().any(|&w| w != 1.0)
    }

    /// The evaluable parameter domain `(knots[p], knots[n])`.
    ///
    /// For a clamped curve this is `(knots[0], knots[last])`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        let k = self.knots.as_slice();
        (k[self.degree], k[self.control_points.len()])
    }

    /// Clamp `u` into the domain, nudging the exact upper bound slightly
    /// inward.
    ///
    /// A `NaN` parameter maps to the start of the domain.
    #[must_use]
    pub fn clamp_param(&self, u: f64) -> f64 {
        let (min, max) = self.domain();
        if u.is_nan() || u <= min {
            min
        } else if u >= max {
            max - (max - min) * END_NUDGE
        } else {
            u
        }
    }

    /// Evaluate the curve position at parameter `u`.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::ParameterOutOfDomain`] if `u` is outside the
    /// domain (or `NaN`).
    pub fn point_at(&self, u: f64) -> Result<Point3<f64>> {
        self.point_at_with(&self.control_points, u)
    }

    /// Evaluate the curve with substitute control points.
    ///
    /// Uses this curve's knots, weights and degree with `control_points` in
    /// place of its own, which is how a reconstructed (offset) curve is
    /// evaluated without building a new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of control points differs from this
    /// curve's, or if `u` is outside the domain.
    pub fn point_at_with(&self, control_points: &[Point3<f64>], u: f64) -> Result<Point3<f64>> {
        self.check_control_points(control_points)?;
        let u = self.check_domain(u)?;

        let knots = self.knots.as_slice();
        let span = find_span(u, self.degree, knots);
        let n_basis = basis_functions(span, u, self.degree, knots);

        let mut numerator = Vector3::zeros();
        let mut denominator = 0.0;

        for (r, &n) in n_basis.iter().enumerate() {
            if n > NEGLIGIBLE_BASIS {
                let i = span - self.degree + r;
                let wn = self.weights[i] * n;
                numerator += control_points[i].coords * wn;
                denominator += wn;
            }
        }

        if denominator <= 0.0 {
            return Err(CurveError::out_of_domain(u, self.domain()));
        }

        Ok(Point3::from(numerator / denominator))
    }

    /// Tangent of the curve at `u` (not normalized).
    ///
    /// Computed by the quotient rule on the rational form,
    /// `C' = (A' W - A W') / W²` with `A = Σ w N P` and `W = Σ w N`, using the
    /// order-scaled basis derivatives of
    /// [`basis_derivative`](crate::basis_derivative). The direction is that
    /// of the true derivative and the length is `order / degree` times it;
    /// see [`NurbsCurve::derivative_at`].
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::ParameterOutOfDomain`] if `u` is outside the
    /// domain.
    pub fn tangent_at(&self, u: f64) -> Result<Vector3<f64>> {
        self.quotient_derivative(u, basis_functions_with_derivatives)
    }

    /// True first derivative `dC/du` at `u`.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::ParameterOutOfDomain`] if `u` is outside the
    /// domain.
    pub fn derivative_at(&self, u: f64) -> Result<Vector3<f64>> {
        self.quotient_derivative(u, basis_functions_with_exact_derivatives)
    }

    fn quotient_derivative(
        &self,
        u: f64,
        table: fn(usize, f64, usize, &[f64]) -> (Vec<f64>, Vec<f64>),
    ) -> Result<Vector3<f64>> {
        let u = self.check_domain(u)?;

        let knots = self.knots.as_slice();
        let span = find_span(u, self.degree, knots);
        let (values, derivatives) = table(span, u, self.degree, knots);

        let mut a = Vector3::zeros();
        let mut a_prime = Vector3::zeros();
        let mut w_sum = 0.0;
        let mut w_prime = 0.0;

        for (r, (&n, &dn)) in values.iter().zip(derivatives.iter()).enumerate() {
            // A function can vanish at u while its slope does not (e.g. at
            // a clamped end), so only skip when both are negligible.
            if n <= NEGLIGIBLE_BASIS && dn.abs() <= NEGLIGIBLE_BASIS {
                continue;
            }
            let i = span - self.degree + r;
            let w = self.weights[i];
            let p = self.control_points[i].coords;

            a += p * (w * n);
            w_sum += w * n;
            a_prime += p * (w * dn);
            w_prime += w * dn;
        }

        if w_sum <= 0.0 {
            return Err(CurveError::out_of_domain(u, self.domain()));
        }

        Ok((a_prime * w_sum - a * w_prime) / (w_sum * w_sum))
    }

    /// Parameters of `lod` evenly spaced samples over the domain.
    ///
    /// The final sample is nudged back inside the domain. Returns an empty
    /// vector for `lod == 0` and the domain start for `lod == 1`.
    #[must_use]
    pub fn sample_params(&self, lod: usize) -> Vec<f64> {
        let (min, max) = self.domain();
        match lod {
            0 => Vec::new(),
            1 => vec![min],
            _ => (0..lod)
                .map(|i| {
                    let u = min + (max - min) * i as f64 / (lod - 1) as f64;
                    if i == lod - 1 { self.clamp_param(u) } else { u }
                })
                .collect(),
        }
    }

    /// Evaluate `lod` evenly spaced points along the curve.
    ///
    /// Each call recomputes the samples; nothing is cached on the curve.
    ///
    /// # Errors
    ///
    /// Only fails if evaluation fails, which cannot happen for in-domain
    /// parameters of a validated curve.
    pub fn sample(&self, lod: usize) -> Result<Vec<Point3<f64>>> {
        self.sample_params(lod)
            .into_iter()
            .map(|u| self.point_at(u))
            .collect()
    }

    fn check_domain(&self, u: f64) -> Result<f64> {
        let (min, max) = self.domain();
        if u.is_nan() || u < min || u > max {
            return Err(CurveError::out_of_domain(u, (min, max)));
        }
        Ok(u)
    }

    fn check_control_points(&self, control_points: &[Point3<f64>]) -> Result<()> {
        if control_points.len() != self.control_points.len() {
            return Err(CurveError::ControlPointMismatch {
                expected: self.control_points.len(),
                actual: control_points.len(),
            });
        }
        Ok(())
    }
}

/// Fit host-supplied per-CV weights to a curve with `num_control_points` CVs.
///
/// Missing weights are padded with `1.0`, extra weights are dropped and every
/// weight is clamped to at least [`MIN_CV_WEIGHT`].
///
/// ```
/// use nurbs_eval::fit_weights;
///
/// assert_eq!(fit_weights(&[2.0, 0.0], 3), vec![2.0, 0.001, 1.0]);
/// assert_eq!(fit_weights(&[1.0, 1.0, 1.0, 5.0], 3), vec![1.0, 1.0, 1.0]);
/// ```
#[must_use]
pub fn fit_weights(weights: &[f64], num_control_points: usize) -> Vec<f64> {
    (0..num_control_points)
        .map(|i| {
            weights
                .get(i)
                .copied()
                .filter(|w| !w.is_nan())
                .unwrap_or(1.0)
                .max(MIN_CV_WEIGHT)
        })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::redundant_clone
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arch() -> NurbsCurve {
        NurbsCurve::non_rational(
            vec![
                Point3::new(10.0, 10.0, 0.0),
                Point3::new(5.0, 10.0, 2.0),
                Point3::new(-5.0, 5.0, 0.0),
                Point3::new(10.0, 5.0, -2.0),
                Point3::new(4.0, 10.0, 0.0),
                Point3::new(4.0, 5.0, 2.0),
                Point3::new(8.0, 1.0, 0.0),
            ],
            KnotVector::new(vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]).unwrap(),
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_interpolates_clamped_ends() {
        let curve = arch();
        let (min, max) = curve.domain();
        assert_eq!((min, max), (0.0, 4.0));

        assert_relative_eq!(
            curve.point_at(min).unwrap().coords,
            curve.control_points()[0].coords,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            curve.point_at(max).unwrap().coords,
            curve.control_points()[6].coords,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            curve.point_at(curve.clamp_param(max)).unwrap().coords,
            curve.control_points()[6].coords,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_out_of_domain() {
        let curve = arch();
        assert!(curve.point_at(-0.5).unwrap_err().is_out_of_domain());
        assert!(curve.point_at(4.5).unwrap_err().is_out_of_domain());
        assert!(curve.point_at(f64::NAN).unwrap_err().is_out_of_domain());
        assert!(curve.tangent_at(5.0).unwrap_err().is_out_of_domain());
    }

    #[test]
    fn test_clamp_param() {
        let curve = arch();
        assert_eq!(curve.clamp_param(-3.0), 0.0);
        assert_eq!(curve.clamp_param(2.5), 2.5);
        let end = curve.clamp_param(7.0);
        assert!(end < 4.0 && end > 4.0 - 1e-3);
        assert_eq!(curve.clamp_param(f64::NAN), 0.0);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let curve = NurbsCurve::new(
            arch().control_points().to_vec(),
            vec![1.0, 2.0, 0.5, 1.0, 3.0, 1.0, 1.0],
            arch().knots().clone(),
            3,
        )
        .unwrap();

        let h = 1e-6;
        for &u in &[0.25, 1.4, 2.5, 3.6] {
            let numeric = (curve.point_at(u + h).unwrap() - curve.point_at(u - h).unwrap()) / (2.0 * h);
            assert_relative_eq!(curve.derivative_at(u).unwrap(), numeric, epsilon = 1e-4);
            // Tangents carry the order / degree scale
            assert_relative_eq!(
                curve.tangent_at(u).unwrap(),
                curve.derivative_at(u).unwrap() * 4.0 / 3.0,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_tangent_at_clamped_start() {
        // C'(0) = p / (u_{p+1} - u_1) * (P1 - P0) for a clamped B-spline;
        // the tangent uses the order k in place of p
        let curve = arch();
        let chord = curve.control_points()[1] - curve.control_points()[0];
        assert_relative_eq!(curve.derivative_at(0.0).unwrap(), chord * 3.0, epsilon = 1e-9);
        assert_relative_eq!(curve.tangent_at(0.0).unwrap(), chord * 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_quadratic_is_linear() {
        let curve = NurbsCurve::clamped(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![1.0; 3],
            2,
        )
        .unwrap();

        for &u in &[0.1, 0.5, 0.9] {
            assert_relative_eq!(curve.point_at(u).unwrap().x, 2.0 * u, epsilon = 1e-12);
            assert_relative_eq!(
                curve.derivative_at(u).unwrap(),
                Vector3::new(2.0, 0.0, 0.0),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                curve.tangent_at(u).unwrap(),
                Vector3::new(3.0, 0.0, 0.0),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_weight_pulls_towards_control_point() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let unit = NurbsCurve::clamped(points.clone(), vec![1.0, 1.0, 1.0], 2).unwrap();
        let heavy = NurbsCurve::clamped(points, vec![1.0, 10.0, 1.0], 2).unwrap();
        assert!(heavy.point_at(0.5).unwrap().y > unit.point_at(0.5).unwrap().y);
        assert!(heavy.is_rational());
        assert!(!unit.is_rational());
    }

    #[test]
    fn test_point_at_with_substitute_points() {
        let curve = arch();
        let shifted: Vec<_> = curve
            .control_points()
            .iter()
            .map(|p| p + Vector3::new(0.0, 0.0, 1.0))
            .collect();
        let a = curve.point_at(1.7).unwrap();
        let b = curve.point_at_with(&shifted, 1.7).unwrap();
        assert_relative_eq!(b - a, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);

        let err = curve.point_at_with(&shifted[..3], 1.7).unwrap_err();
        assert_eq!(
            err,
            CurveError::ControlPointMismatch {
                expected: 7,
                actual: 3
            }
        );
    }

    #[test]
    fn test_sample() {
        let curve = arch();
        let params = curve.sample_params(20);
        assert_eq!(params.len(), 20);
        assert_eq!(params[0], 0.0);
        assert!(params[19] < 4.0 && params[19] > 3.999);

        let first = curve.sample(20).unwrap();
        let second = curve.sample(20).unwrap();
        assert_eq!(first, second);
        assert!(curve.sample(0).unwrap().is_empty());
        assert_eq!(curve.sample(1).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_construction() {
        let points = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let knots = KnotVector::new(vec![0.0, 0.0, 1.0, 1.0]).unwrap();

        assert!(matches!(
            NurbsCurve::non_rational(points.clone(), knots.clone(), 0),
            Err(CurveError::InvalidDegree { .. })
        ));
        assert!(matches!(
            NurbsCurve::new(points.clone(), vec![1.0, -1.0], knots.clone(), 1),
            Err(CurveError::InvalidWeight { index: 1, .. })
        ));
        assert_eq!(
            NurbsCurve::new(points.clone(), vec![1.0], knots.clone(), 1),
            Err(CurveError::WeightCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            NurbsCurve::non_rational(
                points.clone(),
                KnotVector::new(vec![0.0, 1.0, 1.0]).unwrap(),
                1
            ),
            Err(CurveError::InvalidKnotVector { .. })
        ));
        assert!(
            NurbsCurve::non_rational(Vec::new(), knots.clone(), 1)
                .unwrap_err()
                .is_degenerate()
        );
        assert!(
            NurbsCurve::non_rational(
                points,
                KnotVector::new(vec![1.0, 1.0, 1.0, 1.0]).unwrap(),
                1
            )
            .unwrap_err()
            .is_degenerate()
        );
    }

    #[test]
    fn test_fit_weights() {
        assert_eq!(fit_weights(&[], 2), vec![1.0, 1.0]);
        assert_eq!(fit_weights(&[0.5, -2.0, f64::NAN], 3), vec![0.5, 0.001, 1.0]);
    }
}
