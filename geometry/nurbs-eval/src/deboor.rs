//! De Boor's algorithm for non-rational B-spline evaluation.
//!
//! Evaluates a point by repeated affine interpolation of the control points
//! on the active span, without forming basis functions. It serves as an
//! independent reference for the basis-function evaluator.

use crate::basis::find_span;
use nalgebra::Point3;

/// Evaluate a non-rational B-spline at `u` with De Boor's algorithm.
///
/// `u` is expected to lie in the curve domain `[knots[degree], knots[n]]`.
/// Returns `None` unless `knots.len() == control_points.len() + degree + 1`
/// and there are more control points than the degree.
///
/// # Example
///
/// ```
/// use nurbs_eval::de_boor;
/// use nalgebra::Point3;
///
/// let points = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 2.0, 0.0),
///     Point3::new(2.0, 0.0, 0.0),
/// ];
/// let p = de_boor(&points, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0], 2, 0.5).unwrap();
/// assert!((p.y - 1.0).abs() < 1e-12);
/// assert!(de_boor(&points, &[0.0, 1.0], 2, 0.5).is_none());
/// ```
#[must_use]
pub fn de_boor(
    control_points: &[Point3<f64>],
    knots: &[f64],
    degree: usize,
    u: f64,
) -> Option<Point3<f64>> {
    if control_points.len() <= degree || knots.len() != control_points.len() + degree + 1 {
        return None;
    }

    let p = degree;
    let span = find_span(u, p, knots);

    let mut d: Vec<Point3<f64>> = (0..=p).map(|j| control_points[span - p + j]).collect();

    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom > 0.0 { (u - knots[i]) / denom } else { 0.0 };
            d[j] = Point3::from(d[j - 1].coords * (1.0 - alpha) + d[j].coords * alpha);
        }
    }

    Some(d[p])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{KnotVector, NurbsCurve};
    use approx::assert_relative_eq;

    #[test]
    fn test_matches_basis_evaluation() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.5),
            Point3::new(3.0, 2.0, -0.5),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(5.0, -1.0, 1.0),
        ];
        let knots = KnotVector::clamped_uniform(points.len(), 3).unwrap();
        let curve = NurbsCurve::non_rational(points.clone(), knots.clone(), 3).unwrap();

        for step in 0..=20 {
            let u = f64::from(step) / 20.0;
            assert_relative_eq!(
                de_boor(&points, knots.as_slice(), 3, u).unwrap().coords,
                curve.point_at(u).unwrap().coords,
                epsilon = 1e-3
            );
        }
    }

    #[test]
    fn test_endpoints() {
        let points = [Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 0.0, 0.0)];
        let knots = [0.0, 0.0, 1.0, 1.0];
        assert_relative_eq!(de_boor(&points, &knots, 1, 0.0).unwrap().coords, points[0].coords);
        assert_relative_eq!(de_boor(&points, &knots, 1, 1.0).unwrap().coords, points[1].coords);
    }

    #[test]
    fn test_mismatched_knots_are_rejected() {
        let points = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(de_boor(&points, &[0.0, 0.0, 1.0], 1, 0.5).is_none());
        assert!(de_boor(&points, &[0.0, 0.0, 1.0, 1.0, 1.0], 2, 0.5).is_none());
    }
}
