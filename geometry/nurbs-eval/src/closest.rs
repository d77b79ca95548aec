//! Closest point queries.

use crate::{NurbsCurve, Result};
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of coarse samples taken before refinement.
pub const DEFAULT_CLOSEST_SAMPLES: usize = 100;

/// Result of a closest point query.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClosestPoint {
    /// Curve parameter of the closest point.
    pub param: f64,
    /// The closest point on the curve.
    pub point: Point3<f64>,
    /// Distance from the query point.
    pub distance: f64,
}

impl NurbsCurve {
    /// Find the closest point on the curve to `point`.
    ///
    /// Takes `samples + 1` evenly spaced samples over the domain, then
    /// refines the best one with a golden section search over the
    /// neighbouring sample interval. Precision is good to roughly `1e-8` in
    /// parameter space for well-separated minima, which is plenty for
    /// binding.
    ///
    /// # Errors
    ///
    /// Only fails if evaluation fails, which cannot happen for a validated
    /// curve.
    ///
    /// # Example
    ///
    /// ```
    /// use nurbs_eval::NurbsCurve;
    /// use nalgebra::Point3;
    ///
    /// let line = NurbsCurve::clamped(
    ///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
    ///     vec![1.0; 3],
    ///     2,
    /// )
    /// .unwrap();
    ///
    /// let hit = line.closest_point(&Point3::new(1.5, 1.0, 0.0), 100).unwrap();
    /// assert!((hit.param - 0.75).abs() < 1e-6);
    /// assert!((hit.distance - 1.0).abs() < 1e-6);
    /// ```
    pub fn closest_point(&self, point: &Point3<f64>, samples: usize) -> Result<ClosestPoint> {
        let (min, max) = self.domain();
        let n = samples.max(2);
        let step = (max - min) / n as f64;
        let at = |i: usize| if i == n { max } else { min + step * i as f64 };

        // Initial sampling
        let mut best_u = min;
        let mut best_dist = f64::MAX;

        for i in 0..=n {
            let u = at(i);
            let dist = (self.point_at(u)? - point).norm();

            if dist < best_dist {
                best_dist = dist;
                best_u = u;
            }
        }

        // Refine with golden section search
        let golden = (5.0_f64.sqrt() - 1.0) / 2.0;
        let tol = 1e-10 * (max - min).max(1.0);

        let mut a = (best_u - step).max(min);
        let mut b = (best_u + step).min(max);

        let mut c = b - golden * (b - a);
        let mut d = a + golden * (b - a);
        let mut fc = (self.point_at(c)? - point).norm();
        let mut fd = (self.point_at(d)? - point).norm();

        while (b - a) > tol {
            if fc < fd {
                b = d;
                d = c;
                fd = fc;
                c = b - golden * (b - a);
                fc = (self.point_at(c)? - point).norm();
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + golden * (b - a);
                fd = (self.point_at(d)? - point).norm();
            }
        }

        let mut param = (a + b) / 2.0;
        let mut closest = self.point_at(param)?;
        let mut distance = (closest - point).norm();

        // Keep the sampled optimum if refinement wandered off it
        if best_dist < distance {
            param = best_u;
            closest = self.point_at(param)?;
            distance = best_dist;
        }

        Ok(ClosestPoint {
            param,
            point: closest,
            distance,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::KnotVector;
    use approx::assert_relative_eq;

    fn bow() -> NurbsCurve {
        NurbsCurve::non_rational(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(3.0, 2.0, 0.0),
                Point3::new(4.0, 0.0, 0.0),
            ],
            KnotVector::new(vec![0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 2.0]).unwrap(),
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_point_on_curve_is_found() {
        let curve = bow();
        let target = curve.point_at(0.7).unwrap();
        let hit = curve.closest_point(&target, DEFAULT_CLOSEST_SAMPLES).unwrap();
        assert_relative_eq!(hit.param, 0.7, epsilon = 1e-6);
        assert!(hit.distance < 1e-9);
    }

    #[test]
    fn test_offset_is_perpendicular() {
        let curve = bow();
        // Apex of the symmetric bow is at u = 1, tangent along +X
        let hit = curve
            .closest_point(&Point3::new(2.0, 3.0, 0.0), DEFAULT_CLOSEST_SAMPLES)
            .unwrap();
        assert_relative_eq!(hit.param, 1.0, epsilon = 1e-6);
        let tangent = curve.tangent_at(hit.param).unwrap();
        let offset = Point3::new(2.0, 3.0, 0.0) - hit.point;
        assert!(offset.dot(&tangent).abs() < 1e-6);
    }

    #[test]
    fn test_clamps_to_ends() {
        let curve = bow();
        let hit = curve
            .closest_point(&Point3::new(-3.0, -1.0, 0.0), DEFAULT_CLOSEST_SAMPLES)
            .unwrap();
        assert_relative_eq!(hit.param, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hit.point.coords, Point3::origin().coords, epsilon = 1e-9);
    }
}
