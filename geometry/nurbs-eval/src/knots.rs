//! Knot vectors.

use crate::{CurveError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A non-decreasing sequence of parameter breakpoints.
///
/// For a curve with `n` control points and degree `p` the knot vector holds
/// `n + p + 1` values. It is *clamped* when the first and last knots are each
/// repeated `p + 1` times, in which case the curve interpolates its first and
/// last control points.
///
/// # Example
///
/// ```
/// use nurbs_eval::KnotVector;
///
/// let knots = KnotVector::clamped_uniform(3, 2).unwrap();
/// assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
/// assert!(knots.is_clamped(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<f64>", into = "Vec<f64>"))]
pub struct KnotVector(Vec<f64>);

impl KnotVector {
    /// Create a knot vector, validating that it is finite and non-decreasing.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::Degenerate`] for an empty vector and
    /// [`CurveError::InvalidKnotVector`] for non-finite or decreasing knots.
    pub fn new(knots: Vec<f64>) -> Result<Self> {
        if knots.is_empty() {
            return Err(CurveError::degenerate("empty knot vector"));
        }

        if let Some(i) = knots.iter().position(|k| !k.is_finite()) {
            return Err(CurveError::invalid_knot_vector(format!(
                "knot {} is not finite ({})",
                i, knots[i]
            )));
        }

        for i in 1..knots.len() {
            if knots[i] < knots[i - 1] {
                return Err(CurveError::invalid_knot_vector(format!(
                    "knot vector is not non-decreasing at index {} ({} < {})",
                    i,
                    knots[i],
                    knots[i - 1]
                )));
            }
        }

        Ok(Self(knots))
    }

    /// Clamped knot vector over `[0, 1]` with uniform interior knots.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `degree + 1` control points are requested.
    pub fn clamped_uniform(num_control_points: usize, degree: usize) -> Result<Self> {
        let n = num_control_points;
        if n < degree + 1 {
            return Err(CurveError::insufficient_points(degree + 1, n));
        }

        let mut knots = Vec::with_capacity(n + degree + 1);
        knots.extend(std::iter::repeat_n(0.0, degree + 1));

        let num_interior = n - degree - 1;
        for i in 1..=num_interior {
            knots.push(i as f64 / (num_interior + 1) as f64);
        }

        knots.extend(std::iter::repeat_n(1.0, degree + 1));

        Self::new(knots)
    }

    /// Build a knot vector from the form most DCC hosts report.
    ///
    /// Hosts such as Maya store `n + p - 1` knots and leave out the outermost
    /// pair. The first and last knot are repeated once more to recover the
    /// full `n + p + 1` vector.
    ///
    /// ```
    /// use nurbs_eval::KnotVector;
    ///
    /// let knots = KnotVector::from_host_knots(&[0.0, 0.0, 1.0, 1.0]).unwrap();
    /// assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if `host_knots` is empty or not non-decreasing.
    pub fn from_host_knots(host_knots: &[f64]) -> Result<Self> {
        let (Some(&first), Some(&last)) = (host_knots.first(), host_knots.last()) else {
            return Err(CurveError::degenerate("empty knot vector"));
        };

        let mut knots = Vec::with_capacity(host_knots.len() + 2);
        knots.push(first);
        knots.extend_from_slice(host_knots);
        knots.push(last);
        Self::new(knots)
    }

    /// The knots as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of knots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector is empty. Always false for a validated vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First knot.
    #[must_use]
    pub fn first(&self) -> f64 {
        self.0[0]
    }

    /// Last knot.
    #[must_use]
    pub fn last(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Whether both ends are repeated `degree + 1` times.
    #[must_use]
    pub fn is_clamped(&self, degree: usize) -> bool {
        let m = degree + 1;
        if self.0.len() < 2 * m {
            return false;
        }
        let (first, last) = (self.first(), self.last());
        self.0[..m].iter().all(|&k| k == first) && self.0[self.0.len() - m..].iter().all(|&k| k == last)
    }
}

impl AsRef<[f64]> for KnotVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for KnotVector {
    type Error = CurveError;

    fn try_from(knots: Vec<f64>) -> Result<Self> {
        Self::new(knots)
    }
}

impl From<KnotVector> for Vec<f64> {
    fn from(knots: KnotVector) -> Self {
        knots.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_uniform_interior_knots() {
        let knots = KnotVector::clamped_uniform(5, 2).unwrap();
        assert_eq!(
            knots.as_slice(),
            &[0.0, 0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0, 1.0]
        );
        assert!(knots.is_clamped(2));
        assert!(!knots.is_clamped(3));
    }

    #[test]
    fn test_rejects_decreasing() {
        let err = KnotVector::new(vec![0.0, 1.0, 0.5]).unwrap_err();
        assert!(matches!(err, CurveError::InvalidKnotVector { .. }));
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(KnotVector::new(Vec::new()).unwrap_err().is_degenerate());
        assert!(KnotVector::new(vec![0.0, f64::NAN]).is_err());
        assert!(KnotVector::from_host_knots(&[]).unwrap_err().is_degenerate());
    }

    #[test]
    fn test_host_knots_padding() {
        // Cubic with 7 CVs as reported by the host: 9 knots
        let host = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0];
        let knots = KnotVector::from_host_knots(&host).unwrap();
        assert_eq!(knots.len(), 11);
        assert_eq!(knots.first(), 0.0);
        assert_eq!(knots.last(), 4.0);
        assert!(knots.is_clamped(3));
    }

    #[test]
    fn test_too_few_points() {
        let err = KnotVector::clamped_uniform(2, 3).unwrap_err();
        assert_eq!(err, CurveError::insufficient_points(4, 2));
    }
}
