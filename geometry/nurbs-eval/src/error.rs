//! Error types for curve construction and evaluation.

use thiserror::Error;

/// Errors that can occur while building or evaluating a NURBS curve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    /// Insufficient control points for the requested degree.
    #[error("insufficient points: need at least {required}, got {actual}")]
    InsufficientPoints {
        /// Minimum required points.
        required: usize,
        /// Actual number of points provided.
        actual: usize,
    },

    /// Invalid degree for the curve.
    #[error("invalid degree {degree}: must be between {min} and {max}")]
    InvalidDegree {
        /// Specified degree.
        degree: usize,
        /// Minimum allowed degree.
        min: usize,
        /// Maximum allowed degree.
        max: usize,
    },

    /// Knot vector is invalid for the given curve parameters.
    #[error("invalid knot vector: {reason}")]
    InvalidKnotVector {
        /// Description of what's wrong with the knot vector.
        reason: String,
    },

    /// Weight values are invalid (negative, zero or not finite).
    #[error("invalid weight at index {index}: {value} (must be positive)")]
    InvalidWeight {
        /// Index of the invalid weight.
        index: usize,
        /// The invalid weight value.
        value: f64,
    },

    /// Weights and control points have different lengths.
    #[error("weight count mismatch: expected {expected}, got {actual}")]
    WeightCountMismatch {
        /// Number of control points.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// Substitute control points do not match the curve's control point count.
    #[error("control point count mismatch: expected {expected}, got {actual}")]
    ControlPointMismatch {
        /// Control points the curve was built with.
        expected: usize,
        /// Control points supplied for evaluation.
        actual: usize,
    },

    /// Curve evaluated outside its parameter domain.
    ///
    /// This is a caller contract violation: clamp with
    /// [`NurbsCurve::clamp_param`](crate::NurbsCurve::clamp_param) first.
    #[error("parameter {u} is outside the curve domain [{min}, {max}]")]
    ParameterOutOfDomain {
        /// The requested parameter.
        u: f64,
        /// Domain start.
        min: f64,
        /// Domain end.
        max: f64,
    },

    /// Degenerate curve (empty knot vector, no control points, ...).
    #[error("degenerate curve: {reason}")]
    Degenerate {
        /// Description of the degeneracy.
        reason: String,
    },
}

impl CurveError {
    /// Create an insufficient points error.
    #[must_use]
    pub fn insufficient_points(required: usize, actual: usize) -> Self {
        Self::InsufficientPoints { required, actual }
    }

    /// Create an invalid knot vector error.
    #[must_use]
    pub fn invalid_knot_vector(reason: impl Into<String>) -> Self {
        Self::InvalidKnotVector {
            reason: reason.into(),
        }
    }

    /// Create a degenerate curve error.
    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::Degenerate {
            reason: reason.into(),
        }
    }

    /// Create an out-of-domain error.
    #[must_use]
    pub fn out_of_domain(u: f64, (min, max): (f64, f64)) -> Self {
        Self::ParameterOutOfDomain { u, min, max }
    }

    /// Check if this is an out-of-domain evaluation.
    #[must_use]
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Self::ParameterOutOfDomain { .. })
    }

    /// Check if this error describes a degenerate curve.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CurveError::insufficient_points(4, 2);
        assert!(err.to_string().contains("need at least 4"));
        assert!(err.to_string().contains("got 2"));

        let err = CurveError::out_of_domain(1.5, (0.0, 1.0));
        assert!(err.to_string().contains("1.5"));
        assert!(err.to_string().contains("[0, 1]"));
    }

    #[test]
    fn test_error_predicates() {
        let err = CurveError::out_of_domain(-0.1, (0.0, 1.0));
        assert!(err.is_out_of_domain());
        assert!(!err.is_degenerate());

        let err = CurveError::degenerate("empty knot vector");
        assert!(err.is_degenerate());
        assert!(!err.is_out_of_domain());
    }

    #[test]
    fn test_error_constructors() {
        let err = CurveError::WeightCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "weight count mismatch: expected 3, got 2");

        let err = CurveError::invalid_knot_vector("not monotonic");
        assert!(
            matches!(err, CurveError::InvalidKnotVector { reason } if reason == "not monotonic")
        );
    }
}
