//! NURBS curve evaluation.
//!
//! This crate provides the numerical core for working with non-uniform
//! rational B-spline curves:
//!
//! - [`KnotVector`] - Validated, non-decreasing knot sequences
//! - [`basis`] / [`basis_derivative`] - Cox–de Boor basis recursion
//! - [`find_span`] / [`basis_functions`] - Bottom-up triangular basis table
//! - [`NurbsCurve`] - Rational point, tangent and derivative evaluation,
//!   sampling and closest point queries
//! - [`de_boor`] - De Boor's algorithm for non-rational evaluation
//!
//! # Example
//!
//! ```
//! use nurbs_eval::{KnotVector, NurbsCurve};
//! use nalgebra::Point3;
//!
//! let curve = NurbsCurve::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 2.0, 0.0),
//!         Point3::new(3.0, 2.0, 0.0),
//!         Point3::new(4.0, 0.0, 0.0),
//!     ],
//!     vec![1.0, 2.0, 2.0, 1.0],
//!     KnotVector::clamped_uniform(4, 3).unwrap(),
//!     3,
//! )
//! .unwrap();
//!
//! let mid = curve.point_at(0.5).unwrap();
//! let tangent = curve.tangent_at(0.5).unwrap();
//! assert!(tangent.x > 0.0);
//! # let _ = mid;
//! ```
//!
//! # Parameterization
//!
//! Unlike most curve types in the workspace, parameters are *knot domain*
//! values rather than a normalized `[0, 1]` range. Evaluating outside the
//! domain returns [`CurveError::ParameterOutOfDomain`]; use
//! [`NurbsCurve::clamp_param`] to bring a parameter into range.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Feature Flags
//!
//! - `serde` (default): Serialization for curves, knot vectors and closest
//!   point results

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::suboptimal_flops,
    clippy::needless_range_loop,
    clippy::module_name_repetitions
)]

mod basis;
mod closest;
mod curve;
mod deboor;
mod error;
mod knots;

pub use basis::{
    basis, basis_derivative, basis_exact_derivative, basis_functions,
    basis_functions_with_derivatives, basis_functions_with_exact_derivatives, find_span,
};
pub use closest::{ClosestPoint, DEFAULT_CLOSEST_SAMPLES};
pub use curve::{MIN_CV_WEIGHT, NEGLIGIBLE_BASIS, NurbsCurve, fit_weights};
pub use deboor::de_boor;
pub use error::CurveError;
pub use knots::KnotVector;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

/// Result type for curve operations.
pub type Result<T> = std::result::Result<T, CurveError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod integration_tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Quarter circle as a rational quadratic.
    fn quarter_circle() -> NurbsCurve {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        NurbsCurve::new(
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![1.0, w, 1.0],
            KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap(),
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_rational_curve_is_exact_circle() {
        let arc = quarter_circle();
        for p in arc.sample(25).unwrap() {
            assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_circle_tangent_is_perpendicular_to_radius() {
        let arc = quarter_circle();
        for &u in &[0.1, 0.4, 0.8] {
            let p = arc.point_at(u).unwrap();
            let t = arc.tangent_at(u).unwrap();
            assert!(p.coords.dot(&t).abs() < 1e-9);
            // Counter-clockwise travel
            assert!(p.coords.cross(&t).z > 0.0);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let arc = quarter_circle();
        let json = serde_json::to_string(&arc).unwrap();
        let restored: NurbsCurve = serde_json::from_str(&json).unwrap();
        assert_eq!(arc, restored);

        // Invalid knot vectors are rejected on the way in
        let bad = json.replace("[0.0,0.0,0.0,1.0,1.0,1.0]", "[0.0,1.0,0.0,1.0,1.0,1.0]");
        assert!(serde_json::from_str::<NurbsCurve>(&bad).is_err());

        // So are weights that no longer match the control points
        let mut value = serde_json::to_value(&arc).unwrap();
        value["weights"] = serde_json::json!([1.0]);
        let err = serde_json::from_value::<NurbsCurve>(value).unwrap_err();
        assert!(err.to_string().contains("weight count mismatch"));
    }
}
