//! Error types for binding and deformation.

use nurbs_eval::CurveError;
use thiserror::Error;

/// Minimum number of joints needed to form a bend window.
pub const MIN_JOINTS: usize = 3;

/// Errors that can occur while binding or deforming.
///
/// Geometric singularities (coincident points, zero-length bones) never
/// surface here; they are resolved locally with a fallback value. These
/// errors describe structural problems with the inputs.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DeformError {
    /// Fewer joints than a bend window needs.
    #[error("insufficient joints: need at least {required}, got {actual}")]
    InsufficientJoints {
        /// Minimum number of joints.
        required: usize,
        /// Number of joints supplied.
        actual: usize,
    },

    /// A required curve is missing.
    #[error("{role} curve is missing")]
    NullCurve {
        /// Which curve is missing ("input" or "base").
        role: &'static str,
    },

    /// Inputs disagree on element counts.
    #[error("topology mismatch: expected {expected} {what}, got {actual}")]
    TopologyMismatch {
        /// What is being counted.
        what: &'static str,
        /// Count recorded at bind time (or required by another input).
        expected: usize,
        /// Count supplied.
        actual: usize,
    },

    /// Skin weights for a control point are unusable.
    #[error("invalid skin weights for control point {cv}: {reason}")]
    InvalidSkinWeights {
        /// Control point index.
        cv: usize,
        /// What is wrong with the row.
        reason: String,
    },

    /// Deformation was requested before any bind state exists.
    #[error("deformer has not been initialized")]
    NotInitialized,

    /// The curve itself is invalid or was evaluated out of domain.
    #[error(transparent)]
    Curve(#[from] CurveError),
}

impl DeformError {
    /// Create an insufficient joints error.
    #[must_use]
    pub fn insufficient_joints(actual: usize) -> Self {
        Self::InsufficientJoints {
            required: MIN_JOINTS,
            actual,
        }
    }

    /// Create a topology mismatch error.
    #[must_use]
    pub fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::TopologyMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Whether the error means the curve is absent or degenerate.
    #[must_use]
    pub fn is_degenerate_curve(&self) -> bool {
        match self {
            Self::NullCurve { .. } => true,
            Self::Curve(e) => e.is_degenerate(),
            _ => false,
        }
    }
}

/// Result type for deformer operations.
pub type DeformResult<T> = Result<T, DeformError>;
