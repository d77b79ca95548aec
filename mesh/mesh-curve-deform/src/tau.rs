//! Bend-angle (Tau) model.
//!
//! For a bend window with parent `P`, pivot `O` and child `Q`, Tau maps a
//! point `R` to a scalar that rises from 0 along the ray `O -> P` to 1 along
//! the ray `O -> Q`. The angle of `R` around `O` is measured from `OQ` and
//! rescaled so that the full opening of the bend spans half a turn, which
//! makes the value comparable between bind pose and any later pose.
//!
//! The difference between the current and the bind-time Tau of a vertex
//! tells how far the bend has squashed (positive) or stretched (negative)
//! the region that vertex sits in.

use std::f64::consts::{PI, TAU as FULL_TURN};

use nalgebra::Point3;

use crate::joint::{JointChain, JointWindow};

/// Distances below this are treated as coincident points.
pub const COINCIDENT_EPSILON: f64 = 1e-12;

/// Tau of `r` for the bend window `(p, o, q)`.
///
/// Returns `None` when the value is undefined: `P`, `Q` or `R` coincides
/// with `O`, or both bones point the same way.
///
/// # Example
///
/// ```
/// use mesh_curve_deform::tau;
/// use nalgebra::Point3;
///
/// let p = Point3::new(0.0, 0.0, 0.0);
/// let o = Point3::new(1.0, 0.0, 0.0);
/// let q = Point3::new(2.0, 0.0, 0.0);
///
/// let along_child = tau(&p, &o, &q, &Point3::new(1.5, 0.0, 0.0)).unwrap();
/// assert!((along_child - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn tau(p: &Point3<f64>, o: &Point3<f64>, q: &Point3<f64>, r: &Point3<f64>) -> Option<f64> {
    let to_parent = p - o;
    let to_child = q - o;
    let to_point = r - o;

    let a = to_parent.norm();
    let b = to_child.norm();
    let dist = to_point.norm();
    if a <= COINCIDENT_EPSILON || b <= COINCIDENT_EPSILON || dist <= COINCIDENT_EPSILON {
        return None;
    }

    let parent_dir = to_parent / a;
    let child_dir = to_child / b;
    let point_dir = to_point / dist;

    let theta = point_dir.dot(&child_dir).clamp(-1.0, 1.0).acos();
    let alpha_min = parent_dir.dot(&child_dir).clamp(-1.0, 1.0).acos();

    // Reflex side when R and P lie on opposite sides of OQ
    let same_side = parent_dir.cross(&child_dir).dot(&point_dir.cross(&child_dir)) >= 0.0;
    let alpha = if same_side {
        alpha_min
    } else {
        FULL_TURN - alpha_min
    };
    if alpha <= COINCIDENT_EPSILON {
        return None;
    }

    let theta_flat = theta * PI / alpha;
    let epsilon = dist * theta_flat.cos();

    Some((a + a * epsilon.min(0.0) + b * epsilon.max(0.0)) / (a + b))
}

/// Tau of `r` for a window of `joints`.
///
/// Returns `None` if the window is out of range or Tau is undefined.
#[must_use]
pub fn window_tau(joints: &JointChain, window: JointWindow, r: &Point3<f64>) -> Option<f64> {
    let (p, o, q) = joints.window_positions(window).ok()?;
    tau(&p, &o, &q, r)
}
