//! Per-CV joint weights and rotation blending.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};

use crate::config::RotationBlend;
use crate::error::{DeformError, DeformResult};
use crate::joint::JointChain;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Joint influence weights for each control point of the driving curve.
///
/// Rows are indexed by control point and hold one weight per joint. Rows
/// are normalized to sum to one on construction.
///
/// # Example
///
/// ```
/// use mesh_curve_deform::SkinWeights;
///
/// let weights = SkinWeights::new(vec![vec![2.0, 2.0, 0.0], vec![0.0, 0.0, 1.0]]).unwrap();
/// assert_eq!(weights.row(0), Some(&[0.5, 0.5, 0.0][..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkinWeights {
    rows: Vec<Vec<f64>>,
    num_joints: usize,
}

impl SkinWeights {
    /// Create weights from one row per control point.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidSkinWeights`] if rows differ in length,
    /// contain negative or non-finite values, or sum to zero.
    pub fn new(rows: Vec<Vec<f64>>) -> DeformResult<Self> {
        let num_joints = rows.first().map_or(0, Vec::len);
        let mut normalized = Vec::with_capacity(rows.len());

        for (cv, row) in rows.into_iter().enumerate() {
            if row.len() != num_joints {
                return Err(DeformError::InvalidSkinWeights {
                    cv,
                    reason: format!("expected {num_joints} weights, got {}", row.len()),
                });
            }
            if let Some(bad) = row.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(DeformError::InvalidSkinWeights {
                    cv,
                    reason: format!("weight {bad} is negative or not finite"),
                });
            }
            let sum: f64 = row.iter().sum();
            if sum <= 0.0 {
                return Err(DeformError::InvalidSkinWeights {
                    cv,
                    reason: "weights sum to zero".to_string(),
                });
            }
            normalized.push(row.into_iter().map(|w| w / sum).collect());
        }

        Ok(Self {
            rows: normalized,
            num_joints,
        })
    }

    /// Bind each control point fully to one joint.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InvalidSkinWeights`] if an assignment indexes
    /// past `num_joints`.
    pub fn rigid(assignments: &[usize], num_joints: usize) -> DeformResult<Self> {
        let rows = assignments
            .iter()
            .enumerate()
            .map(|(cv, &joint)| {
                if joint >= num_joints {
                    return Err(DeformError::InvalidSkinWeights {
                        cv,
                        reason: format!("joint {joint} out of range for {num_joints} joints"),
                    });
                }
                let mut row = vec![0.0; num_joints];
                row[joint] = 1.0;
                Ok(row)
            })
            .collect::<DeformResult<Vec<_>>>()?;
        Self::new(rows)
    }

    /// Number of control points.
    #[must_use]
    pub fn num_control_points(&self) -> usize {
        self.rows.len()
    }

    /// Number of joints per row.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.num_joints
    }

    /// Weights for control point `cv`.
    #[must_use]
    pub fn row(&self, cv: usize) -> Option<&[f64]> {
        self.rows.get(cv).map(Vec::as_slice)
    }

    /// Iterate over rows in control point order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Blended orientation of every control point for the given pose.
    #[must_use]
    pub fn blend_all(&self, joints: &JointChain, mode: RotationBlend) -> Vec<Rotation3<f64>> {
        self.rows()
            .map(|row| blend_orientation(joints, row, mode))
            .collect()
    }
}

/// Blend the orientations of `joints` with `weights`.
///
/// Joints with zero weight do not contribute. Weights past the end of the
/// chain are ignored.
#[must_use]
pub fn blend_orientation(joints: &JointChain, weights: &[f64], mode: RotationBlend) -> Rotation3<f64> {
    match mode {
        RotationBlend::Euler => {
            let angles = joints
                .joints()
                .iter()
                .zip(weights)
                .filter(|&(_, &w)| w > 0.0)
                .fold(Vector3::zeros(), |acc, (joint, &w)| acc + joint.euler_angles() * w);
            Rotation3::from_euler_angles(angles.x, angles.y, angles.z)
        }
        RotationBlend::Quaternion => {
            let mut blended: Option<UnitQuaternion<f64>> = None;
            let mut total = 0.0;

            for (joint, &w) in joints.joints().iter().zip(weights) {
                if w <= 0.0 {
                    continue;
                }
                total += w;
                let next = joint.orientation;
                blended = Some(match blended {
                    None => next,
                    Some(current) => {
                        // Stay in the same hemisphere so the blend takes the short arc
                        let next = if current.coords.dot(&next.coords) < 0.0 {
                            UnitQuaternion::new_unchecked(-next.into_inner())
                        } else {
                            next
                        };
                        let t = w / total;
                        current
                            .try_slerp(&next, t, 1e-9)
                            .unwrap_or_else(|| current.nlerp(&next, t))
                    }
                });
            }

            blended
                .unwrap_or_else(UnitQuaternion::identity)
                .to_rotation_matrix()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::joint::Joint;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn chain(yaws: &[f64]) -> JointChain {
        yaws.iter()
            .enumerate()
            .map(|(i, &yaw)| {
                Joint::new(
                    Point3::new(i as f64, 0.0, 0.0),
                    UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
                )
            })
            .collect()
    }

    #[test]
    fn test_rows_are_normalized() {
        let weights = SkinWeights::new(vec![vec![1.0, 3.0], vec![0.0, 5.0]]).unwrap();
        assert_eq!(weights.num_control_points(), 2);
        assert_eq!(weights.num_joints(), 2);
        for row in weights.rows() {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(weights.row(0).unwrap()[1], 0.75);
    }

    #[test]
    fn test_invalid_rows_are_rejected() {
        assert!(matches!(
            SkinWeights::new(vec![vec![1.0, 0.0], vec![1.0]]),
            Err(DeformError::InvalidSkinWeights { cv: 1, .. })
        ));
        assert!(SkinWeights::new(vec![vec![-1.0, 2.0]]).is_err());
        assert!(SkinWeights::new(vec![vec![f64::NAN, 2.0]]).is_err());
        assert!(SkinWeights::new(vec![vec![0.0, 0.0]]).is_err());
        assert!(SkinWeights::rigid(&[0, 3], 3).is_err());
    }

    #[test]
    fn test_rigid_rows_reproduce_joint_rotation() {
        let joints = chain(&[0.0, 0.4, 0.9]);
        let weights = SkinWeights::rigid(&[0, 1, 2], 3).unwrap();

        for mode in [RotationBlend::Euler, RotationBlend::Quaternion] {
            let blended = weights.blend_all(&joints, mode);
            for (rotation, joint) in blended.iter().zip(joints.joints()) {
                let expected = joint.orientation.to_rotation_matrix();
                assert_relative_eq!(rotation.angle_to(&expected), 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_even_blend_about_one_axis() {
        let joints = chain(&[0.2, 0.8, 0.0]);
        let weights = [0.5, 0.5, 0.0];

        for mode in [RotationBlend::Euler, RotationBlend::Quaternion] {
            let blended = blend_orientation(&joints, &weights, mode);
            let (_, _, yaw) = blended.euler_angles();
            assert_relative_eq!(yaw, 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_no_weight_is_identity() {
        let joints = chain(&[0.3, 0.3, 0.3]);
        let blended = blend_orientation(&joints, &[0.0, 0.0, 0.0], RotationBlend::Quaternion);
        assert_relative_eq!(blended.angle(), 0.0);
        let blended = blend_orientation(&joints, &[0.0, 0.0, 0.0], RotationBlend::Euler);
        assert_relative_eq!(blended.angle(), 0.0);
    }
}
