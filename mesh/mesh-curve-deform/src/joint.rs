//! Joints and bend windows.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};

use crate::error::{DeformError, DeformResult, MIN_JOINTS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A joint's world-space pose.
///
/// The bone aim axis is the local +X axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Joint {
    /// World-space position.
    pub position: Point3<f64>,
    /// World-space orientation.
    pub orientation: UnitQuaternion<f64>,
}

impl Joint {
    /// Create a joint from a position and orientation.
    #[must_use]
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Create an unrotated joint at `position`.
    #[must_use]
    pub fn at(position: Point3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Extract a joint from a world transform.
    ///
    /// The matrix uses the column-vector convention, with the translation in
    /// the last column. Scale and shear are removed by taking the closest
    /// rotation to the upper-left 3x3 block.
    #[must_use]
    pub fn from_world_matrix(matrix: &Matrix4<f64>) -> Self {
        let position = Point3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let rotation = Rotation3::from_matrix(&linear);
        Self::new(position, UnitQuaternion::from_rotation_matrix(&rotation))
    }

    /// XYZ Euler angles `(roll, pitch, yaw)` of the orientation.
    #[must_use]
    pub fn euler_angles(&self) -> Vector3<f64> {
        let (roll, pitch, yaw) = self.orientation.euler_angles();
        Vector3::new(roll, pitch, yaw)
    }

    /// Unit bone aim axis in world space.
    #[must_use]
    pub fn aim_axis(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }
}

/// Three consecutive joints used to measure a bend.
///
/// `parent` and `child` are the bone ends (P and Q), `pivot` is the joint the
/// bend happens at (O).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointWindow {
    /// Parent joint index (P).
    pub parent: usize,
    /// Pivot joint index (O).
    pub pivot: usize,
    /// Child joint index (Q).
    pub child: usize,
}

impl JointWindow {
    /// Window centred on `pivot`.
    #[must_use]
    pub fn around(pivot: usize) -> Self {
        Self {
            parent: pivot.saturating_sub(1),
            pivot,
            child: pivot + 1,
        }
    }
}

impl Default for JointWindow {
    fn default() -> Self {
        Self::around(1)
    }
}

/// An ordered chain of joints.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointChain {
    joints: Vec<Joint>,
}

impl JointChain {
    /// Create a chain from joints ordered root to tip.
    #[must_use]
    pub fn new(joints: Vec<Joint>) -> Self {
        Self { joints }
    }

    /// Create a chain from world transforms ordered root to tip.
    #[must_use]
    pub fn from_world_matrices(matrices: &[Matrix4<f64>]) -> Self {
        Self::new(matrices.iter().map(Joint::from_world_matrix).collect())
    }

    /// Number of joints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// All joints.
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Joint at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// Fail unless the chain can form a bend window.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InsufficientJoints`] for fewer than three joints.
    pub fn require_window(&self) -> DeformResult<()> {
        if self.joints.len() < MIN_JOINTS {
            return Err(DeformError::insufficient_joints(self.joints.len()));
        }
        Ok(())
    }

    /// Index of the joint nearest `point`. Ties go to the lower index.
    #[must_use]
    pub fn closest_joint(&self, point: &Point3<f64>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, joint) in self.joints.iter().enumerate() {
            let dist = (joint.position - point).norm_squared();
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Bend window for `point`.
    ///
    /// Centred on the nearest joint, shifted inward when that joint is the
    /// first or last of the chain.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::InsufficientJoints`] for fewer than three joints.
    pub fn window_for(&self, point: &Point3<f64>) -> DeformResult<JointWindow> {
        self.require_window()?;
        let last = self.joints.len() - 1;
        let pivot = self.closest_joint(point).unwrap_or(1).clamp(1, last - 1);
        Ok(JointWindow::around(pivot))
    }

    /// Positions `(P, O, Q)` of a window.
    ///
    /// # Errors
    ///
    /// Returns [`DeformError::TopologyMismatch`] if the window indexes past
    /// the end of the chain.
    pub fn window_positions(
        &self,
        window: JointWindow,
    ) -> DeformResult<(Point3<f64>, Point3<f64>, Point3<f64>)> {
        let position = |i: usize| {
            self.joints
                .get(i)
                .map(|j| j.position)
                .ok_or_else(|| DeformError::mismatch("joints", i + 1, self.joints.len()))
        };
        Ok((
            position(window.parent)?,
            position(window.pivot)?,
            position(window.child)?,
        ))
    }
}

impl FromIterator<Joint> for JointChain {
    fn from_iter<I: IntoIterator<Item = Joint>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
