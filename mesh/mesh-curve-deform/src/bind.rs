//! Bind-time precomputation.
//!
//! Binding captures everything about the rest pose that deformation needs:
//! where each vertex projects onto the base curve, its offset from that
//! point, the CV orientations it was bound under, and the Tau reference
//! value for its bend window.

use std::collections::HashMap;

use nalgebra::{Point3, Rotation3, Vector3};
use nurbs_eval::NurbsCurve;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{DeformConfig, RotationBlend};
use crate::error::{DeformError, DeformResult, MIN_JOINTS};
use crate::idw::inverse_distance_weights;
use crate::joint::{JointChain, JointWindow};
use crate::skin::SkinWeights;
use crate::tau::window_tau;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset CVs closer than this to their vertex get no push direction.
pub const DIRECTION_EPSILON: f64 = 1e-7;

/// Inputs to [`bind`].
///
/// Curves are optional so a host can pass through whatever its graph
/// produced; missing curves are reported as [`DeformError::NullCurve`].
#[derive(Debug, Clone, Copy)]
pub struct BindInput<'a> {
    /// Current driving curve.
    pub curve: Option<&'a NurbsCurve>,
    /// Rest-pose curve vertices are bound against.
    pub base_curve: Option<&'a NurbsCurve>,
    /// Rest-pose mesh vertex positions.
    pub positions: &'a [Point3<f64>],
    /// Joint weights of the base curve's control points.
    pub skin_weights: &'a SkinWeights,
    /// Joints in their bind pose.
    pub joints: &'a JointChain,
}

/// Everything deformation needs from the rest pose.
///
/// Produced by [`bind`] or restored from a serialized copy, and never
/// modified afterwards. Deserialization runs
/// [`BindState::check_consistency`], so a saved state whose tables disagree
/// fails to load.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "BindStateParts"))]
pub struct BindState {
    skin_weights: SkinWeights,
    rotation_blend: RotationBlend,
    base_orientations: Vec<Rotation3<f64>>,
    params: Vec<f64>,
    offsets: Vec<Vector3<f64>>,
    windows: Vec<JointWindow>,
    dominant_window: JointWindow,
    cv_distance_weights: Vec<f64>,
    cv_directions: Vec<Vec<i8>>,
    default_taus: Vec<Option<f64>>,
    num_joints: usize,
}

/// Serialized form of a [`BindState`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct BindStateParts {
    skin_weights: SkinWeights,
    rotation_blend: RotationBlend,
    base_orientations: Vec<Rotation3<f64>>,
    params: Vec<f64>,
    offsets: Vec<Vector3<f64>>,
    windows: Vec<JointWindow>,
    dominant_window: JointWindow,
    cv_distance_weights: Vec<f64>,
    cv_directions: Vec<Vec<i8>>,
    default_taus: Vec<Option<f64>>,
    num_joints: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<BindStateParts> for BindState {
    type Error = DeformError;

    fn try_from(parts: BindStateParts) -> DeformResult<Self> {
        let state = Self {
            skin_weights: parts.skin_weights,
            rotation_blend: parts.rotation_blend,
            base_orientations: parts.base_orientations,
            params: parts.params,
            offsets: parts.offsets,
            windows: parts.windows,
            dominant_window: parts.dominant_window,
            cv_distance_weights: parts.cv_distance_weights,
            cv_directions: parts.cv_directions,
            default_taus: parts.default_taus,
            num_joints: parts.num_joints,
        };
        state.check_consistency()?;
        Ok(state)
    }
}

impl BindState {
    /// Check that the per-vertex and per-CV tables agree on their lengths
    /// and that every window names a bound joint.
    ///
    /// States built by [`bind`] always pass.
    ///
    /// # Errors
    ///
    /// - [`DeformError::TopologyMismatch`] naming the first table whose
    ///   length disagrees
    /// - [`DeformError::InsufficientJoints`] if fewer than three joints were
    ///   bound or a window indexes past the bound joints
    pub fn check_consistency(&self) -> DeformResult<()> {
        let vertices = self.params.len();
        for (what, len) in [
            ("offsets", self.offsets.len()),
            ("windows", self.windows.len()),
            ("push direction rows", self.cv_directions.len()),
            ("bind-pose Tau values", self.default_taus.len()),
        ] {
            if len != vertices {
                return Err(DeformError::mismatch(what, vertices, len));
            }
        }

        let cvs = self.base_orientations.len();
        if self.cv_distance_weights.len() != cvs {
            return Err(DeformError::mismatch(
                "CV distance weights",
                cvs,
                self.cv_distance_weights.len(),
            ));
        }
        if self.skin_weights.num_control_points() != cvs {
            return Err(DeformError::mismatch(
                "skin weight rows",
                cvs,
                self.skin_weights.num_control_points(),
            ));
        }
        if let Some(row) = self.cv_directions.iter().find(|row| row.len() != cvs) {
            return Err(DeformError::mismatch("push directions per vertex", cvs, row.len()));
        }

        if self.num_joints < MIN_JOINTS {
            return Err(DeformError::insufficient_joints(self.num_joints));
        }
        if let Some(row) = self
            .skin_weights
            .rows()
            .find(|row| row.len() != self.num_joints)
        {
            return Err(DeformError::mismatch("joints", self.num_joints, row.len()));
        }
        let highest = self
            .windows
            .iter()
            .chain(std::iter::once(&self.dominant_window))
            .map(|w| w.parent.max(w.pivot).max(w.child))
            .max()
            .unwrap_or(0);
        if highest >= self.num_joints {
            return Err(DeformError::InsufficientJoints {
                required: highest + 1,
                actual: self.num_joints,
            });
        }

        Ok(())
    }

    /// Number of bound vertices.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.params.len()
    }

    /// Number of control points of the bound curve.
    #[must_use]
    pub fn num_control_points(&self) -> usize {
        self.base_orientations.len()
    }

    /// Number of joints at bind time.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.num_joints
    }

    /// Skin weights captured at bind time.
    #[must_use]
    pub fn skin_weights(&self) -> &SkinWeights {
        &self.skin_weights
    }

    /// Rotation blend the bind was made with.
    #[must_use]
    pub fn rotation_blend(&self) -> RotationBlend {
        self.rotation_blend
    }

    /// Blended orientation of each CV in the bind pose.
    #[must_use]
    pub fn base_orientations(&self) -> &[Rotation3<f64>] {
        &self.base_orientations
    }

    /// Base curve parameter of each vertex's closest point.
    #[must_use]
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Offset from each vertex's closest point to the vertex.
    #[must_use]
    pub fn offsets(&self) -> &[Vector3<f64>] {
        &self.offsets
    }

    /// Bend window of each vertex.
    #[must_use]
    pub fn windows(&self) -> &[JointWindow] {
        &self.windows
    }

    /// Most common bend window, used to weight CVs.
    #[must_use]
    pub fn dominant_window(&self) -> JointWindow {
        self.dominant_window
    }

    /// Inverse distance weight of each CV around the dominant pivot.
    #[must_use]
    pub fn cv_distance_weights(&self) -> &[f64] {
        &self.cv_distance_weights
    }

    /// Push direction (`-1`, `0` or `1`) of every CV for each vertex.
    #[must_use]
    pub fn cv_directions(&self) -> &[Vec<i8>] {
        &self.cv_directions
    }

    /// Bind-pose Tau of each vertex, `None` where undefined.
    #[must_use]
    pub fn default_taus(&self) -> &[Option<f64>] {
        &self.default_taus
    }
}

/// Precompute the bind state for a mesh.
///
/// # Errors
///
/// - [`DeformError::NullCurve`] if either curve is missing
/// - [`DeformError::InsufficientJoints`] for fewer than three joints
/// - [`DeformError::TopologyMismatch`] if the curves, skin weights and
///   joints disagree on counts
pub fn bind(input: &BindInput<'_>, config: &DeformConfig) -> DeformResult<BindState> {
    let curve = input.curve.ok_or(DeformError::NullCurve { role: "input" })?;
    let base = input.base_curve.ok_or(DeformError::NullCurve { role: "base" })?;
    let joints = input.joints;
    let skin = input.skin_weights;
    let positions = input.positions;

    joints.require_window()?;
    let num_cvs = base.num_control_points();
    if curve.num_control_points() != num_cvs {
        return Err(DeformError::mismatch(
            "control points",
            num_cvs,
            curve.num_control_points(),
        ));
    }
    if skin.num_control_points() != num_cvs {
        return Err(DeformError::mismatch(
            "skin weight rows",
            num_cvs,
            skin.num_control_points(),
        ));
    }
    if skin.num_joints() != joints.len() {
        return Err(DeformError::mismatch("joints", skin.num_joints(), joints.len()));
    }

    info!(
        vertices = positions.len(),
        control_points = num_cvs,
        joints = joints.len(),
        "Binding curve deformer"
    );

    let base_orientations = skin.blend_all(joints, config.rotation_blend);

    let samples = config.closest_point_samples;
    let projections = map_indices(positions.len(), config, |i| -> DeformResult<(f64, Vector3<f64>)> {
        let vertex = positions[i];
        let hit = base.closest_point(&vertex, samples)?;
        let param = base.clamp_param(hit.param);
        Ok((param, vertex - base.point_at(param)?))
    })
    .into_iter()
    .collect::<DeformResult<Vec<_>>>()?;
    let (params, offsets): (Vec<f64>, Vec<Vector3<f64>>) = projections.into_iter().unzip();

    let windows = positions
        .iter()
        .map(|v| joints.window_for(v))
        .collect::<DeformResult<Vec<_>>>()?;
    let dominant_window = dominant_window(&windows);
    let (_, pivot, _) = joints.window_positions(dominant_window)?;
    let cv_distance_weights = inverse_distance_weights(&pivot, base.control_points(), config.idw_power);
    debug!(?dominant_window, weights = ?cv_distance_weights, "CV distance weights");

    let aims: Vec<Vector3<f64>> = base_orientations.iter().map(|r| r * Vector3::x()).collect();
    let base_cvs = base.control_points();
    let cv_directions = map_indices(positions.len(), config, |i| {
        base_cvs
            .iter()
            .zip(&aims)
            .map(|(cv, aim)| push_direction(&(cv + offsets[i]), &positions[i], aim))
            .collect::<Vec<i8>>()
    });

    let default_taus = map_indices(positions.len(), config, |i| {
        window_tau(joints, windows[i], &positions[i])
    });

    let undefined = default_taus.iter().filter(|t| t.is_none()).count();
    if undefined > 0 {
        warn!(
            vertices = undefined,
            "Bind-pose Tau undefined; these vertices will not be bend corrected"
        );
    }

    info!(
        vertices = positions.len(),
        pivot = dominant_window.pivot,
        "Bind complete"
    );

    Ok(BindState {
        skin_weights: skin.clone(),
        rotation_blend: config.rotation_blend,
        base_orientations,
        params,
        offsets,
        windows,
        dominant_window,
        cv_distance_weights,
        cv_directions,
        default_taus,
        num_joints: joints.len(),
    })
}

/// Map `f` over `0..count`, in parallel when the config asks for it.
pub(crate) fn map_indices<T, F>(count: usize, config: &DeformConfig, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if config.should_parallelize(count) {
        (0..count).into_par_iter().map(f).collect()
    } else {
        (0..count).map(f).collect()
    }
}

/// Most frequent window. Ties go to the one seen first.
fn dominant_window(windows: &[JointWindow]) -> JointWindow {
    let mut counts: HashMap<JointWindow, usize> = HashMap::new();
    for window in windows {
        *counts.entry(*window).or_default() += 1;
    }

    let mut best: Option<(JointWindow, usize)> = None;
    for window in windows {
        let count = counts.get(window).copied().unwrap_or(0);
        if best.is_none_or(|(_, n)| count > n) {
            best = Some((*window, count));
        }
    }
    best.map_or_else(JointWindow::default, |(window, _)| window)
}

/// Whether the vertex lies ahead of (`1`) or behind (`-1`) the offset CV
/// along the CV's aim axis. `0` when they coincide.
fn push_direction(offset_cv: &Point3<f64>, vertex: &Point3<f64>, aim: &Vector3<f64>) -> i8 {
    let to_vertex = vertex - offset_cv;
    let len = to_vertex.norm();
    if len <= DIRECTION_EPSILON {
        return 0;
    }
    if (to_vertex / len).dot(aim) >= 0.0 { 1 } else { -1 }
}
