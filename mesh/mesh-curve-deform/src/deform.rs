//! Per-frame deformation.
//!
//! Each frame, the CV orientations are re-blended from the current joints
//! and every vertex rebuilds its own transient curve: the current CVs moved
//! by the vertex's bind offset, rotated with the CV. Evaluating that curve
//! at the vertex's bind parameter gives the deformed position. Vertices
//! that receive bend compensation additionally slide their transient CVs
//! along the bone aim axis by the change in Tau.

use nalgebra::{Point3, Rotation3, Vector3};
use nurbs_eval::NurbsCurve;
use tracing::{debug, warn};

use crate::bind::{BindState, map_indices};
use crate::config::DeformConfig;
use crate::error::{DeformError, DeformResult};
use crate::joint::JointChain;
use crate::skin::SkinWeights;
use crate::tau::window_tau;

/// Inputs for one frame of deformation.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Incoming vertex positions. Returned unchanged when deformation is
    /// skipped, and used as the Tau query points.
    pub positions: &'a [Point3<f64>],
    /// Current driving curve.
    pub curve: Option<&'a NurbsCurve>,
    /// Joints in their current pose.
    pub joints: &'a JointChain,
    /// Blend between input (`0.0`) and fully deformed (`1.0`) positions.
    pub envelope: f64,
}

/// Why a frame was passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SkipReason {
    /// The envelope is zero.
    ZeroEnvelope,
    /// The inputs cannot be deformed.
    Invalid(DeformError),
}

/// Result of deforming one frame.
#[derive(Debug, Clone)]
pub struct DeformOutput {
    /// Output vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Number of vertices moved along the curve.
    pub vertices_deformed: usize,
    /// Number of vertices that received bend compensation.
    pub vertices_tau_corrected: usize,
    /// Set when the whole frame was passed through.
    pub skipped: Option<SkipReason>,
}

impl DeformOutput {
    /// Output that returns `positions` untouched.
    #[must_use]
    pub fn passthrough(positions: &[Point3<f64>], reason: SkipReason) -> Self {
        Self {
            positions: positions.to_vec(),
            vertices_deformed: 0,
            vertices_tau_corrected: 0,
            skipped: Some(reason),
        }
    }

    /// Whether the frame was passed through.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Per-CV quantities shared by every vertex in a frame.
struct FrameRig {
    /// Current orientation times inverse bind orientation.
    offset_rotations: Vec<Rotation3<f64>>,
    /// Current bone aim axis.
    aims: Vec<Vector3<f64>>,
}

impl FrameRig {
    fn new(state: &BindState, skin: &SkinWeights, joints: &JointChain) -> Self {
        let current = skin.blend_all(joints, state.rotation_blend());
        let offset_rotations = current
            .iter()
            .zip(state.base_orientations())
            .map(|(cur, base)| cur * base.inverse())
            .collect();
        let aims = current.iter().map(|r| r * Vector3::x()).collect();
        Self {
            offset_rotations,
            aims,
        }
    }
}

/// Deform one frame against a bind state.
///
/// Never fails: structural problems pass the input positions through and
/// are reported in [`DeformOutput::skipped`]. A vertex whose transient
/// curve cannot be evaluated keeps its input position.
#[must_use]
pub fn deform(frame: &FrameInput<'_>, state: &BindState, config: &DeformConfig) -> DeformOutput {
    let envelope = if frame.envelope.is_nan() {
        0.0
    } else {
        frame.envelope.clamp(0.0, 1.0)
    };
    if envelope == 0.0 {
        return DeformOutput::passthrough(frame.positions, SkipReason::ZeroEnvelope);
    }

    let curve = match validate(frame, state) {
        Ok(curve) => curve,
        Err(err) => {
            warn!(error = %err, "Skipping curve deformation");
            return DeformOutput::passthrough(frame.positions, SkipReason::Invalid(err));
        }
    };

    let rig = FrameRig::new(state, state.skin_weights(), frame.joints);
    let results = map_indices(frame.positions.len(), config, |i| {
        deform_vertex(i, frame, curve, state, config, &rig)
    });

    let mut positions = Vec::with_capacity(results.len());
    let mut vertices_deformed = 0;
    let mut vertices_tau_corrected = 0;
    for (i, result) in results.into_iter().enumerate() {
        let input = frame.positions[i];
        match result {
            Some((target, corrected)) => {
                positions.push(input + (target - input) * envelope);
                vertices_deformed += 1;
                vertices_tau_corrected += usize::from(corrected);
            }
            None => positions.push(input),
        }
    }

    let failed = frame.positions.len() - vertices_deformed;
    if failed > 0 {
        warn!(vertices = failed, "Curve evaluation failed; vertices left in place");
    }
    debug!(
        vertices = vertices_deformed,
        tau_corrected = vertices_tau_corrected,
        envelope,
        "Deformed frame"
    );

    DeformOutput {
        positions,
        vertices_deformed,
        vertices_tau_corrected,
        skipped: None,
    }
}

fn validate<'a>(frame: &FrameInput<'a>, state: &BindState) -> DeformResult<&'a NurbsCurve> {
    let curve = frame.curve.ok_or(DeformError::NullCurve { role: "input" })?;
    frame.joints.require_window()?;
    if frame.joints.len() != state.num_joints() {
        return Err(DeformError::mismatch("joints", state.num_joints(), frame.joints.len()));
    }
    if curve.num_control_points() != state.num_control_points() {
        return Err(DeformError::mismatch(
            "control points",
            state.num_control_points(),
            curve.num_control_points(),
        ));
    }
    if frame.positions.len() != state.num_vertices() {
        return Err(DeformError::mismatch(
            "vertices",
            state.num_vertices(),
            frame.positions.len(),
        ));
    }
    Ok(curve)
}

/// Target position of vertex `i` and whether it was bend corrected.
fn deform_vertex(
    i: usize,
    frame: &FrameInput<'_>,
    curve: &NurbsCurve,
    state: &BindState,
    config: &DeformConfig,
    rig: &FrameRig,
) -> Option<(Point3<f64>, bool)> {
    let offset = state.offsets()[i];
    let mut cvs: Vec<Point3<f64>> = curve
        .control_points()
        .iter()
        .zip(&rig.offset_rotations)
        .map(|(cv, rotation)| cv + rotation * offset)
        .collect();

    let mut corrected = false;
    if config.active_vertices.contains(i) {
        let position = &frame.positions[i];
        let current = window_tau(frame.joints, state.windows()[i], position);
        if let (Some(bound), Some(current)) = (state.default_taus()[i], current) {
            let delta = current - bound;
            let directions = &state.cv_directions()[i];
            for (c, cv) in cvs.iter_mut().enumerate() {
                let sign = config.tau_sign.factor(directions[c]);
                *cv -= rig.aims[c] * (state.cv_distance_weights()[c] * delta * sign);
            }
            corrected = true;
        }
    }

    let u = curve.clamp_param(state.params()[i]);
    curve.point_at_with(&cvs, u).ok().map(|p| (p, corrected))
}
