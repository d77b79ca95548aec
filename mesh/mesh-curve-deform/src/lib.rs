//! Curve-driven skin deformation with bend compensation.
//!
//! A mesh is bound to a NURBS curve that is itself skinned to a joint chain.
//! Each vertex remembers where it projects onto the rest-pose curve and its
//! offset from that point. When the joints move, the offsets are carried
//! along by the rotation of the curve's control points, so the mesh follows
//! the curve rigidly in cross-section.
//!
//! Rigid transport alone collapses the inside of a bend and stretches the
//! outside. The Tau model measures how far a bend has moved each vertex
//! around its pivot joint and slides the control points along the bone to
//! compensate.
//!
//! - [`bind`] / [`BindState`] - Rest-pose precomputation
//! - [`deform`] / [`DeformOutput`] - Per-frame deformation
//! - [`CurveDeformer`] - Holds a bind state and swaps it atomically
//! - [`tau`] - The bend-angle scalar
//! - [`inverse_distance_weights`] - How strongly each CV follows the bend
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies.
//!
//! # Quick Start
//!
//! ```
//! use mesh_curve_deform::{
//!     BindInput, DeformConfig, FrameInput, Joint, JointChain, SkinWeights, bind, deform,
//! };
//! use nalgebra::{Point3, UnitQuaternion, Vector3};
//! use nurbs_eval::NurbsCurve;
//!
//! // Shoulder, elbow, wrist
//! let rest: JointChain = (0..3).map(|i| Joint::at(Point3::new(f64::from(i), 0.0, 0.0))).collect();
//! let curve = NurbsCurve::clamped(
//!     rest.joints().iter().map(|j| j.position).collect(),
//!     vec![1.0; 3],
//!     2,
//! )
//! .unwrap();
//! let skin = SkinWeights::rigid(&[0, 1, 2], 3).unwrap();
//! let mesh = vec![Point3::new(1.0, 0.3, 0.0), Point3::new(1.0, -0.3, 0.0)];
//!
//! let config = DeformConfig::default();
//! let state = bind(
//!     &BindInput {
//!         curve: Some(&curve),
//!         base_curve: Some(&curve),
//!         positions: &mesh,
//!         skin_weights: &skin,
//!         joints: &rest,
//!     },
//!     &config,
//! )
//! .unwrap();
//!
//! // Bend the elbow 45 degrees
//! let bend = UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_4);
//! let elbow = Point3::new(1.0, 0.0, 0.0);
//! let wrist = elbow + bend * Vector3::x();
//! let posed = JointChain::new(vec![
//!     Joint::at(Point3::origin()),
//!     Joint::new(elbow, bend),
//!     Joint::new(wrist, bend),
//! ]);
//! let posed_curve = NurbsCurve::clamped(vec![Point3::origin(), elbow, wrist], vec![1.0; 3], 2).unwrap();
//!
//! let out = deform(
//!     &FrameInput { positions: &mesh, curve: Some(&posed_curve), joints: &posed, envelope: 1.0 },
//!     &state,
//!     &config,
//! );
//! assert_eq!(out.vertices_deformed, 2);
//! ```
//!
//! # Feature Flags
//!
//! - `serde` (default): Serialization for [`BindState`] and [`DeformConfig`]

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::suboptimal_flops,
    clippy::float_cmp
)]

mod bind;
mod config;
mod deform;
mod deformer;
mod error;
mod idw;
mod joint;
mod skin;
mod tau;

pub use bind::{BindInput, BindState, DIRECTION_EPSILON, bind};
pub use config::{ActiveVertices, DeformConfig, RotationBlend, TauSign};
pub use deform::{DeformOutput, FrameInput, SkipReason, deform};
pub use deformer::CurveDeformer;
pub use error::{DeformError, DeformResult, MIN_JOINTS};
pub use idw::inverse_distance_weights;
pub use joint::{Joint, JointChain, JointWindow};
pub use skin::{SkinWeights, blend_orientation};
pub use tau::{COINCIDENT_EPSILON, tau, window_tau};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod integration_tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, UnitQuaternion, Vector3};
    use nurbs_eval::{KnotVector, NurbsCurve};
    use std::f64::consts::PI;

    /// Shoulder at the origin, elbow at +X, forearm of unit length rotated
    /// by `bend` about +Z. The curve runs through the three joints.
    fn arm(bend: f64) -> (JointChain, NurbsCurve) {
        let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, bend);
        let elbow = Point3::new(1.0, 0.0, 0.0);
        let wrist = elbow + rotation * Vector3::x();

        let joints = JointChain::new(vec![
            Joint::at(Point3::origin()),
            Joint::new(elbow, rotation),
            Joint::new(wrist, rotation),
        ]);
        let curve = NurbsCurve::non_rational(
            vec![Point3::origin(), elbow, wrist],
            KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap(),
            2,
        )
        .unwrap();
        (joints, curve)
    }

    /// Vertices beside the elbow: inside of the bend first, then outside.
    fn elbow_mesh() -> Vec<Point3<f64>> {
        vec![Point3::new(1.0, 0.5, 0.0), Point3::new(1.0, -0.5, 0.0)]
    }

    fn bind_arm(mesh: &[Point3<f64>], config: &DeformConfig) -> BindState {
        let (joints, curve) = arm(0.0);
        let skin = SkinWeights::rigid(&[0, 1, 2], 3).unwrap();
        bind(
            &BindInput {
                curve: Some(&curve),
                base_curve: Some(&curve),
                positions: mesh,
                skin_weights: &skin,
                joints: &joints,
            },
            config,
        )
        .unwrap()
    }

    fn deform_arm(
        mesh: &[Point3<f64>],
        state: &BindState,
        bend: f64,
        config: &DeformConfig,
    ) -> DeformOutput {
        let (joints, curve) = arm(bend);
        deform(
            &FrameInput {
                positions: mesh,
                curve: Some(&curve),
                joints: &joints,
                envelope: 1.0,
            },
            state,
            config,
        )
    }

    #[test]
    fn test_bind_pose_tau_is_pivot_value() {
        let mesh = elbow_mesh();
        let state = bind_arm(&mesh, &DeformConfig::default());
        for tau in state.default_taus() {
            assert_relative_eq!(tau.unwrap(), 0.5, epsilon = 1e-12);
        }
        assert_eq!(state.cv_distance_weights(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bend_correction_pulls_inside_and_pushes_outside() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default();
        let state = bind_arm(&mesh, &config);

        let mut previous = [0.0_f64; 2];
        for degrees in [20.0_f64, 40.0, 60.0, 80.0, 90.0] {
            let bend = degrees.to_radians();
            let corrected = deform_arm(&mesh, &state, bend, &config);
            let plain = deform_arm(&mesh, &state, bend, &DeformConfig::without_tau());
            assert_eq!(corrected.vertices_tau_corrected, 2);
            assert_eq!(plain.vertices_tau_corrected, 0);

            let aim = Vector3::new(bend.cos(), bend.sin(), 0.0);
            let inside = corrected.positions[0] - plain.positions[0];
            let outside = corrected.positions[1] - plain.positions[1];

            // Correction is along the forearm
            assert!(inside.cross(&aim).norm() < 1e-9);
            assert!(outside.cross(&aim).norm() < 1e-9);
            assert!(inside.dot(&aim) < 0.0, "{degrees}: inside {inside:?}");
            assert!(outside.dot(&aim) > 0.0, "{degrees}: outside {outside:?}");

            // Grows with the bend
            let magnitudes = [inside.norm(), outside.norm()];
            for (now, before) in magnitudes.iter().zip(&previous) {
                assert!(now > before, "{degrees}: {now} <= {before}");
            }
            previous = magnitudes;
        }
    }

    #[test]
    fn test_bend_correction_magnitude() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default();
        let state = bind_arm(&mesh, &config);

        let bend = 50.0_f64.to_radians();
        let corrected = deform_arm(&mesh, &state, bend, &config);
        let plain = deform_arm(&mesh, &state, bend, &DeformConfig::without_tau());

        // Inside: theta = pi/2 - bend over an opening of pi - bend.
        // Outside: theta = pi/2 + bend over the reflex opening pi + bend.
        let inside_delta = 0.25 * (PI * (PI / 2.0 - bend) / (PI - bend)).cos();
        let outside_delta = 0.25 * (PI * (PI / 2.0 + bend) / (PI + bend)).cos();

        // The elbow CV carries the whole correction and has basis 0.5 at the
        // vertices' parameter.
        let aim = Vector3::new(bend.cos(), bend.sin(), 0.0);
        assert_relative_eq!(
            corrected.positions[0] - plain.positions[0],
            aim * (-0.5 * inside_delta),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            corrected.positions[1] - plain.positions[1],
            aim * (-0.5 * outside_delta),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_bend_past_right_angle_switches_outside_branch() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default();
        let state = bind_arm(&mesh, &config);

        for degrees in [100.0_f64, 135.0] {
            let bend = degrees.to_radians();
            let corrected = deform_arm(&mesh, &state, bend, &config);
            let plain = deform_arm(&mesh, &state, bend, &DeformConfig::without_tau());

            // Inside: the forearm has crossed the vertex direction, so it is
            // measured over the reflex opening pi + bend.
            // Outside: now on the same side of line OQ as the shoulder, it is
            // measured over the acute opening pi - bend from theta = 3pi/2 - bend.
            let inside_delta = 0.25 * (PI * (bend - PI / 2.0) / (PI + bend)).cos();
            let outside_delta = 0.25 * (PI * (1.5 * PI - bend) / (PI - bend)).cos();

            let aim = Vector3::new(bend.cos(), bend.sin(), 0.0);
            let inside = corrected.positions[0] - plain.positions[0];
            let outside = corrected.positions[1] - plain.positions[1];
            assert_relative_eq!(inside, aim * (-0.5 * inside_delta), epsilon = 1e-6);
            assert_relative_eq!(outside, aim * (-0.5 * outside_delta), epsilon = 1e-6);
            assert!(inside.dot(&aim) < 0.0, "{degrees}: inside {inside:?}");
        }

        // Just past a right angle the outside vertex is pulled, not pushed
        let bend = 100.0_f64.to_radians();
        let aim = Vector3::new(bend.cos(), bend.sin(), 0.0);
        let corrected = deform_arm(&mesh, &state, bend, &config);
        let plain = deform_arm(&mesh, &state, bend, &DeformConfig::without_tau());
        assert!((corrected.positions[1] - plain.positions[1]).dot(&aim) < -0.1);
    }

    #[test]
    fn test_bind_direction_skips_cv_under_vertex() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default().with_tau_sign(TauSign::BindDirection);
        let state = bind_arm(&mesh, &config);
        assert_eq!(state.cv_directions()[0][1], 0);

        let bend = 60.0_f64.to_radians();
        let corrected = deform_arm(&mesh, &state, bend, &config);
        let plain = deform_arm(&mesh, &state, bend, &DeformConfig::without_tau());
        for (a, b) in corrected.positions.iter().zip(&plain.positions) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rigid_motion_of_whole_rig() {
        let mesh: Vec<Point3<f64>> = (0..12)
            .map(|i| {
                let angle = f64::from(i) * PI / 6.0;
                Point3::new(0.2 + f64::from(i) * 0.15, 0.4 * angle.cos(), 0.4 * angle.sin())
            })
            .collect();

        for config in [DeformConfig::default(), DeformConfig::quaternion()] {
            let state = bind_arm(&mesh, &config);

            let motion = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.7);
            let (rest, curve) = arm(0.0);
            let joints: JointChain = rest
                .joints()
                .iter()
                .map(|j| Joint::new(motion * j.position, motion * j.orientation))
                .collect();
            let moved_curve = NurbsCurve::non_rational(
                curve.control_points().iter().map(|p| motion * p).collect(),
                curve.knots().clone(),
                2,
            )
            .unwrap();

            let out = deform(
                &FrameInput {
                    positions: &mesh,
                    curve: Some(&moved_curve),
                    joints: &joints,
                    envelope: 1.0,
                },
                &state,
                &config,
            );
            for (p, v) in out.positions.iter().zip(&mesh) {
                assert_relative_eq!(*p, motion * v, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_bind_is_idempotent() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default();
        assert_eq!(bind_arm(&mesh, &config), bind_arm(&mesh, &config));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_restored_state_deforms_identically() {
        let mesh = elbow_mesh();
        let config = DeformConfig::default();
        let state = bind_arm(&mesh, &config);

        let json = serde_json::to_string(&state).unwrap();
        let restored: BindState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, restored);

        let deformer = CurveDeformer::new(config.clone());
        deformer.restore(restored);
        let (joints, curve) = arm(0.8);
        let frame = FrameInput {
            positions: &mesh,
            curve: Some(&curve),
            joints: &joints,
            envelope: 1.0,
        };
        assert_eq!(
            deformer.deform(&frame).positions,
            deform(&frame, &state, &config).positions
        );
    }
}
