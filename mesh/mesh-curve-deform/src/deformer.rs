//! Stateful deformer.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::bind::{BindInput, BindState, bind};
use crate::config::DeformConfig;
use crate::deform::{DeformOutput, FrameInput, SkipReason, deform};
use crate::error::{DeformError, DeformResult};

/// A curve deformer that owns its bind state.
///
/// [`initialize`](Self::initialize) replaces the bind state as one exclusive
/// step, so concurrent [`deform`](Self::deform) calls see either the old
/// state or the new one, never a partial bind. Deformation only holds the
/// lock long enough to clone an [`Arc`].
///
/// # Example
///
/// ```
/// use mesh_curve_deform::{
///     BindInput, CurveDeformer, DeformConfig, FrameInput, Joint, JointChain, SkinWeights,
/// };
/// use nalgebra::Point3;
/// use nurbs_eval::NurbsCurve;
///
/// let joints: JointChain = (0..3).map(|i| Joint::at(Point3::new(f64::from(i), 0.0, 0.0))).collect();
/// let curve = NurbsCurve::clamped(
///     joints.joints().iter().map(|j| j.position).collect(),
///     vec![1.0; 3],
///     2,
/// )
/// .unwrap();
/// let skin = SkinWeights::rigid(&[0, 1, 2], 3).unwrap();
/// let mesh = vec![Point3::new(0.5, 0.2, 0.0), Point3::new(1.5, -0.2, 0.0)];
///
/// let deformer = CurveDeformer::new(DeformConfig::default());
/// deformer
///     .initialize(&BindInput {
///         curve: Some(&curve),
///         base_curve: Some(&curve),
///         positions: &mesh,
///         skin_weights: &skin,
///         joints: &joints,
///     })
///     .unwrap();
///
/// let out = deformer.deform(&FrameInput {
///     positions: &mesh,
///     curve: Some(&curve),
///     joints: &joints,
///     envelope: 1.0,
/// });
/// assert_eq!(out.vertices_deformed, 2);
/// ```
#[derive(Debug, Default)]
pub struct CurveDeformer {
    config: DeformConfig,
    state: RwLock<Option<Arc<BindState>>>,
}

impl CurveDeformer {
    /// Create an uninitialized deformer.
    #[must_use]
    pub fn new(config: DeformConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// Create a deformer from a previously saved bind state.
    #[must_use]
    pub fn with_state(config: DeformConfig, state: BindState) -> Self {
        Self {
            config,
            state: RwLock::new(Some(Arc::new(state))),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DeformConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// The rotation blend only takes effect at the next bind.
    pub fn set_config(&mut self, config: DeformConfig) {
        self.config = config;
    }

    /// Bind against the given rest pose, replacing any previous state.
    ///
    /// On error the previous state is kept.
    ///
    /// # Errors
    ///
    /// Returns whatever [`bind`] returns.
    pub fn initialize(&self, input: &BindInput<'_>) -> DeformResult<Arc<BindState>> {
        let mut slot = self.write_state();
        let state = Arc::new(bind(input, &self.config)?);
        *slot = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Install a previously saved bind state.
    pub fn restore(&self, state: BindState) {
        info!(vertices = state.num_vertices(), "Restoring bind state");
        *self.write_state() = Some(Arc::new(state));
    }

    /// Drop the bind state.
    pub fn reset(&self) {
        *self.write_state() = None;
    }

    /// The current bind state, if any.
    #[must_use]
    pub fn bind_state(&self) -> Option<Arc<BindState>> {
        self.read_state().clone()
    }

    /// Whether a bind state is present.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.read_state().is_some()
    }

    /// Deform one frame with the current bind state.
    ///
    /// Passes the input through with [`DeformError::NotInitialized`] if no
    /// bind state exists.
    #[must_use]
    pub fn deform(&self, frame: &FrameInput<'_>) -> DeformOutput {
        match self.bind_state() {
            Some(state) => deform(frame, &state, &self.config),
            None => DeformOutput::passthrough(
                frame.positions,
                SkipReason::Invalid(DeformError::NotInitialized),
            ),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<Arc<BindState>>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<Arc<BindState>>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::joint::{Joint, JointChain};
    use crate::skin::SkinWeights;
    use nalgebra::Point3;
    use nurbs_eval::NurbsCurve;
    use std::thread;

    fn setup() -> (JointChain, NurbsCurve, SkinWeights, Vec<Point3<f64>>) {
        let joints: JointChain = (0..4)
            .map(|i| Joint::at(Point3::new(i as f64, 0.0, 0.0)))
            .collect();
        let curve = NurbsCurve::clamped(
            joints.joints().iter().map(|j| j.position).collect(),
            vec![1.0; 4],
            3,
        )
        .unwrap();
        let skin = SkinWeights::rigid(&[0, 1, 2, 3], 4).unwrap();
        let mesh = (0..20)
            .map(|i| Point3::new(i as f64 * 0.15, 0.3, 0.0))
            .collect();
        (joints, curve, skin, mesh)
    }

    #[test]
    fn test_deform_before_initialize_passes_through() {
        let (joints, curve, _, mesh) = setup();
        let deformer = CurveDeformer::default();
        assert!(!deformer.is_initialized());

        let out = deformer.deform(&FrameInput {
            positions: &mesh,
            curve: Some(&curve),
            joints: &joints,
            envelope: 1.0,
        });
        assert_eq!(
            out.skipped,
            Some(SkipReason::Invalid(DeformError::NotInitialized))
        );
        assert_eq!(out.positions, mesh);
    }

    #[test]
    fn test_failed_initialize_keeps_previous_state() {
        let (joints, curve, skin, mesh) = setup();
        let deformer = CurveDeformer::new(DeformConfig::default());
        let input = BindInput {
            curve: Some(&curve),
            base_curve: Some(&curve),
            positions: &mesh,
            skin_weights: &skin,
            joints: &joints,
        };
        let first = deformer.initialize(&input).unwrap();

        let broken = BindInput {
            base_curve: None,
            ..input
        };
        assert!(deformer.initialize(&broken).is_err());
        assert!(Arc::ptr_eq(&first, &deformer.bind_state().unwrap()));

        deformer.reset();
        assert!(deformer.bind_state().is_none());
        deformer.restore((*first).clone());
        assert_eq!(*deformer.bind_state().unwrap(), *first);
    }

    #[test]
    fn test_concurrent_deform_sees_complete_state() {
        let (joints, curve, skin, mesh) = setup();
        let deformer = CurveDeformer::new(DeformConfig::default());
        let input = BindInput {
            curve: Some(&curve),
            base_curve: Some(&curve),
            positions: &mesh,
            skin_weights: &skin,
            joints: &joints,
        };
        deformer.initialize(&input).unwrap();

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..5 {
                    deformer.initialize(&input).unwrap();
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        let out = deformer.deform(&FrameInput {
                            positions: &mesh,
                            curve: Some(&curve),
                            joints: &joints,
                            envelope: 1.0,
                        });
                        assert!(!out.is_skipped());
                        assert_eq!(out.vertices_deformed, mesh.len());
                    }
                });
            }
        });
    }
}
