//! Deformer configuration.
//!
//! [`DeformConfig`] controls how rotations are blended, how the Tau
//! correction is signed, which vertices receive it, and how the work is
//! scheduled.
//!
//! # Presets
//!
//! - [`DeformConfig::default()`] - Euler blending, uniform Tau sign, all
//!   vertices corrected
//! - [`DeformConfig::quaternion()`] - Quaternion blending of joint rotations
//! - [`DeformConfig::without_tau()`] - Pure curve transport, no bend
//!   compensation
//!
//! # Example
//!
//! ```
//! use mesh_curve_deform::{ActiveVertices, DeformConfig, TauSign};
//!
//! let config = DeformConfig::quaternion()
//!     .with_tau_sign(TauSign::BindDirection)
//!     .with_active_vertices(ActiveVertices::only([0, 4, 9]));
//! assert!(config.active_vertices.contains(4));
//! assert!(!config.active_vertices.contains(5));
//! ```

use std::collections::HashSet;

use nurbs_eval::DEFAULT_CLOSEST_SAMPLES;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How per-joint rotations are combined into one orientation per CV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RotationBlend {
    /// Weighted sum of XYZ Euler angles.
    ///
    /// Matches what rigging tools historically did. Unstable near gimbal
    /// lock and for large angle differences between joints.
    #[default]
    Euler,

    /// Incremental weighted slerp of joint quaternions.
    Quaternion,
}

/// Sign convention for the Tau displacement along the bone aim axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TauSign {
    /// Every CV moves by `-Δτ` along its aim axis.
    #[default]
    Uniform,

    /// Each CV moves by `-Δτ · direction`, where `direction` is the
    /// per-(vertex, CV) push/pull sign recorded at bind time. CVs whose
    /// offset position coincides with the vertex do not move.
    BindDirection,
}

impl TauSign {
    /// Multiplier for one CV given its bind-time direction.
    #[must_use]
    pub fn factor(self, direction: i8) -> f64 {
        match self {
            Self::Uniform => 1.0,
            Self::BindDirection => f64::from(direction),
        }
    }
}

/// Which vertices receive the Tau correction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActiveVertices {
    /// Every vertex.
    #[default]
    All,

    /// Only the listed vertex indices. An empty set disables the correction.
    Only(HashSet<usize>),
}

impl ActiveVertices {
    /// Restrict the correction to the given indices.
    #[must_use]
    pub fn only(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Only(indices.into_iter().collect())
    }

    /// Disable the correction entirely.
    #[must_use]
    pub fn none() -> Self {
        Self::Only(HashSet::new())
    }

    /// Whether vertex `index` is corrected.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&index),
        }
    }
}

/// Configuration for binding and deformation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeformConfig {
    /// How joint rotations are blended per CV. Recorded in the bind state so
    /// that deformation always uses the blend the bind was made with.
    pub rotation_blend: RotationBlend,

    /// Sign convention for the Tau correction.
    pub tau_sign: TauSign,

    /// Vertices that receive the Tau correction.
    pub active_vertices: ActiveVertices,

    /// Exponent of the inverse distance weighting of CVs.
    pub idw_power: f64,

    /// Coarse samples taken by the closest point search before refinement.
    pub closest_point_samples: usize,

    /// Whether to use parallel processing (via rayon).
    pub parallel: bool,

    /// Minimum vertex count before work is split across threads.
    pub parallel_threshold: usize,
}

impl Default for DeformConfig {
    fn default() -> Self {
        Self {
            rotation_blend: RotationBlend::default(),
            tau_sign: TauSign::default(),
            active_vertices: ActiveVertices::default(),
            idw_power: 2.0,
            closest_point_samples: DEFAULT_CLOSEST_SAMPLES,
            parallel: true,
            parallel_threshold: 1000,
        }
    }
}

impl DeformConfig {
    /// Default settings with quaternion rotation blending.
    #[must_use]
    pub fn quaternion() -> Self {
        Self::default().with_rotation_blend(RotationBlend::Quaternion)
    }

    /// Default settings with the Tau correction disabled.
    #[must_use]
    pub fn without_tau() -> Self {
        Self::default().with_active_vertices(ActiveVertices::none())
    }

    /// Set the rotation blend.
    #[must_use]
    pub fn with_rotation_blend(mut self, blend: RotationBlend) -> Self {
        self.rotation_blend = blend;
        self
    }

    /// Set the Tau sign convention.
    #[must_use]
    pub fn with_tau_sign(mut self, sign: TauSign) -> Self {
        self.tau_sign = sign;
        self
    }

    /// Set the vertices that receive the Tau correction.
    #[must_use]
    pub fn with_active_vertices(mut self, active: ActiveVertices) -> Self {
        self.active_vertices = active;
        self
    }

    /// Set the inverse distance weighting exponent.
    #[must_use]
    pub fn with_idw_power(mut self, power: f64) -> Self {
        self.idw_power = power;
        self
    }

    /// Set the number of coarse closest point samples.
    #[must_use]
    pub fn with_closest_point_samples(mut self, samples: usize) -> Self {
        self.closest_point_samples = samples;
        self
    }

    /// Enable or disable parallel processing.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the vertex count above which work runs in parallel.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Whether `count` items should be processed in parallel.
    #[must_use]
    pub fn should_parallelize(&self, count: usize) -> bool {
        self.parallel && count > self.parallel_threshold
    }
}
