//! Inverse distance weighting.

use nalgebra::Point3;

/// Normalized inverse distance weights of `points` around `reference`.
///
/// Each weight is proportional to `1 / d^power`. If any point sits on the
/// reference (its raw weight is not finite), the coincident points share
/// the whole weight equally and every other point gets zero.
///
/// Returns an empty vector for no points.
///
/// # Example
///
/// ```
/// use mesh_curve_deform::inverse_distance_weights;
/// use nalgebra::Point3;
///
/// let points = [Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
/// let weights = inverse_distance_weights(&Point3::origin(), &points, 2.0);
/// assert!((weights[0] - 0.8).abs() < 1e-12);
/// assert!((weights[1] - 0.2).abs() < 1e-12);
/// ```
#[must_use]
pub fn inverse_distance_weights(reference: &Point3<f64>, points: &[Point3<f64>], power: f64) -> Vec<f64> {
    let raw: Vec<f64> = points
        .iter()
        .map(|p| (p - reference).norm().powf(-power))
        .collect();

    let coincident = raw.iter().filter(|w| !w.is_finite()).count();
    let raw = if coincident > 0 {
        let share = 1.0 / coincident as f64;
        raw.into_iter()
            .map(|w| if w.is_finite() { 0.0 } else { share })
            .collect()
    } else {
        raw
    };

    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        // Only reachable with a non-positive power and overflowing distances
        let uniform = 1.0 / raw.len().max(1) as f64;
        return vec![uniform; raw.len()];
    }
    raw.into_iter().map(|w| w / sum).collect()
}
