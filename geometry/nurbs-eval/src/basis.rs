//! B-spline basis functions.
//!
//! Two formulations are provided:
//!
//! - [`basis`] / [`basis_derivative`]: the Cox–de Boor recursion for a single
//!   basis function `N_{i,k}`, written in terms of the *order* `k`
//!   (`degree + 1`). Useful when a single function is needed.
//! - [`find_span`] / [`basis_functions`] / [`basis_functions_with_derivatives`]:
//!   the bottom-up triangular table that produces every non-zero function on
//!   a knot span at once. This is what curve evaluation uses.
//!
//! Derivatives come in two scales. [`basis_derivative`] and
//! [`basis_functions_with_derivatives`] scale by the order `k`, the
//! convention curve tangents are built on. The `exact` variants scale by the
//! degree and return the true derivative.
//!
//! Both use the half-open span convention `[u_i, u_{i+1})`, except that the
//! last non-empty span is closed so that the end of the domain evaluates to a
//! proper partition of unity.

/// Whether `t` lies inside knot span `i`.
fn in_span(t: f64, i: usize, knots: &[f64]) -> bool {
    let (lo, hi) = (knots[i], knots[i + 1]);
    if lo <= t && t < hi {
        return true;
    }
    // The last non-empty span also owns the end of the domain
    lo < hi && t == hi && hi == knots[knots.len() - 1]
}

/// Evaluate the B-spline basis function `N_{i,k}(t)` by Cox–de Boor recursion.
///
/// `order` is `k = degree + 1`. Terms whose knot-difference denominator is
/// not positive contribute zero. Out-of-range `t` is not an error, it simply
/// yields zero.
///
/// # Panics
///
/// Panics if `i + order >= knots.len()`.
///
/// # Example
///
/// ```
/// use nurbs_eval::basis;
///
/// let knots = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
/// // Quadratic Bernstein polynomials at t = 0.5
/// assert!((basis(0.5, 0, 3, &knots) - 0.25).abs() < 1e-12);
/// assert!((basis(0.5, 1, 3, &knots) - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn basis(t: f64, i: usize, order: usize, knots: &[f64]) -> f64 {
    if order <= 1 {
        return if in_span(t, i, knots) { 1.0 } else { 0.0 };
    }

    let k = order;
    let mut value = 0.0;

    let left = knots[i + k - 1] - knots[i];
    if left > 0.0 {
        value += (t - knots[i]) / left * basis(t, i, k - 1, knots);
    }

    let right = knots[i + k] - knots[i + 1];
    if right > 0.0 {
        value += (knots[i + k] - t) / right * basis(t, i + 1, k - 1, knots);
    }

    value
}

/// Derivative of `N_{i,k}` in the order-scaled convention used for tangents.
///
/// `N'_{i,k} = k/(u_{i+k-1}-u_i) N_{i,k-1} - k/(u_{i+k}-u_{i+1}) N_{i+1,k-1}`
///
/// The scale is the order `k`, so the result is `k / (k - 1)` times the
/// true derivative returned by [`basis_exact_derivative`]. A zero-degree
/// function is piecewise constant, so its derivative is zero.
///
/// # Panics
///
/// Panics if `i + order >= knots.len()`.
#[must_use]
pub fn basis_derivative(t: f64, i: usize, order: usize, knots: &[f64]) -> f64 {
    scaled_derivative(t, i, order, knots, order as f64)
}

/// True first derivative of `N_{i,k}` with respect to `t`.
///
/// Uses the standard identity with the degree `p = k - 1` as the scale:
/// `N'_{i,p} = p/(u_{i+p}-u_i) N_{i,p-1} - p/(u_{i+p+1}-u_{i+1}) N_{i+1,p-1}`.
///
/// # Panics
///
/// Panics if `i + order >= knots.len()`.
#[must_use]
pub fn basis_exact_derivative(t: f64, i: usize, order: usize, knots: &[f64]) -> f64 {
    scaled_derivative(t, i, order, knots, order.saturating_sub(1) as f64)
}

fn scaled_derivative(t: f64, i: usize, order: usize, knots: &[f64], scale: f64) -> f64 {
    if order <= 1 {
        return 0.0;
    }

    let k = order;
    let mut value = 0.0;

    let left = knots[i + k - 1] - knots[i];
    if left > 0.0 {
        value += scale / left * basis(t, i, k - 1, knots);
    }

    let right = knots[i + k] - knots[i + 1];
    if right > 0.0 {
        value -= scale / right * basis(t, i + 1, k - 1, knots);
    }

    value
}

/// Find the knot span index `s` such that `knots[s] <= u < knots[s + 1]`.
///
/// At or beyond the end of the domain the last non-empty span is returned;
/// below the start of the domain the first span is returned. Callers are
/// expected to have checked the domain.
#[must_use]
pub fn find_span(u: f64, degree: usize, knots: &[f64]) -> usize {
    let n = knots.len() - degree - 1;

    if u >= knots[n] {
        let mut span = n - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }

    let mut low = degree;
    let mut high = n;

    while low < high {
        let mid = (low + high) / 2;
        if knots[mid] > u {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    low.saturating_sub(1).max(degree)
}

/// All `degree + 1` non-zero basis functions on `span` at `u`.
///
/// Entry `r` of the result is `N_{span - degree + r, degree}(u)`.
#[must_use]
pub fn basis_functions(span: usize, u: f64, degree: usize, knots: &[f64]) -> Vec<f64> {
    let p = degree;
    let mut n_basis = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];

    n_basis[0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;

        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            if denom.abs() > 1e-15 {
                let temp = n_basis[r] / denom;
                n_basis[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            } else {
                n_basis[r] = saved;
                saved = 0.0;
            }
        }
        n_basis[j] = saved;
    }

    n_basis
}

/// Non-zero basis functions on `span` and their order-scaled derivatives.
///
/// Returns `(values, derivatives)`, both indexed like [`basis_functions`].
/// Derivatives follow [`basis_derivative`]: scaled by the order, not the
/// degree.
#[must_use]
pub fn basis_functions_with_derivatives(
    span: usize,
    u: f64,
    degree: usize,
    knots: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    table_derivatives(span, u, degree, knots, (degree + 1) as f64)
}

/// Non-zero basis functions on `span` and their true first derivatives.
///
/// Same layout as [`basis_functions_with_derivatives`], with the degree as
/// the derivative scale.
#[must_use]
pub fn basis_functions_with_exact_derivatives(
    span: usize,
    u: f64,
    degree: usize,
    knots: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    table_derivatives(span, u, degree, knots, degree as f64)
}

/// The derivatives are assembled from the degree `p - 1` table on the same
/// span.
fn table_derivatives(
    span: usize,
    u: f64,
    degree: usize,
    knots: &[f64],
    scale: f64,
) -> (Vec<f64>, Vec<f64>) {
    let p = degree;
    let values = basis_functions(span, u, p, knots);
    let mut derivatives = vec![0.0; p + 1];

    if p == 0 {
        return (values, derivatives);
    }

    // lower[j] = N_{span - p + 1 + j, p - 1}(u)
    let lower = basis_functions(span, u, p - 1, knots);

    for r in 0..=p {
        let i = span - p + r;
        let mut d = 0.0;

        if r >= 1 {
            let denom = knots[i + p] - knots[i];
            if denom > 0.0 {
                d += scale * lower[r - 1] / denom;
            }
        }
        if r < p {
            let denom = knots[i + p + 1] - knots[i + 1];
            if denom > 0.0 {
                d -= scale * lower[r] / denom;
            }
        }

        derivatives[r] = d;
    }

    (values, derivatives)
}
