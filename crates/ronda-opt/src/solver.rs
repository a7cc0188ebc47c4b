//! Numerical machinery shared by the optimizers.
//!
//! Covariance conditioning (symmetrization plus an eigenvalue floor) and
//! the exact projection onto the box-constrained simplex
//! `{w : Σw = s, l ≤ w ≤ u}` via bisection on the shift multiplier.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use ronda_traits::error::{Result, RondaError};

/// Per-asset box bounds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bounds {
    /// Lower bound per asset.
    pub lower: Vec<f64>,
    /// Upper bound per asset.
    pub upper: Vec<f64>,
}

impl Bounds {
    /// Long-only bounds `[0, 1]` for `n` assets.
    pub fn long_only(n: usize) -> Self {
        Self {
            lower: vec![0.0; n],
            upper: vec![1.0; n],
        }
    }

    /// Tighten every upper bound to at most `cap`.
    pub fn with_max_weight(mut self, cap: f64) -> Self {
        for u in &mut self.upper {
            *u = u.min(cap);
        }
        self
    }

    /// Validate shape and ordering against `n` assets.
    ///
    /// # Errors
    ///
    /// [`RondaError::InputInvalid`] on length mismatch or `l > u`;
    /// [`RondaError::Unbounded`] on non-finite bounds.
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.lower.len() != n || self.upper.len() != n {
            return Err(RondaError::input(format!(
                "bounds cover {} assets, portfolio has {n}",
                self.lower.len()
            )));
        }
        for (l, u) in self.lower.iter().zip(&self.upper) {
            if !l.is_finite() || !u.is_finite() {
                return Err(RondaError::Unbounded(
                    "optimization bounds must be finite".to_string(),
                ));
            }
            if l > u {
                return Err(RondaError::input(format!("lower bound {l} above upper {u}")));
            }
        }
        Ok(())
    }
}

/// Average a matrix with its transpose.
pub fn symmetrize(sigma: &Array2<f64>) -> Array2<f64> {
    let mut out = sigma.clone();
    for i in 0..sigma.nrows() {
        for j in 0..sigma.ncols() {
            out[(i, j)] = 0.5 * (sigma[(i, j)] + sigma[(j, i)]);
        }
    }
    out
}

fn to_nalgebra(sigma: &Array2<f64>) -> DMatrix<f64> {
    let n = sigma.nrows();
    DMatrix::from_fn(n, n, |r, c| sigma[(r, c)])
}

/// Eigenvalues of a symmetric matrix.
fn eigenvalues(sigma: &Array2<f64>) -> Vec<f64> {
    to_nalgebra(sigma)
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .collect()
}

/// Largest eigenvalue of a symmetric matrix (zero floor).
pub(crate) fn max_eigenvalue(sigma: &Array2<f64>) -> f64 {
    eigenvalues(sigma).into_iter().fold(0.0, f64::max)
}

/// Lift the diagonal so the smallest eigenvalue is at least `floor`.
///
/// # Errors
///
/// [`RondaError::Numeric`] on non-finite matrix entries.
pub fn ensure_positive_definite(sigma: &Array2<f64>, floor: f64) -> Result<Array2<f64>> {
    if sigma.iter().any(|v| !v.is_finite()) {
        return Err(RondaError::numeric(
            "covariance contains non-finite entries",
        ));
    }
    let mut out = symmetrize(sigma);
    let min_eig = eigenvalues(&out)
        .into_iter()
        .fold(f64::INFINITY, f64::min);
    if min_eig < floor {
        let lift = floor - min_eig;
        for i in 0..out.nrows() {
            out[(i, i)] += lift;
        }
    }
    Ok(out)
}

/// Exact projection of `v` onto `{w : Σw = target, l ≤ w ≤ u}`.
///
/// Bisection on the shift `τ` in `wᵢ = clamp(vᵢ − τ, lᵢ, uᵢ)`; the sum is
/// monotone in `τ`, so the projection is deterministic.
///
/// # Errors
///
/// [`RondaError::Infeasible`] when the box cannot reach the target sum.
pub fn project_capped_simplex(
    v: &Array1<f64>,
    bounds: &Bounds,
    target: f64,
) -> Result<Array1<f64>> {
    let n = v.len();
    bounds.validate(n)?;
    let sum_lower: f64 = bounds.lower.iter().sum();
    let sum_upper: f64 = bounds.upper.iter().sum();
    if target < sum_lower - 1e-12 || target > sum_upper + 1e-12 {
        return Err(RondaError::Infeasible(format!(
            "weight bounds admit sums in [{sum_lower:.4}, {sum_upper:.4}], target {target:.4}"
        )));
    }

    let clipped_sum = |tau: f64| -> f64 {
        v.iter()
            .zip(bounds.lower.iter().zip(&bounds.upper))
            .map(|(vi, (l, u))| (vi - tau).clamp(*l, *u))
            .sum()
    };

    // Bracket τ so the clipped sum crosses the target.
    let mut lo = v
        .iter()
        .zip(&bounds.upper)
        .map(|(vi, u)| vi - u)
        .fold(f64::INFINITY, f64::min)
        - 1.0;
    let mut hi = v
        .iter()
        .zip(&bounds.lower)
        .map(|(vi, l)| vi - l)
        .fold(f64::NEG_INFINITY, f64::max)
        + 1.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if clipped_sum(mid) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let tau = 0.5 * (lo + hi);
    Ok(Array1::from_iter(v.iter().zip(
        bounds.lower.iter().zip(&bounds.upper),
    )
    .map(|(vi, (l, u))| (vi - tau).clamp(*l, *u))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_symmetrize() {
        let m = array![[1.0, 0.2], [0.4, 1.0]];
        let s = symmetrize(&m);
        assert_relative_eq!(s[(0, 1)], 0.3, epsilon = 1e-15);
        assert_relative_eq!(s[(1, 0)], 0.3, epsilon = 1e-15);
    }

    #[test]
    fn test_eigen_floor_lifts_singular_matrix() {
        // Rank-1 covariance (perfectly correlated pair).
        let m = array![[0.04, 0.04], [0.04, 0.04]];
        let fixed = ensure_positive_definite(&m, 1e-8).unwrap();
        let min_eig = eigenvalues(&fixed).into_iter().fold(f64::INFINITY, f64::min);
        assert!(min_eig >= 1e-8 - 1e-12);
    }

    #[test]
    fn test_eigen_floor_leaves_good_matrix_alone() {
        let m = array![[0.04, 0.0], [0.0, 0.09]];
        let fixed = ensure_positive_definite(&m, 1e-10).unwrap();
        assert_relative_eq!(fixed[(0, 0)], 0.04, epsilon = 1e-12);
        assert_relative_eq!(fixed[(1, 1)], 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_hits_target_sum() {
        let v = array![0.7, 0.5, -0.1];
        let bounds = Bounds::long_only(3);
        let w = project_capped_simplex(&v, &bounds, 1.0).unwrap();
        let sum: f64 = w.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        assert!(w.iter().all(|x| (0.0..=1.0).contains(x)));
    }

    #[test]
    fn test_projection_respects_caps() {
        let v = array![10.0, 0.0, 0.0];
        let bounds = Bounds::long_only(3).with_max_weight(0.5);
        let w = project_capped_simplex(&v, &bounds, 1.0).unwrap();
        assert_relative_eq!(w[0], 0.5, epsilon = 1e-9);
        let sum: f64 = w.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_projection_of_feasible_point_is_identity() {
        let v = array![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let w = project_capped_simplex(&v, &Bounds::long_only(3), 1.0).unwrap();
        for (a, b) in v.iter().zip(w.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_infeasible_bounds_detected() {
        let v = array![0.5, 0.5];
        let bounds = Bounds::long_only(2).with_max_weight(0.3);
        let err = project_capped_simplex(&v, &bounds, 1.0).unwrap_err();
        assert!(matches!(err, RondaError::Infeasible(_)));
    }

    #[test]
    fn test_non_finite_bounds_are_unbounded() {
        let bounds = Bounds {
            lower: vec![0.0],
            upper: vec![f64::INFINITY],
        };
        assert!(matches!(
            bounds.validate(1),
            Err(RondaError::Unbounded(_))
        ));
    }
}
