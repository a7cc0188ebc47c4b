//! Minimum-variance and maximum-return solvers.
//!
//! Both objectives run projected gradient descent on the box-constrained
//! simplex. Beta caps enter as a quadratic penalty during descent and are
//! verified after the solve; a violated cap at the optimum rejects the
//! solution as infeasible. Everything is deterministic: fixed starting
//! point, fixed iteration budget, no randomness.

use ndarray::{Array1, Array2};
use tracing::debug;

use ronda_traits::error::{Result, RondaError};

use crate::solver::{Bounds, ensure_positive_definite, max_eigenvalue, project_capped_simplex};

/// A linear exposure cap `|c·w| ≤ cap` (factor or industry-proxy beta).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BetaCap {
    /// Human-readable constraint label.
    pub label: String,
    /// Per-asset coefficients (the beta column).
    pub coefficients: Vec<f64>,
    /// Maximum absolute exposure.
    pub cap: f64,
}

impl BetaCap {
    fn exposure(&self, w: &Array1<f64>) -> f64 {
        self.coefficients.iter().zip(w).map(|(c, wi)| c * wi).sum()
    }

    fn violation(&self, w: &Array1<f64>) -> f64 {
        (self.exposure(w).abs() - self.cap).max(0.0)
    }
}

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptimizerSettings {
    /// Gradient iterations per solve.
    pub max_iterations: usize,
    /// Quadratic penalty weight on beta-cap violations.
    pub penalty_weight: f64,
    /// Eigenvalue floor applied to the covariance.
    pub eigen_floor: f64,
    /// Feasibility tolerance for post-solution cap checks.
    pub tolerance: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            penalty_weight: 1000.0,
            eigen_floor: 1e-10,
            // Loose enough to absorb the quadratic-penalty bias on
            // binding beta caps, tight enough to reject real violations.
            tolerance: 1e-4,
        }
    }
}

/// Descend `λ·wᵀΣw − μᵀw` (μ optional) under simplex, box and penalty
/// terms, from the projected equal-weight start.
fn descend(
    sigma: &Array2<f64>,
    mu: Option<&Array1<f64>>,
    risk_aversion: f64,
    bounds: &Bounds,
    caps: &[BetaCap],
    settings: &OptimizerSettings,
) -> Result<Array1<f64>> {
    let n = sigma.nrows();
    let equal = Array1::from_elem(n, 1.0 / n as f64);
    let mut w = project_capped_simplex(&equal, bounds, 1.0)?;

    // Fixed step from the objective's Lipschitz bound.
    let cap_norm: f64 = caps
        .iter()
        .map(|c| c.coefficients.iter().map(|x| x * x).sum::<f64>())
        .sum();
    let lipschitz =
        2.0 * risk_aversion * max_eigenvalue(sigma) + 2.0 * settings.penalty_weight * cap_norm;
    let step = if lipschitz > 0.0 { 1.0 / lipschitz } else { 1.0 };

    for _ in 0..settings.max_iterations {
        let mut grad = sigma.dot(&w) * (2.0 * risk_aversion);
        if let Some(mu) = mu {
            grad = grad - mu;
        }
        for cap in caps {
            let exposure = cap.exposure(&w);
            if exposure.abs() > cap.cap {
                let excess = exposure - cap.cap.copysign(exposure);
                for (g, c) in grad.iter_mut().zip(&cap.coefficients) {
                    *g += 2.0 * settings.penalty_weight * excess * c;
                }
            }
        }
        let candidate = &w - &(grad * step);
        w = project_capped_simplex(&candidate, bounds, 1.0)?;
    }
    Ok(w)
}

fn reject_cap_violations(w: &Array1<f64>, caps: &[BetaCap], tolerance: f64) -> Result<()> {
    for cap in caps {
        if cap.violation(w) > tolerance {
            return Err(RondaError::Infeasible(format!(
                "{} exposure {:.4} exceeds cap {:.4} at the optimum",
                cap.label,
                cap.exposure(w),
                cap.cap
            )));
        }
    }
    Ok(())
}

fn portfolio_vol(w: &Array1<f64>, sigma: &Array2<f64>) -> f64 {
    w.dot(&sigma.dot(w)).max(0.0).sqrt()
}

/// Minimum-variance weights under the limit system.
///
/// Minimizes `wᵀΣw` subject to `Σw = 1`, the box bounds, and the beta
/// caps.
///
/// # Errors
///
/// [`RondaError::Infeasible`] when the constraint set is empty or a beta
/// cap cannot be met; [`RondaError::Numeric`] on a broken covariance.
pub fn run_min_variance(
    sigma: &Array2<f64>,
    bounds: &Bounds,
    caps: &[BetaCap],
    settings: &OptimizerSettings,
) -> Result<Array1<f64>> {
    let sigma = ensure_positive_definite(sigma, settings.eigen_floor)?;
    let w = descend(&sigma, None, 1.0, bounds, caps, settings)?;
    reject_cap_violations(&w, caps, settings.tolerance)?;
    debug!(vol = portfolio_vol(&w, &sigma), "minimum variance solved");
    Ok(w)
}

/// Maximum-expected-return weights under the limit system and an
/// optional volatility ceiling (same periodicity as Σ).
///
/// Without a ceiling this is a linear program solved by greedy fill in
/// descending μ. With a ceiling, the risk-aversion multiplier of
/// `λ·wᵀΣw − μᵀw` is bisected until the volatility constraint binds.
///
/// # Errors
///
/// [`RondaError::Infeasible`] when even the minimum-variance portfolio
/// violates the ceiling or a beta cap cannot be met;
/// [`RondaError::Unbounded`] on non-finite bounds.
pub fn run_max_return(
    mu: &Array1<f64>,
    sigma: &Array2<f64>,
    bounds: &Bounds,
    caps: &[BetaCap],
    vol_ceiling: Option<f64>,
    settings: &OptimizerSettings,
) -> Result<Array1<f64>> {
    let n = mu.len();
    bounds.validate(n)?;
    let sigma = ensure_positive_definite(sigma, settings.eigen_floor)?;

    let Some(ceiling) = vol_ceiling else {
        // Pure LP: fill positions in descending expected return.
        let w = greedy_fill(mu, bounds)?;
        reject_cap_violations(&w, caps, settings.tolerance)?;
        return Ok(w);
    };

    // Feasibility: the least-risky point must satisfy the ceiling.
    let w_min = descend(&sigma, None, 1.0, bounds, caps, settings)?;
    if portfolio_vol(&w_min, &sigma) > ceiling + settings.tolerance {
        return Err(RondaError::Infeasible(format!(
            "volatility ceiling {ceiling:.4} below the minimum achievable {:.4}",
            portfolio_vol(&w_min, &sigma)
        )));
    }

    // Bisect risk aversion: volatility decreases as λ grows.
    let mut lo: f64 = 1e-6;
    let mut hi: f64 = 1e6;
    let mut best = w_min.clone();
    let mut best_ret = mu.dot(&w_min);
    for _ in 0..60 {
        let lambda = (lo * hi).sqrt();
        let w = descend(&sigma, Some(mu), lambda, bounds, caps, settings)?;
        if portfolio_vol(&w, &sigma) <= ceiling + settings.tolerance {
            let ret = mu.dot(&w);
            if ret > best_ret {
                best_ret = ret;
                best = w;
            }
            // Feasible: try taking more risk.
            hi = lambda;
        } else {
            lo = lambda;
        }
    }
    reject_cap_violations(&best, caps, settings.tolerance)?;
    debug!(
        expected_return = best_ret,
        vol = portfolio_vol(&best, &sigma),
        "maximum return solved"
    );
    Ok(best)
}

/// Greedy simplex fill in descending expected return, ties broken by
/// index order (input order of the holdings).
fn greedy_fill(mu: &Array1<f64>, bounds: &Bounds) -> Result<Array1<f64>> {
    let n = mu.len();
    let sum_lower: f64 = bounds.lower.iter().sum();
    let sum_upper: f64 = bounds.upper.iter().sum();
    if sum_lower > 1.0 + 1e-12 || sum_upper < 1.0 - 1e-12 {
        return Err(RondaError::Infeasible(format!(
            "weight bounds admit sums in [{sum_lower:.4}, {sum_upper:.4}], target 1"
        )));
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| {
        mu[*b]
            .partial_cmp(&mu[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(b))
    });
    let mut w = Array1::from_iter(bounds.lower.iter().copied());
    let mut remaining = 1.0 - sum_lower;
    for i in order {
        if remaining <= 0.0 {
            break;
        }
        let room = bounds.upper[i] - w[i];
        let add = room.min(remaining);
        w[i] += add;
        remaining -= add;
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_min_variance_equal_vol_uncorrelated() {
        // Three equal-volatility, zero-correlation assets with a 0.5 cap:
        // the cap is non-binding and the solution is 1/3 each.
        let sigma = Array2::eye(3) * 0.04;
        let bounds = Bounds::long_only(3).with_max_weight(0.5);
        let w = run_min_variance(&sigma, &bounds, &[], &OptimizerSettings::default()).unwrap();
        for wi in w.iter() {
            assert_relative_eq!(*wi, 1.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_min_variance_prefers_low_vol_asset() {
        let sigma = array![[0.01, 0.0], [0.0, 0.09]];
        let bounds = Bounds::long_only(2);
        let w = run_min_variance(&sigma, &bounds, &[], &OptimizerSettings::default()).unwrap();
        // Closed form: w1 = σ2²/(σ1²+σ2²) = 0.9.
        assert_relative_eq!(w[0], 0.9, epsilon = 1e-4);
        assert_relative_eq!(w[1], 0.1, epsilon = 1e-4);
    }

    #[test]
    fn test_min_variance_weight_cap_binds() {
        let sigma = array![[0.01, 0.0], [0.0, 0.09]];
        let bounds = Bounds::long_only(2).with_max_weight(0.6);
        let w = run_min_variance(&sigma, &bounds, &[], &OptimizerSettings::default()).unwrap();
        assert_relative_eq!(w[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_min_variance_respects_beta_cap() {
        // Asset 0 is low-vol but carries beta 2; cap portfolio beta at
        // 0.8 so the solver must shift into asset 1.
        let sigma = array![[0.01, 0.0], [0.0, 0.04]];
        let bounds = Bounds::long_only(2);
        let caps = vec![BetaCap {
            label: "market beta".to_string(),
            coefficients: vec![2.0, 0.0],
            cap: 0.8,
        }];
        let w =
            run_min_variance(&sigma, &bounds, &caps, &OptimizerSettings::default()).unwrap();
        assert!(2.0 * w[0] <= 0.8 + 1e-4);
        let sum: f64 = w.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_max_return_without_ceiling_is_greedy() {
        let mu = array![0.05, 0.12, 0.08];
        let sigma = Array2::eye(3) * 0.04;
        let bounds = Bounds::long_only(3).with_max_weight(0.6);
        let w = run_max_return(
            &mu,
            &sigma,
            &bounds,
            &[],
            None,
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert_relative_eq!(w[1], 0.6, epsilon = 1e-12);
        assert_relative_eq!(w[2], 0.4, epsilon = 1e-12);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_max_return_vol_ceiling_binds() {
        let mu = array![0.12, 0.04];
        let sigma = array![[0.09, 0.0], [0.0, 0.0001]];
        let bounds = Bounds::long_only(2);
        let ceiling = 0.10;
        let w = run_max_return(
            &mu,
            &sigma,
            &bounds,
            &[],
            Some(ceiling),
            &OptimizerSettings::default(),
        )
        .unwrap();
        let vol = portfolio_vol(&w, &sigma);
        assert!(vol <= ceiling + 1e-4);
        // The risky asset should be held close to the ceiling's budget.
        assert!(w[0] > 0.2);
        let greedy = run_max_return(
            &mu,
            &sigma,
            &bounds,
            &[],
            None,
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(mu.dot(&w) <= mu.dot(&greedy) + 1e-9);
    }

    #[test]
    fn test_max_return_infeasible_ceiling() {
        let mu = array![0.10, 0.08];
        let sigma = array![[0.09, 0.0], [0.0, 0.09]];
        let bounds = Bounds::long_only(2);
        let err = run_max_return(
            &mu,
            &sigma,
            &bounds,
            &[],
            Some(0.01),
            &OptimizerSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RondaError::Infeasible(_)));
    }

    #[test]
    fn test_impossible_beta_cap_is_rejected() {
        // Both assets carry beta 1.5; a 1.0 cap cannot hold with Σw = 1.
        let sigma = Array2::eye(2) * 0.04;
        let bounds = Bounds::long_only(2);
        let caps = vec![BetaCap {
            label: "market beta".to_string(),
            coefficients: vec![1.5, 1.5],
            cap: 1.0,
        }];
        let err =
            run_min_variance(&sigma, &bounds, &caps, &OptimizerSettings::default()).unwrap_err();
        assert!(matches!(err, RondaError::Infeasible(_)));
    }

    #[test]
    fn test_determinism() {
        let sigma = array![[0.02, 0.005], [0.005, 0.03]];
        let bounds = Bounds::long_only(2);
        let a = run_min_variance(&sigma, &bounds, &[], &OptimizerSettings::default()).unwrap();
        let b = run_min_variance(&sigma, &bounds, &[], &OptimizerSettings::default()).unwrap();
        assert_eq!(a, b);
    }
}
