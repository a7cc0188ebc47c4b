//! Ordinary least squares kernels.
//!
//! Both kernels solve through the SVD of the design matrix rather than the
//! normal equations, so near-collinear regressor sets degrade gracefully
//! and the condition number falls out of the decomposition. Diagnostics
//! (adjusted R², VIF, condition number) let callers detect collinearity
//! without failing the fit.

use nalgebra::{DMatrix, DVector};

use ronda_traits::error::{Result, RondaError};
use ronda_traits::stats;

/// Singular values below this fraction of the largest are treated as zero.
const SVD_EPS: f64 = 1e-12;

/// Result of the single-factor (CAPM) regression.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CapmStats {
    /// OLS slope of the stock on the factor.
    pub beta: f64,
    /// Monthly intercept.
    pub alpha_monthly: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Monthly residual standard deviation.
    pub idio_vol_monthly: f64,
    /// Aligned observations used.
    pub n_obs: usize,
}

/// Result of a multi-factor regression.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OlsFit {
    /// Slope per regressor, in input column order.
    pub betas: Vec<f64>,
    /// Monthly intercept.
    pub intercept: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Adjusted R².
    pub r2_adj: f64,
    /// Monthly residual standard deviation.
    pub residual_std: f64,
    /// Observations used.
    pub n_obs: usize,
    /// Variance inflation factor per regressor; infinite when the
    /// regressor correlation matrix is singular.
    pub vif: Vec<f64>,
    /// Condition number of the design matrix.
    pub condition_number: f64,
}

/// Single-factor OLS of a stock's returns on one factor's returns.
///
/// # Errors
///
/// [`RondaError::InsufficientData`] below `min_obs` aligned observations,
/// [`RondaError::Numeric`] on non-finite inputs or a constant factor.
pub fn single_factor_ols(stock: &[f64], factor: &[f64], min_obs: usize) -> Result<CapmStats> {
    if stock.len() != factor.len() {
        return Err(RondaError::numeric(format!(
            "regression length mismatch: {} vs {}",
            stock.len(),
            factor.len()
        )));
    }
    let n = stock.len();
    if n < min_obs.max(2) {
        return Err(RondaError::InsufficientData(format!(
            "{n} aligned observations, {} required for the market regression",
            min_obs.max(2)
        )));
    }
    ensure_finite(stock)?;
    ensure_finite(factor)?;

    let var_x = stats::sample_variance(factor);
    if var_x < stats::MIN_DENOMINATOR {
        return Err(RondaError::numeric(
            "factor returns are constant, beta undefined".to_string(),
        ));
    }
    let beta = stats::sample_covariance(factor, stock) / var_x;
    let alpha = stats::mean(stock) - beta * stats::mean(factor);

    let mean_y = stats::mean(stock);
    let mut ssr = 0.0;
    let mut sst = 0.0;
    for (y, x) in stock.iter().zip(factor) {
        let resid = y - (alpha + beta * x);
        ssr += resid * resid;
        sst += (y - mean_y).powi(2);
    }
    let r2 = if sst > stats::MIN_DENOMINATOR {
        1.0 - ssr / sst
    } else {
        0.0
    };
    let idio_vol_monthly = if n > 2 {
        (ssr / (n - 2) as f64).sqrt()
    } else {
        0.0
    };

    Ok(CapmStats {
        beta,
        alpha_monthly: alpha,
        r2,
        idio_vol_monthly,
        n_obs: n,
    })
}

/// Multi-factor OLS with an intercept.
///
/// `x_cols` holds one regressor column per factor; the intercept is added
/// internally and is not reported in [`OlsFit::betas`].
///
/// # Errors
///
/// [`RondaError::InsufficientData`] below `min_obs` observations,
/// [`RondaError::Numeric`] on shape mismatches, non-finite inputs, or an
/// unsolvable decomposition.
pub fn multi_factor_ols(y: &[f64], x_cols: &[Vec<f64>], min_obs: usize) -> Result<OlsFit> {
    let k = x_cols.len();
    if k == 0 {
        return Err(RondaError::numeric(
            "multi-factor regression needs at least one regressor".to_string(),
        ));
    }
    let n = y.len();
    for col in x_cols {
        if col.len() != n {
            return Err(RondaError::numeric(format!(
                "regressor length {} does not match {n} observations",
                col.len()
            )));
        }
        ensure_finite(col)?;
    }
    ensure_finite(y)?;
    if n < min_obs.max(k + 1) {
        return Err(RondaError::InsufficientData(format!(
            "{n} aligned observations, {} required for {k} factors",
            min_obs.max(k + 1)
        )));
    }

    // Design matrix: intercept column followed by the factor columns.
    let mut design = DMatrix::zeros(n, k + 1);
    for r in 0..n {
        design[(r, 0)] = 1.0;
        for (c, col) in x_cols.iter().enumerate() {
            design[(r, c + 1)] = col[r];
        }
    }
    let y_vec = DVector::from_column_slice(y);

    let svd = design.clone().svd(true, true);
    let singular = &svd.singular_values;
    let s_max = singular.iter().copied().fold(0.0, f64::max);
    let s_min = singular.iter().copied().fold(f64::INFINITY, f64::min);
    let condition_number = if s_min > SVD_EPS * s_max.max(1.0) {
        s_max / s_min
    } else {
        f64::INFINITY
    };

    let coefficients = svd
        .solve(&y_vec, SVD_EPS)
        .map_err(|e| RondaError::numeric(format!("SVD solve failed: {e}")))?;
    let intercept = coefficients[0];
    let betas: Vec<f64> = (0..k).map(|j| coefficients[j + 1]).collect();

    let fitted = design * &coefficients;
    let mean_y = stats::mean(y);
    let mut ssr = 0.0;
    let mut sst = 0.0;
    for r in 0..n {
        ssr += (y[r] - fitted[r]).powi(2);
        sst += (y[r] - mean_y).powi(2);
    }
    let r2 = if sst > stats::MIN_DENOMINATOR {
        1.0 - ssr / sst
    } else {
        0.0
    };
    let dof = n as f64 - k as f64 - 1.0;
    let r2_adj = if dof > 0.0 {
        1.0 - (1.0 - r2) * (n as f64 - 1.0) / dof
    } else {
        r2
    };
    let residual_std = if dof > 0.0 { (ssr / dof).sqrt() } else { 0.0 };

    Ok(OlsFit {
        betas,
        intercept,
        r2,
        r2_adj,
        residual_std,
        n_obs: n,
        vif: variance_inflation(x_cols),
        condition_number,
    })
}

/// Variance inflation factors from the inverse of the regressor
/// correlation matrix. A single regressor has VIF 1; a singular
/// correlation matrix yields infinite VIFs.
fn variance_inflation(x_cols: &[Vec<f64>]) -> Vec<f64> {
    let k = x_cols.len();
    if k == 1 {
        return vec![1.0];
    }
    let mut corr = DMatrix::identity(k, k);
    for i in 0..k {
        for j in (i + 1)..k {
            let si = stats::sample_std(&x_cols[i]);
            let sj = stats::sample_std(&x_cols[j]);
            let c = if si > stats::MIN_DENOMINATOR && sj > stats::MIN_DENOMINATOR {
                stats::sample_covariance(&x_cols[i], &x_cols[j]) / (si * sj)
            } else {
                0.0
            };
            corr[(i, j)] = c;
            corr[(j, i)] = c;
        }
    }
    corr.try_inverse().map_or(vec![f64::INFINITY; k], |inv| {
        (0..k).map(|j| inv[(j, j)].max(1.0)).collect()
    })
}

fn ensure_finite(values: &[f64]) -> Result<()> {
    if let Some(v) = values.iter().find(|v| !v.is_finite()) {
        return Err(RondaError::numeric(format!(
            "non-finite value {v} in regression input"
        )));
    }
    Ok(())
}
