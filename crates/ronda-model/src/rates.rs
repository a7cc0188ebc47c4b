//! Key-rate Treasury factor preparation and regression.
//!
//! Yield levels arrive in percentage points; Δy is the month-over-month
//! first difference scaled to decimal. The key-rate beta vector collapses
//! to a single `interest_rate` exposure through a pluggable aggregation
//! rule so higher-level aggregation sees a flat factor vector.

use serde::{Deserialize, Serialize};
use tracing::warn;

use ronda_data::YieldFrame;
use ronda_traits::config::{DataQualityThresholds, Maturity, RateScale};
use ronda_traits::error::{Result, RondaError};
use ronda_traits::types::{MonthlySeries, align};

use crate::ols::multi_factor_ols;

/// How the key-rate beta vector collapses to one `interest_rate` number.
///
/// The default is the plain sum of the per-maturity betas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateAggregation {
    /// Sum the key-rate betas.
    #[default]
    Sum,
    /// Weighted sum; weights are matched to the maturity order of the
    /// regression and missing weights default to zero.
    Weighted(Vec<f64>),
}

impl RateAggregation {
    /// Collapse `(maturity, beta)` pairs to the aggregate exposure.
    pub fn collapse(&self, betas: &[(Maturity, f64)]) -> f64 {
        match self {
            Self::Sum => betas.iter().map(|(_, b)| b).sum(),
            Self::Weighted(weights) => betas
                .iter()
                .enumerate()
                .map(|(i, (_, b))| b * weights.get(i).copied().unwrap_or(0.0))
                .sum(),
        }
    }

    /// Aggregate the Δy series the same way the betas are aggregated, so
    /// the `interest_rate` factor has a consistent return series.
    pub fn collapse_series(&self, deltas: &[(Maturity, MonthlySeries)]) -> MonthlySeries {
        let refs: Vec<&MonthlySeries> = deltas.iter().map(|(_, s)| s).collect();
        let (dates, cols) = align(&refs);
        let values: Vec<f64> = (0..dates.len())
            .map(|r| {
                let row: Vec<(Maturity, f64)> = deltas
                    .iter()
                    .enumerate()
                    .map(|(c, (m, _))| (*m, cols[c][r]))
                    .collect();
                self.collapse(&row)
            })
            .collect();
        MonthlySeries::new(dates, values).expect("aligned dates are ascending and values finite")
    }
}

/// Diagnostics attached to a key-rate regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBetaDiagnostics {
    /// Adjusted R² of the Δy regression.
    pub r2_adj: f64,
    /// Variance inflation factor per maturity.
    pub vif: Vec<(Maturity, f64)>,
    /// Condition number of the Δy design matrix.
    pub condition_number: f64,
    /// Aligned observations used.
    pub n_obs: usize,
}

/// Key-rate regression output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBetas {
    /// Beta per maturity, in regression order.
    pub per_maturity: Vec<(Maturity, f64)>,
    /// The collapsed `interest_rate` exposure.
    pub interest_rate: f64,
    /// Monthly residual standard deviation of the Δy regression.
    pub residual_std: f64,
    /// Collinearity and fit diagnostics.
    pub diagnostics: RateBetaDiagnostics,
}

/// Build scaled Δy series from month-end yield levels.
///
/// Maturities lacking at least two level observations are dropped with a
/// warning; the caller decides whether enough remain.
pub fn prepare_rate_factors(
    frame: &YieldFrame,
    scale: RateScale,
) -> Vec<(Maturity, MonthlySeries)> {
    let mut out = Vec::new();
    for (maturity, levels) in frame.iter() {
        if levels.len() < 2 {
            warn!(maturity = maturity.as_key(), "too few yield levels, dropping maturity");
            continue;
        }
        out.push((*maturity, levels.first_differences().scaled(scale.multiplier())));
    }
    out
}

/// Regress stock returns on the Δy block only.
///
/// Returns `Ok(None)` when fewer than `min_required_maturities` Δy series
/// are available; the rate factor is then omitted for the stock.
///
/// # Errors
///
/// [`RondaError::InsufficientData`] when aligned observations fall below
/// the configured minimum.
pub fn key_rate_regression(
    stock_returns: &MonthlySeries,
    deltas: &[(Maturity, MonthlySeries)],
    min_required_maturities: usize,
    aggregation: &RateAggregation,
    quality: &DataQualityThresholds,
) -> Result<Option<RateBetas>> {
    if deltas.len() < min_required_maturities.max(1) {
        warn!(
            available = deltas.len(),
            required = min_required_maturities,
            "not enough key-rate series, omitting interest rate factor"
        );
        return Ok(None);
    }

    let mut series_refs: Vec<&MonthlySeries> = vec![stock_returns];
    series_refs.extend(deltas.iter().map(|(_, s)| s));
    let (dates, cols) = align(&series_refs);
    let n = dates.len();
    if n < quality.min_observations_for_interest_rate_beta {
        return Err(RondaError::InsufficientData(format!(
            "{n} aligned observations, {} required for the interest rate regression",
            quality.min_observations_for_interest_rate_beta
        )));
    }

    let y = &cols[0];
    let x_cols: Vec<Vec<f64>> = cols[1..].to_vec();
    let fit = multi_factor_ols(y, &x_cols, quality.min_observations_for_regression)?;

    let per_maturity: Vec<(Maturity, f64)> = deltas
        .iter()
        .map(|(m, _)| *m)
        .zip(fit.betas.iter().copied())
        .collect();
    let interest_rate = aggregation.collapse(&per_maturity);

    Ok(Some(RateBetas {
        interest_rate,
        residual_std: fit.residual_std,
        diagnostics: RateBetaDiagnostics {
            r2_adj: fit.r2_adj,
            vif: deltas
                .iter()
                .map(|(m, _)| *m)
                .zip(fit.vif.iter().copied())
                .collect(),
            condition_number: fit.condition_number,
            n_obs: fit.n_obs,
        },
        per_maturity,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ronda_traits::types::Date;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn months(n: usize) -> Vec<Date> {
        (0..n)
            .map(|i| {
                let m = (i % 12) as u32 + 1;
                let y = 2020 + (i / 12) as i32;
                let next = if m == 12 {
                    Date::from_ymd_opt(y + 1, 1, 1)
                } else {
                    Date::from_ymd_opt(y, m + 1, 1)
                };
                next.unwrap().pred_opt().unwrap()
            })
            .collect()
    }

    fn series(dates: &[Date], values: &[f64]) -> MonthlySeries {
        MonthlySeries::new(dates.to_vec(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_prepare_scales_pp_to_decimal() {
        let dates = months(3);
        let levels = series(&dates, &[4.00, 4.50, 4.25]);
        let frame = YieldFrame::new(vec![(Maturity::Y10, levels)]);
        let deltas = prepare_rate_factors(&frame, RateScale::Pp);
        assert_eq!(deltas.len(), 1);
        let dy = &deltas[0].1;
        assert_eq!(dy.len(), 2);
        assert_relative_eq!(dy.values()[0], 0.005, epsilon = 1e-12);
        assert_relative_eq!(dy.values()[1], -0.0025, epsilon = 1e-12);
    }

    #[test]
    fn test_key_rate_regression_recovers_betas() {
        let dates = months(10);
        let dy2 = [0.001, -0.002, 0.003, 0.0005, -0.001, 0.002, 0.0015, -0.0005, 0.001, -0.003];
        let dy10 = [-0.001, 0.001, 0.002, -0.002, 0.0005, -0.0015, 0.001, 0.002, -0.001, 0.0005];
        // Stock: -4 on the 2y, -7 on the 10y, plus a constant drift.
        let stock: Vec<f64> = dy2
            .iter()
            .zip(&dy10)
            .map(|(a, b)| 0.002 - 4.0 * a - 7.0 * b)
            .collect();
        let deltas = vec![
            (Maturity::Y2, series(&dates, &dy2)),
            (Maturity::Y10, series(&dates, &dy10)),
        ];
        let stock_series = series(&dates, &stock);

        let out = key_rate_regression(
            &stock_series,
            &deltas,
            2,
            &RateAggregation::Sum,
            &DataQualityThresholds::default(),
        )
        .unwrap()
        .unwrap();

        assert_relative_eq!(out.per_maturity[0].1, -4.0, epsilon = 1e-6);
        assert_relative_eq!(out.per_maturity[1].1, -7.0, epsilon = 1e-6);
        assert_relative_eq!(out.interest_rate, -11.0, epsilon = 1e-6);
        assert!(out.diagnostics.r2_adj > 0.99);
    }

    #[test]
    fn test_too_few_maturities_omits_factor() {
        let dates = months(10);
        let deltas = vec![(Maturity::Y10, series(&dates, &[0.001; 10]))];
        let stock = series(&dates, &[0.01; 10]);
        let out = key_rate_regression(
            &stock,
            &deltas,
            2,
            &RateAggregation::Sum,
            &DataQualityThresholds::default(),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_weighted_aggregation() {
        let betas = [(Maturity::Y2, -2.0), (Maturity::Y10, -6.0)];
        assert_relative_eq!(RateAggregation::Sum.collapse(&betas), -8.0);
        assert_relative_eq!(
            RateAggregation::Weighted(vec![0.5, 0.25]).collapse(&betas),
            -2.5
        );
    }

    #[test]
    fn test_collapse_series_sums_rows() {
        let dates = months(3);
        let deltas = vec![
            (Maturity::Y2, series(&dates, &[0.001, 0.002, -0.001])),
            (Maturity::Y10, series(&dates, &[0.002, -0.001, 0.001])),
        ];
        let agg = RateAggregation::Sum.collapse_series(&deltas);
        assert_eq!(agg.len(), 3);
        assert_relative_eq!(agg.values()[0], 0.003, epsilon = 1e-12);
        assert_relative_eq!(agg.values()[1], 0.001, epsilon = 1e-12);
    }
}
