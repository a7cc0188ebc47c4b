//! Per-stock risk profiles.
//!
//! A profile composes the aligned returns, the multi-factor regression and
//! the optional key-rate block for one ticker. Data-quality problems that
//! do not prevent estimation (collinearity, price-only fallbacks, thin
//! peer coverage) degrade the profile instead of failing it; hard failures
//! (`InsufficientData`, `DataUnavailable`) propagate as errors so a
//! profile is never silently empty.

use std::fmt;

use serde::{Deserialize, Serialize};

use ronda_traits::config::{DataQualityThresholds, Maturity};
use ronda_traits::error::Result;
use ronda_traits::stats;
use ronda_traits::types::{FactorId, MonthlySeries, Ticker, align};

use crate::ols::multi_factor_ols;
use crate::rates::{RateAggregation, RateBetas, key_rate_regression};

/// A non-fatal data-quality problem attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityFlag {
    /// The dividend-adjusted endpoint failed; close-only prices were used.
    PriceOnlyFallback {
        /// Ticker that fell back.
        ticker: Ticker,
    },
    /// The regression design matrix is ill-conditioned.
    HighConditionNumber {
        /// Observed condition number.
        value: f64,
    },
    /// A regressor's variance inflation factor indicates collinearity.
    HighVif {
        /// The collinear factor.
        factor: FactorId,
        /// Observed VIF.
        value: f64,
    },
    /// Most subindustry peers were dropped for missing data.
    ThinPeerCoverage {
        /// Peers dropped.
        dropped: usize,
        /// Peers configured.
        total: usize,
    },
    /// The key-rate regression explains little of the stock's variance.
    LowRateR2 {
        /// Observed adjusted R².
        r2_adj: f64,
    },
    /// A key-rate beta is outside the plausible range.
    ExtremeRateBeta {
        /// Maturity with the implausible beta.
        maturity: Maturity,
        /// Observed beta.
        beta: f64,
    },
}

impl fmt::Display for DataQualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PriceOnlyFallback { ticker } => {
                write!(f, "{ticker}: close-only prices used (no dividend adjustment)")
            }
            Self::HighConditionNumber { value } => {
                write!(f, "ill-conditioned regression (condition number {value:.1})")
            }
            Self::HighVif { factor, value } => {
                write!(f, "collinear {factor} factor (VIF {value:.1})")
            }
            Self::ThinPeerCoverage { dropped, total } => {
                write!(f, "{dropped} of {total} subindustry peers dropped")
            }
            Self::LowRateR2 { r2_adj } => {
                write!(f, "weak interest rate fit (adj R² {r2_adj:.2})")
            }
            Self::ExtremeRateBeta { maturity, beta } => {
                write!(f, "implausible {} beta {beta:.1}", maturity.as_key())
            }
        }
    }
}

/// Whether a profile estimated cleanly or with caveats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileQuality {
    /// No data-quality flags.
    Clean,
    /// Usable, but carrying the listed flags.
    Degraded(Vec<DataQualityFlag>),
}

/// Inputs to a profile build: the stock's returns plus every factor
/// return series already restricted to the analysis window.
#[derive(Debug, Clone)]
pub struct ProfileInputs {
    /// The subject ticker.
    pub ticker: Ticker,
    /// The stock's monthly returns.
    pub stock_returns: MonthlySeries,
    /// Non-rate factor returns in canonical [`FactorId::ALL`] order
    /// (absent factors simply missing).
    pub factor_returns: Vec<(FactorId, MonthlySeries)>,
    /// Scaled Δy series; empty unless the stock is rate-eligible.
    pub rate_deltas: Vec<(Maturity, MonthlySeries)>,
    /// Flags carried in from the data layer and peer construction.
    pub flags: Vec<DataQualityFlag>,
}

/// The per-stock factor profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFactorProfile {
    /// The subject ticker.
    pub ticker: Ticker,
    /// Factor betas in estimation order.
    pub betas: Vec<(FactorId, f64)>,
    /// Monthly idiosyncratic volatility (regression residual).
    pub idio_vol_monthly: f64,
    /// Adjusted R² of the multi-factor regression.
    pub r2_adj: f64,
    /// Monthly total volatility of the stock's returns.
    pub total_vol_monthly: f64,
    /// Annual total volatility (monthly × √12).
    pub total_vol_annual: f64,
    /// Aligned observations in the multi-factor regression.
    pub n_obs: usize,
    /// Variance inflation factor per estimated factor.
    pub vif: Vec<(FactorId, f64)>,
    /// Condition number of the design matrix, when a regression ran.
    pub condition_number: Option<f64>,
    /// The key-rate block, when estimated.
    pub rate: Option<RateBetas>,
    /// Annual volatility of each factor's proxy return series.
    pub factor_vols_annual: Vec<(FactorId, f64)>,
    /// Estimation quality tag.
    pub quality: ProfileQuality,
}

impl StockFactorProfile {
    /// Beta on `factor`; zero when not estimated.
    pub fn beta(&self, factor: FactorId) -> f64 {
        self.betas
            .iter()
            .find(|(f, _)| *f == factor)
            .map_or(0.0, |(_, b)| *b)
    }

    /// Annual proxy volatility for `factor`; zero when not estimated.
    pub fn factor_vol_annual(&self, factor: FactorId) -> f64 {
        self.factor_vols_annual
            .iter()
            .find(|(f, _)| *f == factor)
            .map_or(0.0, |(_, v)| *v)
    }

    /// Annualized idiosyncratic variance.
    pub fn idio_var_annual(&self) -> f64 {
        stats::annualize_var(self.idio_vol_monthly.powi(2))
    }

    /// Whether the profile carries data-quality flags.
    pub const fn is_degraded(&self) -> bool {
        matches!(self.quality, ProfileQuality::Degraded(_))
    }

    /// The attached data-quality flags.
    pub fn flags(&self) -> &[DataQualityFlag] {
        match &self.quality {
            ProfileQuality::Clean => &[],
            ProfileQuality::Degraded(flags) => flags,
        }
    }
}

/// Build the profile for one stock.
///
/// Runs the multi-factor regression on the aligned non-rate factors, the
/// key-rate regression on the Δy block when supplied, and packages vols
/// and diagnostics. A stock with no resolvable factors (e.g. a cash
/// proxy with no bundle) gets an empty beta vector and fully
/// idiosyncratic volatility.
///
/// # Errors
///
/// Propagates [`ronda_traits::RondaError::InsufficientData`] from either
/// regression.
pub fn build_profile(
    inputs: ProfileInputs,
    quality: &DataQualityThresholds,
    min_required_maturities: usize,
    aggregation: &RateAggregation,
) -> Result<StockFactorProfile> {
    let total_vol_monthly = inputs.stock_returns.vol();
    let total_vol_annual = stats::annualize_vol(total_vol_monthly);
    let mut flags = inputs.flags.clone();

    let mut betas: Vec<(FactorId, f64)> = Vec::new();
    let mut vif: Vec<(FactorId, f64)> = Vec::new();
    let mut factor_vols_annual: Vec<(FactorId, f64)> = Vec::new();
    let mut condition_number = None;
    let mut idio_vol_monthly = total_vol_monthly;
    let mut r2_adj = 0.0;
    let mut n_obs = inputs.stock_returns.len();

    if !inputs.factor_returns.is_empty() {
        let mut series_refs: Vec<&MonthlySeries> = vec![&inputs.stock_returns];
        series_refs.extend(inputs.factor_returns.iter().map(|(_, s)| s));
        let (dates, cols) = align(&series_refs);
        n_obs = dates.len();

        let y = &cols[0];
        let x_cols: Vec<Vec<f64>> = cols[1..].to_vec();
        let fit = multi_factor_ols(y, &x_cols, quality.min_observations_for_factor_betas)?;

        for ((factor, series), (beta, factor_vif)) in inputs
            .factor_returns
            .iter()
            .zip(fit.betas.iter().zip(&fit.vif))
        {
            betas.push((*factor, *beta));
            vif.push((*factor, *factor_vif));
            factor_vols_annual.push((*factor, series.annual_vol()));
            if *factor_vif > quality.max_vif {
                flags.push(DataQualityFlag::HighVif {
                    factor: *factor,
                    value: *factor_vif,
                });
            }
        }
        if fit.condition_number > quality.max_condition_number {
            flags.push(DataQualityFlag::HighConditionNumber {
                value: fit.condition_number,
            });
        }
        condition_number = Some(fit.condition_number);
        idio_vol_monthly = fit.residual_std;
        r2_adj = fit.r2_adj;
    }

    let rate = if inputs.rate_deltas.is_empty() {
        None
    } else {
        key_rate_regression(
            &inputs.stock_returns,
            &inputs.rate_deltas,
            min_required_maturities,
            aggregation,
            quality,
        )?
    };
    if let Some(rate) = &rate {
        betas.push((FactorId::InterestRate, rate.interest_rate));
        factor_vols_annual.push((
            FactorId::InterestRate,
            aggregation.collapse_series(&inputs.rate_deltas).annual_vol(),
        ));
        if rate.diagnostics.r2_adj < quality.min_r2_for_rate_factors {
            flags.push(DataQualityFlag::LowRateR2 {
                r2_adj: rate.diagnostics.r2_adj,
            });
        }
        for (maturity, beta) in &rate.per_maturity {
            if beta.abs() > quality.max_reasonable_interest_rate_beta {
                flags.push(DataQualityFlag::ExtremeRateBeta {
                    maturity: *maturity,
                    beta: *beta,
                });
            }
        }
    }

    Ok(StockFactorProfile {
        ticker: inputs.ticker,
        betas,
        idio_vol_monthly,
        r2_adj,
        total_vol_monthly,
        total_vol_annual,
        n_obs,
        vif,
        condition_number,
        rate,
        factor_vols_annual,
        quality: if flags.is_empty() {
            ProfileQuality::Clean
        } else {
            ProfileQuality::Degraded(flags)
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ronda_traits::types::Date;

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
    fn test_profile_with_market_factor() {
        let dates = months(24);
        let market: Vec<f64> = (0..24).map(|i| 0.01 * ((i % 5) as f64 - 2.0)).collect();
        let stock: Vec<f64> = market.iter().map(|m| 0.002 + 1.2 * m).collect();

        let profile = build_profile(
            ProfileInputs {
                ticker: Ticker::new("AAPL"),
                stock_returns: series(&dates, &stock),
                factor_returns: vec![(FactorId::Market, series(&dates, &market))],
                rate_deltas: Vec::new(),
                flags: Vec::new(),
            },
            &DataQualityThresholds::default(),
            2,
            &RateAggregation::Sum,
        )
        .unwrap();

        assert_relative_eq!(profile.beta(FactorId::Market), 1.2, epsilon = 1e-9);
        assert!(profile.idio_vol_monthly < 1e-9);
        assert_eq!(profile.n_obs, 24);
        assert_relative_eq!(
            profile.total_vol_annual,
            profile.total_vol_monthly * 12.0f64.sqrt(),
            epsilon = 1e-12
        );
        assert!(!profile.is_degraded());
        assert!(profile.factor_vol_annual(FactorId::Market) > 0.0);
    }

    #[test]
    fn test_profile_without_factors_is_fully_idiosyncratic() {
        let dates = months(12);
        let returns: Vec<f64> = (0..12).map(|i| 0.005 * ((i % 3) as f64 - 1.0)).collect();
        let profile = build_profile(
            ProfileInputs {
                ticker: Ticker::new("SGOV"),
                stock_returns: series(&dates, &returns),
                factor_returns: Vec::new(),
                rate_deltas: Vec::new(),
                flags: Vec::new(),
            },
            &DataQualityThresholds::default(),
            2,
            &RateAggregation::Sum,
        )
        .unwrap();

        assert!(profile.betas.is_empty());
        assert_relative_eq!(
            profile.idio_vol_monthly,
            profile.total_vol_monthly,
            epsilon = 1e-15
        );
        assert_eq!(profile.beta(FactorId::Market), 0.0);
    }

    #[test]
    fn test_collinear_factors_degrade_profile() {
        let dates = months(24);
        let market: Vec<f64> = (0..24).map(|i| 0.01 * ((i % 7) as f64 - 3.0)).collect();
        // Industry proxy almost identical to market.
        let industry: Vec<f64> = market.iter().map(|m| m * 1.0001).collect();
        let stock: Vec<f64> = market.iter().map(|m| 0.001 + 1.1 * m).collect();

        let profile = build_profile(
            ProfileInputs {
                ticker: Ticker::new("XYZ"),
                stock_returns: series(&dates, &stock),
                factor_returns: vec![
                    (FactorId::Market, series(&dates, &market)),
                    (FactorId::Industry, series(&dates, &industry)),
                ],
                rate_deltas: Vec::new(),
                flags: Vec::new(),
            },
            &DataQualityThresholds::default(),
            2,
            &RateAggregation::Sum,
        )
        .unwrap();

        assert!(profile.is_degraded());
        assert!(
            profile
                .flags()
                .iter()
                .any(|f| matches!(f, DataQualityFlag::HighVif { .. }))
        );
    }

    #[test]
    fn test_rate_block_adds_interest_rate_beta() {
        let dates = months(24);
        let dy: Vec<f64> = (0..24).map(|i| 0.001 * ((i % 5) as f64 - 2.0)).collect();
        let dy2: Vec<f64> = (0..24).map(|i| 0.0012 * ((i % 3) as f64 - 1.0)).collect();
        let stock: Vec<f64> = dy
            .iter()
            .zip(&dy2)
            .map(|(a, b)| 0.001 - 5.0 * a - 3.0 * b)
            .collect();

        let profile = build_profile(
            ProfileInputs {
                ticker: Ticker::new("TLT"),
                stock_returns: series(&dates, &stock),
                factor_returns: Vec::new(),
                rate_deltas: vec![
                    (Maturity::Y10, series(&dates, &dy)),
                    (Maturity::Y2, series(&dates, &dy2)),
                ],
                flags: Vec::new(),
            },
            &DataQualityThresholds::default(),
            2,
            &RateAggregation::Sum,
        )
        .unwrap();

        assert_relative_eq!(profile.beta(FactorId::InterestRate), -8.0, epsilon = 1e-6);
        assert!(profile.rate.is_some());
        assert!(profile.factor_vol_annual(FactorId::InterestRate) > 0.0);
    }

    #[test]
    fn test_carried_flags_degrade() {
        let dates = months(12);
        let returns: Vec<f64> = (0..12).map(|i| 0.004 * ((i % 4) as f64 - 1.5)).collect();
        let profile = build_profile(
            ProfileInputs {
                ticker: Ticker::new("ABC"),
                stock_returns: series(&dates, &returns),
                factor_returns: Vec::new(),
                rate_deltas: Vec::new(),
                flags: vec![DataQualityFlag::PriceOnlyFallback {
                    ticker: Ticker::new("ABC"),
                }],
            },
            &DataQualityThresholds::default(),
            2,
            &RateAggregation::Sum,
        )
        .unwrap();
        assert!(profile.is_degraded());
    }
}
