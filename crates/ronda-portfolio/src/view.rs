//! The portfolio view: the single large result of an analysis.
//!
//! `build_portfolio_view` composes weights, the holdings returns panel and
//! per-stock profiles into covariance and correlation matrices, the
//! variance decomposition under the factor model, Euler risk
//! contributions, industry variance, and the display tables. All math
//! runs on dense arrays with explicit index vectors; tables are built at
//! the edges and never feed back into the math.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use ronda_data::ReturnsPanel;
use ronda_model::{DataQualityFlag, StockFactorProfile};
use ronda_traits::error::{Result, RondaError};
use ronda_traits::stats;
use ronda_traits::table::{Table, Value};
use ronda_traits::types::{Date, FactorId, MonthlySeries, Ticker};

/// Split of portfolio variance into factor and idiosyncratic components.
///
/// Industry and subindustry contributions are excluded from the factor
/// bucket and reported separately in [`IndustryVariance`], so the two
/// views never double count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceDecomposition {
    /// Total annual portfolio variance under the factor model.
    pub portfolio_variance: f64,
    /// Annualized idiosyncratic variance `Σ wᵢ²·σ²ᵢ`.
    pub idiosyncratic_variance: f64,
    /// Idiosyncratic share of portfolio variance.
    pub idiosyncratic_pct: f64,
    /// Annualized factor variance (industry/subindustry excluded).
    pub factor_variance: f64,
    /// Factor share of portfolio variance.
    pub factor_pct: f64,
    /// Absolute variance per factor.
    pub factor_breakdown_var: Vec<(FactorId, f64)>,
    /// Variance share per factor.
    pub factor_breakdown_pct: Vec<(FactorId, f64)>,
}

/// Industry variance grouped by each holding's industry proxy ETF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryVariance {
    /// Absolute annual variance contribution per proxy.
    pub absolute: Vec<(Ticker, f64)>,
    /// Share of portfolio variance per proxy.
    pub percent_of_portfolio: Vec<(Ticker, f64)>,
    /// Weighted industry beta per proxy:
    /// `Σ wᵢ·βᵢ,industry` over holdings mapped to the proxy.
    pub per_industry_group_beta: Vec<(Ticker, f64)>,
}

impl IndustryVariance {
    /// Largest proxy share of portfolio variance, zero when empty.
    pub fn max_percent(&self) -> f64 {
        self.percent_of_portfolio
            .iter()
            .map(|(_, p)| *p)
            .fold(0.0, f64::max)
    }
}

/// Inputs to the aggregator, assembled upstream.
#[derive(Debug, Clone)]
pub struct ViewInputs<'a> {
    /// Standardized weights in input order.
    pub weights: Vec<(Ticker, f64)>,
    /// Monthly returns panel covering every weighted ticker.
    pub panel: &'a ReturnsPanel,
    /// Per-stock profiles, one per weighted ticker (any order).
    pub profiles: Vec<StockFactorProfile>,
    /// Holding → industry proxy ETF, for industry grouping.
    pub industry_proxy: BTreeMap<Ticker, Ticker>,
    /// Net exposure (positive cash excluded).
    pub net_exposure: f64,
    /// Gross exposure (positive cash excluded).
    pub gross_exposure: f64,
    /// Gross over net; infinite when net is zero.
    pub leverage: f64,
    /// Caller-supplied expected annual returns, if any.
    pub expected_returns: Option<Vec<(Ticker, f64)>>,
}

/// The portfolio view: pure data, no formatting beyond the edge tables.
#[derive(Debug, Clone)]
pub struct PortfolioView {
    /// Weights in input order.
    pub weights: Vec<(Ticker, f64)>,
    /// Ticker order of every matrix axis below.
    pub tickers: Vec<Ticker>,
    /// Allocations table (display only).
    pub allocations: Table,
    /// Pairwise-complete sample covariance of monthly returns.
    pub covariance: Array2<f64>,
    /// Pairwise-complete sample correlation of monthly returns.
    pub correlation: Array2<f64>,
    /// Weighted portfolio returns on months where every holding has an
    /// observation.
    pub portfolio_returns: MonthlySeries,
    /// Monthly portfolio volatility `√(wᵀΣw)`.
    pub volatility_monthly: f64,
    /// Annual portfolio volatility (monthly × √12).
    pub volatility_annual: f64,
    /// Herfindahl concentration index `Σwᵢ²`.
    pub herfindahl: f64,
    /// Per-stock beta matrix, rows = tickers, columns = [`FactorId::ALL`].
    pub stock_betas: Array2<f64>,
    /// Portfolio-level factor betas `β_p,f = Σᵢ wᵢ·βᵢ,f`.
    pub portfolio_factor_betas: Vec<(FactorId, f64)>,
    /// Annual proxy volatility per (stock, factor).
    pub factor_vols_annual: Array2<f64>,
    /// Weighted factor variance `W[i,f] = wᵢ²·βᵢ,f²·σᵢ,f²` (annual).
    pub weighted_factor_var: Array2<f64>,
    /// Factor/idiosyncratic variance split.
    pub variance_decomposition: VarianceDecomposition,
    /// Industry variance attribution.
    pub industry_variance: IndustryVariance,
    /// Holding → industry proxy map the attribution was grouped by.
    pub industry_proxy: BTreeMap<Ticker, Ticker>,
    /// Euler risk contributions `RCᵢ = wᵢ·(Σw)ᵢ/σ_p` (monthly), summing
    /// to the monthly volatility.
    pub risk_contributions: Vec<(Ticker, f64)>,
    /// Per-stock share of sample variance, summing to one.
    pub euler_variance_pct: Vec<(Ticker, f64)>,
    /// Per-asset volatility summary table (display only).
    pub asset_vol_summary: Table,
    /// Net exposure (positive cash excluded).
    pub net_exposure: f64,
    /// Gross exposure (positive cash excluded).
    pub gross_exposure: f64,
    /// Gross over net exposure.
    pub leverage: f64,
    /// Expected annual returns, when supplied.
    pub expected_returns: Option<Vec<(Ticker, f64)>>,
    /// Human-readable warnings raised during the build.
    pub warnings: Vec<String>,
    /// Data-quality flags collected from the per-stock profiles.
    pub data_quality_flags: Vec<DataQualityFlag>,
    /// The per-stock profiles the view was built from.
    pub profiles: Vec<StockFactorProfile>,
}

impl PortfolioView {
    /// Portfolio beta on `factor`.
    pub fn factor_beta(&self, factor: FactorId) -> f64 {
        self.portfolio_factor_betas
            .iter()
            .find(|(f, _)| *f == factor)
            .map_or(0.0, |(_, b)| *b)
    }

    /// Largest absolute position weight.
    pub fn max_abs_weight(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w.abs()).fold(0.0, f64::max)
    }

    /// Weight for `ticker`, zero when absent.
    pub fn weight(&self, ticker: &Ticker) -> f64 {
        self.weights
            .iter()
            .find(|(t, _)| t == ticker)
            .map_or(0.0, |(_, w)| *w)
    }
}

/// Build the portfolio view.
///
/// # Errors
///
/// [`RondaError::Numeric`] when a weighted ticker is missing from the
/// panel or covariance entries are undefined (no overlapping
/// observations), and when a profile is missing for a weighted ticker.
pub fn build_portfolio_view(inputs: ViewInputs<'_>) -> Result<PortfolioView> {
    let ViewInputs {
        weights,
        panel,
        profiles,
        industry_proxy,
        net_exposure,
        gross_exposure,
        leverage,
        expected_returns,
    } = inputs;

    let tickers: Vec<Ticker> = weights.iter().map(|(t, _)| t.clone()).collect();
    let n = tickers.len();
    if n == 0 {
        return Err(RondaError::input("cannot analyze an empty portfolio"));
    }

    // Reorder panel columns to the weight order; missing tickers fail fast.
    let panel_positions: Vec<usize> = tickers
        .iter()
        .map(|t| {
            panel
                .position(t)
                .ok_or_else(|| RondaError::numeric(format!("{t} missing from returns panel")))
        })
        .collect::<Result<_>>()?;

    let mut profile_by_ticker: BTreeMap<&Ticker, &StockFactorProfile> = BTreeMap::new();
    for p in &profiles {
        profile_by_ticker.insert(&p.ticker, p);
    }
    let ordered_profiles: Vec<&StockFactorProfile> = tickers
        .iter()
        .map(|t| {
            profile_by_ticker
                .get(t)
                .copied()
                .ok_or_else(|| RondaError::numeric(format!("no factor profile for {t}")))
        })
        .collect::<Result<_>>()?;

    let w = Array1::from_iter(weights.iter().map(|(_, w)| *w));

    // Covariance and correlation on the panel, reordered to weight order.
    let full_cov = panel.covariance();
    let full_corr = panel.correlation();
    let mut covariance = Array2::zeros((n, n));
    let mut correlation = Array2::zeros((n, n));
    for (i, &pi) in panel_positions.iter().enumerate() {
        for (j, &pj) in panel_positions.iter().enumerate() {
            covariance[(i, j)] = full_cov[(pi, pj)];
            correlation[(i, j)] = full_corr[(pi, pj)];
        }
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(RondaError::numeric(
            "covariance undefined: some holdings share no observation months",
        ));
    }

    // Portfolio volatility: σ_p = √(wᵀ Σ w).
    let sigma_w = covariance.dot(&w);
    let variance_monthly = w.dot(&sigma_w).max(0.0);
    let volatility_monthly = variance_monthly.sqrt();
    let volatility_annual = stats::annualize_vol(volatility_monthly);

    // Portfolio returns on months where every holding has an observation.
    let (complete_dates, complete_matrix) = panel.complete_rows();
    let mut port_dates: Vec<Date> = Vec::with_capacity(complete_dates.len());
    let mut port_values: Vec<f64> = Vec::with_capacity(complete_dates.len());
    for (row_idx, date) in complete_dates.iter().enumerate() {
        let row = complete_matrix.row(row_idx);
        let ret: f64 = panel_positions
            .iter()
            .zip(w.iter())
            .map(|(&p, wi)| row[p] * wi)
            .sum();
        port_dates.push(*date);
        port_values.push(ret);
    }
    let portfolio_returns = MonthlySeries::new(port_dates, port_values)?;

    // Per-stock beta and factor vol matrices in canonical factor order.
    let k = FactorId::ALL.len();
    let mut stock_betas = Array2::zeros((n, k));
    let mut factor_vols_annual = Array2::zeros((n, k));
    for (i, profile) in ordered_profiles.iter().enumerate() {
        for (j, factor) in FactorId::ALL.iter().enumerate() {
            stock_betas[(i, j)] = profile.beta(*factor);
            factor_vols_annual[(i, j)] = profile.factor_vol_annual(*factor);
        }
    }

    // Portfolio factor betas: β_p = Bᵀ w.
    let beta_p = stock_betas.t().dot(&w);
    let portfolio_factor_betas: Vec<(FactorId, f64)> = FactorId::ALL
        .iter()
        .enumerate()
        .map(|(j, f)| (*f, beta_p[j]))
        .collect();

    // Weighted factor variance matrix: W[i,f] = wᵢ²·βᵢ,f²·σᵢ,f² (annual).
    let mut weighted_factor_var = Array2::zeros((n, k));
    for i in 0..n {
        for j in 0..k {
            weighted_factor_var[(i, j)] =
                w[i].powi(2) * stock_betas[(i, j)].powi(2) * factor_vols_annual[(i, j)].powi(2);
        }
    }

    // Idiosyncratic variance: Σ wᵢ²·σ²ᵢ (annual).
    let idiosyncratic_variance: f64 = ordered_profiles
        .iter()
        .enumerate()
        .map(|(i, p)| w[i].powi(2) * p.idio_var_annual())
        .sum();

    // Factor variance excludes the industry and subindustry columns.
    let mut factor_breakdown_var: Vec<(FactorId, f64)> = Vec::new();
    let mut factor_variance = 0.0;
    for (j, factor) in FactorId::ALL.iter().enumerate() {
        if !factor.in_factor_bucket() {
            continue;
        }
        let col_sum: f64 = weighted_factor_var.column(j).sum();
        factor_variance += col_sum;
        factor_breakdown_var.push((*factor, col_sum));
    }
    let portfolio_variance = factor_variance + idiosyncratic_variance;
    let pct = |v: f64| {
        if portfolio_variance > 0.0 {
            v / portfolio_variance
        } else {
            0.0
        }
    };
    let variance_decomposition = VarianceDecomposition {
        portfolio_variance,
        idiosyncratic_variance,
        idiosyncratic_pct: pct(idiosyncratic_variance),
        factor_variance,
        factor_pct: pct(factor_variance),
        factor_breakdown_pct: factor_breakdown_var
            .iter()
            .map(|(f, v)| (*f, pct(*v)))
            .collect(),
        factor_breakdown_var,
    };

    // Industry variance grouped by each holding's industry proxy.
    let industry_col = FactorId::ALL
        .iter()
        .position(|f| *f == FactorId::Industry)
        .expect("industry is a canonical factor");
    let mut absolute: BTreeMap<Ticker, f64> = BTreeMap::new();
    let mut group_beta: BTreeMap<Ticker, f64> = BTreeMap::new();
    for (i, ticker) in tickers.iter().enumerate() {
        let Some(proxy) = industry_proxy.get(ticker) else {
            continue;
        };
        *absolute.entry(proxy.clone()).or_insert(0.0) += weighted_factor_var[(i, industry_col)];
        *group_beta.entry(proxy.clone()).or_insert(0.0) += w[i] * stock_betas[(i, industry_col)];
    }
    let industry_variance = IndustryVariance {
        percent_of_portfolio: absolute.iter().map(|(t, v)| (t.clone(), pct(*v))).collect(),
        absolute: absolute.into_iter().collect(),
        per_industry_group_beta: group_beta.into_iter().collect(),
    };

    // Euler risk contributions on the sample covariance.
    let mut risk_contributions = Vec::with_capacity(n);
    let mut euler_variance_pct = Vec::with_capacity(n);
    for (i, ticker) in tickers.iter().enumerate() {
        let contrib_var = w[i] * sigma_w[i];
        let rc = if volatility_monthly > stats::MIN_DENOMINATOR {
            contrib_var / volatility_monthly
        } else {
            0.0
        };
        let share = if variance_monthly > stats::MIN_DENOMINATOR {
            contrib_var / variance_monthly
        } else {
            0.0
        };
        risk_contributions.push((ticker.clone(), rc));
        euler_variance_pct.push((ticker.clone(), share));
    }

    let herfindahl: f64 = w.iter().map(|wi| wi * wi).sum();

    // Display tables.
    let mut allocations = Table::new(
        "Target Allocations",
        "Ticker",
        &["Portfolio Weight", "Equal Weight", "Eq Diff"],
    );
    let equal = 1.0 / n as f64;
    for (ticker, weight) in &weights {
        allocations.push_row(
            ticker.as_str(),
            vec![
                Value::Num(*weight),
                Value::Num(equal),
                Value::Num(weight - equal),
            ],
        );
    }

    let mut asset_vol_summary = Table::new(
        "Per-Asset Vol & Var",
        "Ticker",
        &["Vol M", "Vol A", "Idio Vol M", "Adj R2"],
    );
    for profile in &ordered_profiles {
        asset_vol_summary.push_row(
            profile.ticker.as_str(),
            vec![
                Value::Num(profile.total_vol_monthly),
                Value::Num(profile.total_vol_annual),
                Value::Num(profile.idio_vol_monthly),
                Value::Num(profile.r2_adj),
            ],
        );
    }

    let mut warnings = Vec::new();
    let mut data_quality_flags = Vec::new();
    for profile in &ordered_profiles {
        for flag in profile.flags() {
            warnings.push(format!("{}: {flag}", profile.ticker));
            data_quality_flags.push(flag.clone());
        }
    }

    Ok(PortfolioView {
        profiles: ordered_profiles.into_iter().cloned().collect(),
        weights,
        tickers,
        allocations,
        covariance,
        correlation,
        portfolio_returns,
        volatility_monthly,
        volatility_annual,
        herfindahl,
        stock_betas,
        portfolio_factor_betas,
        factor_vols_annual,
        weighted_factor_var,
        variance_decomposition,
        industry_variance,
        industry_proxy,
        risk_contributions,
        euler_variance_pct,
        asset_vol_summary,
        net_exposure,
        gross_exposure,
        leverage,
        expected_returns,
        warnings,
        data_quality_flags,
    })
}
