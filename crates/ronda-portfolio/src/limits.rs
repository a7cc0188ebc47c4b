//! Risk limit evaluation.
//!
//! Out-of-limit portfolios are never errors here: every check lands in a
//! table row with its actual value, its limit and a pass flag. A missing
//! sub-limit skips the corresponding check entirely.

use ronda_traits::table::{Table, Value};
use ronda_traits::types::{FactorId, RiskLimits, Ticker};

use crate::view::PortfolioView;
use crate::worst_case::WorstCaseAnalysis;

/// Prefix of per-industry-proxy rows in the beta checks table.
pub const INDUSTRY_PROXY_PREFIX: &str = "industry_proxy::";

/// Evaluate portfolio metrics against the configured limits.
///
/// One row per check: Volatility, Max Weight, Factor Var %, Market Var %,
/// Max Industry Var %. Checks without a configured limit are skipped.
pub fn evaluate_risk_limits(view: &PortfolioView, limits: &RiskLimits) -> Table {
    let mut table = Table::new("Risk Checks", "Metric", &["Actual", "Limit", "Pass"]);
    let mut push = |metric: &str, actual: f64, limit: Option<f64>| {
        if let Some(limit) = limit {
            table.push_row(
                metric,
                vec![
                    Value::Num(actual),
                    Value::Num(limit),
                    Value::Bool(actual <= limit),
                ],
            );
        }
    };

    push(
        "Volatility",
        view.volatility_annual,
        limits.portfolio_limits.max_volatility,
    );
    push(
        "Max Weight",
        view.max_abs_weight(),
        limits.concentration_limits.max_single_stock_weight,
    );

    let vd = &view.variance_decomposition;
    push(
        "Factor Var %",
        vd.factor_pct,
        limits.variance_limits.max_factor_contribution,
    );
    let market_pct = vd
        .factor_breakdown_pct
        .iter()
        .find(|(f, _)| *f == FactorId::Market)
        .map_or(0.0, |(_, p)| *p);
    push(
        "Market Var %",
        market_pct,
        limits.variance_limits.max_market_contribution,
    );
    push(
        "Max Industry Var %",
        view.industry_variance.max_percent(),
        limits.variance_limits.max_industry_contribution,
    );

    table
}

/// Compare each factor's portfolio beta to the allowable max beta, plus
/// per-proxy checks for individual industry ETFs.
///
/// When per-proxy data is supplied the aggregate `industry` row is
/// skipped to avoid double counting.
pub fn evaluate_beta_limits(
    portfolio_betas: &[(FactorId, f64)],
    worst_case: &WorstCaseAnalysis,
    proxy_betas: Option<&[(Ticker, f64)]>,
) -> Table {
    let mut table = Table::new(
        "Beta Checks",
        "Factor",
        &["Portfolio Beta", "Max Allowed Beta", "Pass", "Buffer"],
    );

    let skip_industry = proxy_betas.is_some_and(|p| !p.is_empty());

    for (factor, max_beta) in &worst_case.max_betas {
        if skip_industry && *factor == FactorId::Industry {
            continue;
        }
        let actual = portfolio_betas
            .iter()
            .find(|(f, _)| f == factor)
            .map_or(0.0, |(_, b)| *b);
        table.push_row(
            factor.as_str(),
            vec![
                Value::Num(actual),
                Value::Num(*max_beta),
                Value::Bool(actual.abs() <= *max_beta),
                Value::Num(max_beta - actual.abs()),
            ],
        );
    }

    if let Some(proxy_betas) = proxy_betas {
        for (proxy, actual) in proxy_betas {
            let max_beta = worst_case
                .max_betas_by_proxy
                .iter()
                .find(|(t, _)| t == proxy)
                .map_or(f64::INFINITY, |(_, b)| *b);
            table.push_row(
                format!("{INDUSTRY_PROXY_PREFIX}{proxy}"),
                vec![
                    Value::Num(*actual),
                    Value::Num(max_beta),
                    Value::Bool(actual.abs() <= max_beta),
                    Value::Num(max_beta - actual.abs()),
                ],
            );
        }
    }

    table
}

/// Whether every check in a limits table passed.
pub fn all_pass(table: &Table) -> bool {
    table
        .iter_rows()
        .all(|(_, row)| row.iter().all(|v| v.as_bool() != Some(false)))
}
