//! Worst-case beta engine.
//!
//! Scans historical monthly losses per factor proxy and derives the
//! maximum allowable absolute beta per factor and per industry proxy
//! given a loss tolerance: `max_β = |max_loss / worst_monthly_return|`.
//! Deterministic given the same return series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ronda_traits::types::{DateWindow, FactorId, MonthlySeries, Ticker};

/// Inputs to the worst-case scan, assembled over the lookback window.
#[derive(Debug, Clone)]
pub struct WorstCaseInputs {
    /// Unique factor proxies with the factor roles they serve and their
    /// monthly returns over the lookback window.
    pub proxy_returns: Vec<(Ticker, Vec<FactorId>, MonthlySeries)>,
    /// Subindustry peer-median series, labeled by the stock they belong
    /// to.
    pub subindustry_medians: Vec<(Ticker, MonthlySeries)>,
    /// The aggregated interest-rate factor series, when rate factors are
    /// in play.
    pub rate_factor: Option<MonthlySeries>,
    /// The historical window scanned.
    pub window: DateWindow,
}

/// Worst-case scan output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstCaseAnalysis {
    /// Worst single-month return per proxy.
    pub worst_per_proxy: Vec<(Ticker, f64)>,
    /// Worst single-month return per factor type, with the proxy that
    /// produced it.
    pub worst_by_factor: Vec<(FactorId, (String, f64))>,
    /// Maximum allowable absolute beta per factor.
    pub max_betas: Vec<(FactorId, f64)>,
    /// Maximum allowable absolute beta per industry proxy.
    pub max_betas_by_proxy: Vec<(Ticker, f64)>,
    /// The historical window scanned.
    pub analysis_period: DateWindow,
    /// The loss tolerance the caps were derived from (negative).
    pub max_loss: f64,
}

impl WorstCaseAnalysis {
    /// Max allowable beta for `factor`; infinite when unconstrained.
    pub fn max_beta(&self, factor: FactorId) -> f64 {
        self.max_betas
            .iter()
            .find(|(f, _)| *f == factor)
            .map_or(f64::INFINITY, |(_, b)| *b)
    }

    /// Worst month for `factor`, if scanned.
    pub fn worst_month(&self, factor: FactorId) -> Option<f64> {
        self.worst_by_factor
            .iter()
            .find(|(f, _)| *f == factor)
            .map(|(_, (_, w))| *w)
    }
}

fn beta_cap(max_loss: f64, worst: f64) -> f64 {
    // A non-negative worst month cannot bind the exposure.
    if worst < 0.0 {
        (max_loss / worst).abs()
    } else {
        f64::INFINITY
    }
}

/// Derive max allowable betas from historical worst months.
///
/// `max_loss` is the user's loss tolerance as a negative decimal (e.g.
/// `-0.10` for a 10% tolerable single-month loss).
pub fn calc_max_factor_betas(inputs: &WorstCaseInputs, max_loss: f64) -> WorstCaseAnalysis {
    let mut worst_per_proxy: Vec<(Ticker, f64)> = Vec::new();
    let mut worst_by_factor: BTreeMap<FactorId, (String, f64)> = BTreeMap::new();
    let mut max_betas_by_proxy: Vec<(Ticker, f64)> = Vec::new();

    for (proxy, roles, returns) in &inputs.proxy_returns {
        let Some(worst) = returns.restrict(&inputs.window).worst() else {
            continue;
        };
        worst_per_proxy.push((proxy.clone(), worst));
        for role in roles {
            let entry = worst_by_factor
                .entry(*role)
                .or_insert_with(|| (proxy.to_string(), worst));
            if worst < entry.1 {
                *entry = (proxy.to_string(), worst);
            }
        }
        if roles.contains(&FactorId::Industry) {
            max_betas_by_proxy.push((proxy.clone(), beta_cap(max_loss, worst)));
        }
    }

    for (stock, median) in &inputs.subindustry_medians {
        let Some(worst) = median.restrict(&inputs.window).worst() else {
            continue;
        };
        let label = format!("subindustry::{stock}");
        let entry = worst_by_factor
            .entry(FactorId::Subindustry)
            .or_insert_with(|| (label.clone(), worst));
        if worst < entry.1 {
            *entry = (label, worst);
        }
    }

    if let Some(rate) = &inputs.rate_factor
        && let Some(worst) = rate.restrict(&inputs.window).worst()
    {
        worst_by_factor.insert(FactorId::InterestRate, ("interest_rate".to_string(), worst));
    }

    let max_betas: Vec<(FactorId, f64)> = worst_by_factor
        .iter()
        .map(|(factor, (_, worst))| (*factor, beta_cap(max_loss, *worst)))
        .collect();

    WorstCaseAnalysis {
        worst_per_proxy,
        worst_by_factor: worst_by_factor.into_iter().collect(),
        max_betas,
        max_betas_by_proxy,
        analysis_period: inputs.window,
        max_loss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ronda_traits::types::Date;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(d(2015, 1, 31), d(2024, 12, 31)).unwrap()
    }

    fn series(values: &[f64]) -> MonthlySeries {
        let dates: Vec<Date> = (0..values.len())
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
            .collect();
        MonthlySeries::new(dates, values.to_vec()).unwrap()
    }

    #[test]
    fn test_max_beta_from_worst_month() {
        let inputs = WorstCaseInputs {
            proxy_returns: vec![(
                Ticker::new("SPY"),
                vec![FactorId::Market],
                series(&[0.02, -0.15, 0.05, -0.03]),
            )],
            subindustry_medians: Vec::new(),
            rate_factor: None,
            window: window(),
        };
        let out = calc_max_factor_betas(&inputs, -0.10);
        assert_relative_eq!(out.max_beta(FactorId::Market), 0.1 / 0.15, epsilon = 1e-6);
        assert_relative_eq!(out.worst_month(FactorId::Market).unwrap(), -0.15);
    }

    #[test]
    fn test_worst_proxy_wins_per_factor() {
        let inputs = WorstCaseInputs {
            proxy_returns: vec![
                (
                    Ticker::new("XLK"),
                    vec![FactorId::Industry],
                    series(&[-0.08, 0.02]),
                ),
                (
                    Ticker::new("KCE"),
                    vec![FactorId::Industry],
                    series(&[-0.20, 0.01]),
                ),
            ],
            subindustry_medians: Vec::new(),
            rate_factor: None,
            window: window(),
        };
        let out = calc_max_factor_betas(&inputs, -0.10);
        let (_, (proxy, worst)) = out
            .worst_by_factor
            .iter()
            .find(|(f, _)| *f == FactorId::Industry)
            .unwrap();
        assert_eq!(proxy, "KCE");
        assert_relative_eq!(*worst, -0.20);
        // Per-proxy caps keep their own worst months.
        assert_eq!(out.max_betas_by_proxy.len(), 2);
        let xlk = out
            .max_betas_by_proxy
            .iter()
            .find(|(t, _)| t == &Ticker::new("XLK"))
            .unwrap();
        assert_relative_eq!(xlk.1, 0.10 / 0.08, epsilon = 1e-9);
    }

    #[test]
    fn test_non_negative_worst_is_unconstrained() {
        let inputs = WorstCaseInputs {
            proxy_returns: vec![(
                Ticker::new("SPY"),
                vec![FactorId::Market],
                series(&[0.01, 0.02]),
            )],
            subindustry_medians: Vec::new(),
            rate_factor: None,
            window: window(),
        };
        let out = calc_max_factor_betas(&inputs, -0.10);
        assert!(out.max_beta(FactorId::Market).is_infinite());
    }

    #[test]
    fn test_deterministic() {
        let inputs = WorstCaseInputs {
            proxy_returns: vec![(
                Ticker::new("SPY"),
                vec![FactorId::Market, FactorId::Momentum],
                series(&[0.02, -0.12, 0.01]),
            )],
            subindustry_medians: vec![(Ticker::new("AAPL"), series(&[-0.09, 0.04]))],
            rate_factor: Some(series(&[-0.004, 0.002])),
            window: window(),
        };
        let a = calc_max_factor_betas(&inputs, -0.10);
        let b = calc_max_factor_betas(&inputs, -0.10);
        assert_eq!(a, b);
        assert!(a.worst_month(FactorId::Subindustry).is_some());
        assert!(a.worst_month(FactorId::InterestRate).is_some());
    }
}
