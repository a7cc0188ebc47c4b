//! Holdings standardization and exposure arithmetic.
//!
//! Converts shares/dollars/weight holdings into a canonical weight vector
//! and computes net/gross exposure and leverage. Positive cash-proxy
//! positions are excluded from exposure; negative cash positions are
//! margin debt and stay in.

use std::collections::{BTreeMap, BTreeSet};

use ronda_traits::error::{Result, RondaError};
use ronda_traits::types::{Holding, Holdings, Ticker};

/// A holdings document reduced to canonical weights plus exposure metrics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StandardizedPortfolio {
    /// Weights in input order (normalized to gross when enabled).
    pub weights: Vec<(Ticker, f64)>,
    /// Dollar exposure per position (shares/dollars inputs only).
    pub dollar_exposure: Option<Vec<(Ticker, f64)>>,
    /// Total portfolio value (shares/dollars inputs only).
    pub total_value: Option<f64>,
    /// Sum of risky weights (positive cash excluded).
    pub net_exposure: f64,
    /// Sum of absolute risky weights.
    pub gross_exposure: f64,
    /// `gross / net`; infinite when net exposure is zero.
    pub leverage: f64,
}

impl StandardizedPortfolio {
    /// Weight for `ticker`, zero when absent.
    pub fn weight(&self, ticker: &Ticker) -> f64 {
        self.weights
            .iter()
            .find(|(t, _)| t == ticker)
            .map_or(0.0, |(_, w)| *w)
    }
}

/// Normalize weights to gross exposure (`Σ|w| = 1`) when `normalize` is
/// true; otherwise return them unchanged. Long positions stay long and
/// short positions stay short.
///
/// # Errors
///
/// Returns [`RondaError::InputInvalid`] when the absolute weights sum to
/// zero and normalization is requested.
pub fn normalize_weights(weights: &[(Ticker, f64)], normalize: bool) -> Result<Vec<(Ticker, f64)>> {
    if !normalize {
        return Ok(weights.to_vec());
    }
    let total: f64 = weights.iter().map(|(_, w)| w.abs()).sum();
    if total == 0.0 {
        return Err(RondaError::input(
            "sum of absolute weights is zero, cannot normalize",
        ));
    }
    Ok(weights.iter().map(|(t, w)| (t.clone(), w / total)).collect())
}

/// Net and gross exposure plus leverage for a weight vector.
///
/// Positive cash positions are excluded; negative cash is margin debt
/// and stays in. Leverage is infinite at zero net exposure.
pub fn weight_exposures(weights: &[(Ticker, f64)], cash: &BTreeSet<Ticker>) -> (f64, f64, f64) {
    let risky: Vec<f64> = weights
        .iter()
        .filter(|(t, w)| !cash.contains(t) || *w < 0.0)
        .map(|(_, w)| *w)
        .collect();
    let net: f64 = risky.iter().sum();
    let gross: f64 = risky.iter().map(|w| w.abs()).sum();
    let leverage = if net == 0.0 { f64::INFINITY } else { gross / net };
    (net, gross, leverage)
}

/// Standardize a holdings document into weights using shares, dollar
/// values, or direct weights.
///
/// Weight-form and value-form positions cannot be mixed in one document.
/// `latest_prices` must cover every shares-form ticker. Exposure metrics
/// are computed from the raw weights before gross normalization.
///
/// # Errors
///
/// [`RondaError::InputInvalid`] on mixed forms or an empty document;
/// [`RondaError::DataUnavailable`] on a missing price for a shares-form
/// position.
pub fn standardize_portfolio(
    holdings: &Holdings,
    latest_prices: &BTreeMap<Ticker, f64>,
    cash: &BTreeSet<Ticker>,
    normalize: bool,
) -> Result<StandardizedPortfolio> {
    if holdings.is_empty() {
        return Err(RondaError::input("holdings document is empty"));
    }

    let all_weights = holdings
        .iter()
        .all(|(_, h)| matches!(h, Holding::Weight(_)));
    let any_weights = holdings
        .iter()
        .any(|(_, h)| matches!(h, Holding::Weight(_)));
    if any_weights && !all_weights {
        return Err(RondaError::input(
            "holdings mix direct weights with shares/dollars positions",
        ));
    }

    if all_weights {
        let raw: Vec<(Ticker, f64)> = holdings
            .iter()
            .filter_map(|(t, h)| match h {
                Holding::Weight(w) => Some((t.clone(), *w)),
                _ => None,
            })
            .collect();
        let (net, gross, leverage) = weight_exposures(&raw, cash);
        return Ok(StandardizedPortfolio {
            weights: normalize_weights(&raw, normalize)?,
            dollar_exposure: None,
            total_value: None,
            net_exposure: net,
            gross_exposure: gross,
            leverage,
        });
    }

    let mut dollar_exposure = Vec::with_capacity(holdings.len());
    for (ticker, holding) in holdings.iter() {
        let dollars = match holding {
            Holding::Dollars(v) => *v,
            Holding::Shares(n) => {
                let price = latest_prices.get(ticker).copied().ok_or_else(|| {
                    RondaError::DataUnavailable(format!(
                        "no price available to convert {ticker} shares to dollars"
                    ))
                })?;
                n * price
            }
            // Weight-form entries were rejected above.
            Holding::Weight(_) => continue,
        };
        dollar_exposure.push((ticker.clone(), dollars));
    }

    let total_value: f64 = dollar_exposure.iter().map(|(_, v)| v).sum();
    if total_value == 0.0 {
        return Err(RondaError::input(
            "total portfolio value is zero, cannot derive weights",
        ));
    }
    let raw: Vec<(Ticker, f64)> = dollar_exposure
        .iter()
        .map(|(t, v)| (t.clone(), v / total_value))
        .collect();
    let (net, gross, leverage) = weight_exposures(&raw, cash);

    Ok(StandardizedPortfolio {
        weights: normalize_weights(&raw, normalize)?,
        dollar_exposure: Some(dollar_exposure),
        total_value: Some(total_value),
        net_exposure: net,
        gross_exposure: gross,
        leverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cash_set() -> BTreeSet<Ticker> {
        [Ticker::new("SGOV")].into_iter().collect()
    }

    #[test]
    fn test_weights_path_exposures_exclude_positive_cash() {
        let holdings = Holdings::from_weights([("AAPL", 0.6), ("SGOV", 0.4)]).unwrap();
        let out =
            standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), false).unwrap();
        assert_relative_eq!(out.net_exposure, 0.6, epsilon = 1e-12);
        assert_relative_eq!(out.gross_exposure, 0.6, epsilon = 1e-12);
        assert_relative_eq!(out.weight(&Ticker::new("SGOV")), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_cash_is_margin_debt() {
        let holdings = Holdings::from_weights([("AAPL", 1.2), ("SGOV", -0.2)]).unwrap();
        let out =
            standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), false).unwrap();
        assert_relative_eq!(out.net_exposure, 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.gross_exposure, 1.4, epsilon = 1e-12);
        assert_relative_eq!(out.leverage, 1.4, epsilon = 1e-12);
    }

    #[test]
    fn test_normalization_to_gross() {
        let holdings = Holdings::from_weights([("AAPL", 1.0), ("MSFT", -1.0)]).unwrap();
        let out = standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), true).unwrap();
        let sum_abs: f64 = out.weights.iter().map(|(_, w)| w.abs()).sum();
        assert_relative_eq!(sum_abs, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out.weight(&Ticker::new("AAPL")), 0.5, epsilon = 1e-12);
        assert_relative_eq!(out.weight(&Ticker::new("MSFT")), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_shares_and_dollars_path() {
        let mut holdings = Holdings::new();
        holdings
            .insert(Ticker::new("AAPL"), Holding::Shares(10.0))
            .unwrap();
        holdings
            .insert(Ticker::new("MSFT"), Holding::Dollars(1000.0))
            .unwrap();
        let prices = [(Ticker::new("AAPL"), 100.0)].into_iter().collect();
        let out = standardize_portfolio(&holdings, &prices, &cash_set(), false).unwrap();
        assert_eq!(out.total_value, Some(2000.0));
        assert_relative_eq!(out.weight(&Ticker::new("AAPL")), 0.5, epsilon = 1e-12);
        assert_relative_eq!(out.weight(&Ticker::new("MSFT")), 0.5, epsilon = 1e-12);
        assert!(out.dollar_exposure.is_some());
    }

    #[test]
    fn test_missing_price_for_shares_fails() {
        let mut holdings = Holdings::new();
        holdings
            .insert(Ticker::new("AAPL"), Holding::Shares(10.0))
            .unwrap();
        let err =
            standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), false).unwrap_err();
        assert!(matches!(err, RondaError::DataUnavailable(_)));
    }

    #[test]
    fn test_mixed_forms_rejected() {
        let mut holdings = Holdings::new();
        holdings
            .insert(Ticker::new("AAPL"), Holding::Weight(0.5))
            .unwrap();
        holdings
            .insert(Ticker::new("MSFT"), Holding::Dollars(100.0))
            .unwrap();
        let err =
            standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), false).unwrap_err();
        assert!(matches!(err, RondaError::InputInvalid(_)));
    }

    #[test]
    fn test_fully_short_book() {
        let holdings = Holdings::from_weights([("AAPL", -0.5), ("MSFT", -0.5)]).unwrap();
        let out = standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), false).unwrap();
        assert_relative_eq!(out.net_exposure, -1.0, epsilon = 1e-12);
        assert_relative_eq!(out.gross_exposure, 1.0, epsilon = 1e-12);
        assert!(out.leverage < 0.0);
    }

    #[test]
    fn test_zero_weights_cannot_normalize() {
        let holdings = Holdings::from_weights([("AAPL", 0.0)]).unwrap();
        let err = standardize_portfolio(&holdings, &BTreeMap::new(), &cash_set(), true).unwrap_err();
        assert!(matches!(err, RondaError::InputInvalid(_)));
    }
}
