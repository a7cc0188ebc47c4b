//! Common types used throughout the Ronda engine.
//!
//! This module defines the core data types for portfolio risk analysis:
//! tickers, date windows, month-end series, holdings, factor proxy bundles,
//! and risk limit documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RondaError};
use crate::stats;

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A market symbol identifier.
///
/// Tickers are normalized to uppercase at construction and treated as
/// opaque identifiers everywhere downstream.
///
/// # Example
///
/// ```
/// use ronda_traits::Ticker;
///
/// let t = Ticker::new(" aapl ");
/// assert_eq!(t.as_str(), "AAPL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Create a ticker, trimming whitespace and uppercasing.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    /// The canonical uppercase symbol.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Ticker {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// An inclusive calendar date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First date of the window (inclusive).
    pub start: Date,
    /// Last date of the window (inclusive).
    pub end: Date,
}

impl DateWindow {
    /// Create a window, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InputInvalid`] when the window is negative.
    pub fn new(start: Date, end: Date) -> Result<Self> {
        if start > end {
            return Err(RondaError::input(format!(
                "negative date window: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Provenance of a price series.
///
/// Consumed by logging and data-quality flags only, never by the math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Dividend-adjusted total return prices (preferred).
    TotalReturn,
    /// Close-only prices (fallback when adjusted data is unavailable).
    PriceOnly,
}

impl Provenance {
    /// Stable string form, used as the cache column name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::PriceOnly => "price_only",
        }
    }
}

/// A dense month-end series: strictly ascending unique dates with one
/// finite value per date. Missing months are simply absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlySeries {
    dates: Vec<Date>,
    values: Vec<f64>,
}

impl MonthlySeries {
    /// Build a series from parallel date/value vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::Numeric`] on length mismatch, non-ascending
    /// dates, or non-finite values.
    pub fn new(dates: Vec<Date>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(RondaError::numeric(format!(
                "series length mismatch: {} dates vs {} values",
                dates.len(),
                values.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RondaError::numeric(
                "series dates must be strictly ascending".to_string(),
            ));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(RondaError::numeric(format!("non-finite series value {v}")));
        }
        Ok(Self { dates, values })
    }

    /// The empty series.
    pub const fn empty() -> Self {
        Self {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Observation dates, ascending.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Observation values, parallel to [`Self::dates`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First observation date, if any.
    pub fn first_date(&self) -> Option<Date> {
        self.dates.first().copied()
    }

    /// Last observation date, if any.
    pub fn last_date(&self) -> Option<Date> {
        self.dates.last().copied()
    }

    /// Last observation value, if any.
    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value at `date`, if observed.
    pub fn get(&self, date: Date) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    /// Observations falling inside `window`.
    pub fn restrict(&self, window: &DateWindow) -> Self {
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (d, v) in self.dates.iter().zip(&self.values) {
            if window.contains(*d) {
                dates.push(*d);
                values.push(*v);
            }
        }
        Self { dates, values }
    }

    /// Monthly simple returns `r_t = p_t / p_{t-1} - 1`.
    ///
    /// The result starts at the second observation.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InsufficientData`] below `min_obs` (or 2)
    /// price observations, and [`RondaError::Numeric`] on a non-positive
    /// base price.
    pub fn simple_returns(&self, min_obs: usize) -> Result<Self> {
        let required = min_obs.max(2);
        if self.len() < required {
            return Err(RondaError::InsufficientData(format!(
                "{} price observations, {required} required for returns",
                self.len()
            )));
        }
        let mut dates = Vec::with_capacity(self.len() - 1);
        let mut values = Vec::with_capacity(self.len() - 1);
        for i in 1..self.len() {
            let prev = self.values[i - 1];
            if prev <= 0.0 {
                return Err(RondaError::numeric(format!(
                    "non-positive price {prev} at {}",
                    self.dates[i - 1]
                )));
            }
            dates.push(self.dates[i]);
            values.push(self.values[i] / prev - 1.0);
        }
        Ok(Self { dates, values })
    }

    /// First differences of consecutive observations, indexed at the later
    /// date. Used for yield-level changes.
    pub fn first_differences(&self) -> Self {
        if self.len() < 2 {
            return Self::empty();
        }
        let dates = self.dates[1..].to_vec();
        let values = self
            .values
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect::<Vec<_>>();
        Self { dates, values }
    }

    /// Multiply every value by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| v * k).collect(),
        }
    }

    /// Arithmetic mean of the values (NaN when empty).
    pub fn mean(&self) -> f64 {
        stats::mean(&self.values)
    }

    /// Sample standard deviation of the values.
    pub fn vol(&self) -> f64 {
        stats::sample_std(&self.values)
    }

    /// Annualized sample standard deviation (monthly × √12).
    pub fn annual_vol(&self) -> f64 {
        stats::annualize_vol(self.vol())
    }

    /// Smallest observed value, if any.
    pub fn worst(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }
}

/// Intersect several series on their common dates.
///
/// Returns the shared ascending dates plus one aligned value vector per
/// input series.
pub fn align(series: &[&MonthlySeries]) -> (Vec<Date>, Vec<Vec<f64>>) {
    let Some(first) = series.first() else {
        return (Vec::new(), Vec::new());
    };
    let common: Vec<Date> = first
        .dates()
        .iter()
        .copied()
        .filter(|d| series[1..].iter().all(|s| s.get(*d).is_some()))
        .collect();
    let aligned = series
        .iter()
        .map(|s| {
            common
                .iter()
                .map(|d| s.get(*d).expect("date is common to all series"))
                .collect()
        })
        .collect();
    (common, aligned)
}

/// A month-end price series with its provenance tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// The symbol the prices belong to.
    pub ticker: Ticker,
    /// Whether the series is total-return or close-only.
    pub provenance: Provenance,
    /// The month-end price observations.
    pub series: MonthlySeries,
}

/// A single position, expressed in exactly one of the three supported
/// forms. Ambiguous inputs are unrepresentable by construction; document
/// parsers reject them before this type is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holding {
    /// Share count; converted to dollars via the latest month-end price.
    Shares(f64),
    /// Dollar value of the position.
    Dollars(f64),
    /// Direct portfolio weight (decimal).
    Weight(f64),
}

/// An ordered set of positions, one per ticker.
///
/// Input order is preserved and drives the ordering of every derived
/// output (allocations, covariance index, beta matrix rows).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    entries: Vec<(Ticker, Holding)>,
}

impl Holdings {
    /// An empty holdings set.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a position.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InputInvalid`] on a duplicate ticker.
    pub fn insert(&mut self, ticker: Ticker, holding: Holding) -> Result<()> {
        if self.entries.iter().any(|(t, _)| *t == ticker) {
            return Err(RondaError::input(format!(
                "duplicate ticker {ticker} in holdings"
            )));
        }
        self.entries.push((ticker, holding));
        Ok(())
    }

    /// Build a weight-form holdings set from `(ticker, weight)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`RondaError::InputInvalid`] on duplicate tickers.
    pub fn from_weights<I, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, f64)>,
        T: Into<Ticker>,
    {
        let mut holdings = Self::new();
        for (ticker, w) in pairs {
            holdings.insert(ticker.into(), Holding::Weight(w))?;
        }
        Ok(holdings)
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no positions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate positions in input order.
    pub fn iter(&self) -> impl Iterator<Item = &(Ticker, Holding)> {
        self.entries.iter()
    }

    /// Tickers in input order.
    pub fn tickers(&self) -> Vec<Ticker> {
        self.entries.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Position for `ticker`, if present.
    pub fn get(&self, ticker: &Ticker) -> Option<&Holding> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, h)| h)
    }
}

/// Identifier of a factor column in the risk model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorId {
    /// Broad market proxy (e.g. SPY).
    Market,
    /// Momentum style proxy.
    Momentum,
    /// Value style proxy.
    Value,
    /// Industry ETF proxy.
    Industry,
    /// Cross-sectional median of subindustry peers.
    Subindustry,
    /// Aggregated key-rate Treasury exposure.
    InterestRate,
}

impl FactorId {
    /// Canonical column order of the beta matrix.
    pub const ALL: [Self; 6] = [
        Self::Market,
        Self::Momentum,
        Self::Value,
        Self::Industry,
        Self::Subindustry,
        Self::InterestRate,
    ];

    /// Stable string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Momentum => "momentum",
            Self::Value => "value",
            Self::Industry => "industry",
            Self::Subindustry => "subindustry",
            Self::InterestRate => "interest_rate",
        }
    }

    /// Whether the factor belongs to the factor-variance bucket.
    ///
    /// Industry and subindustry are reported separately in the variance
    /// decomposition to avoid double counting.
    pub const fn in_factor_bucket(&self) -> bool {
        !matches!(self, Self::Industry | Self::Subindustry)
    }
}

impl fmt::Display for FactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The factor proxy bundle for one ticker.
///
/// Any style proxy may be absent; the corresponding beta is simply not
/// estimated. Rate factors are attached when `asset_class` is in the
/// configured eligible set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorProxies {
    /// Market proxy ticker.
    #[serde(default)]
    pub market: Option<Ticker>,
    /// Momentum proxy ticker.
    #[serde(default)]
    pub momentum: Option<Ticker>,
    /// Value proxy ticker.
    #[serde(default)]
    pub value: Option<Ticker>,
    /// Industry ETF proxy ticker.
    #[serde(default)]
    pub industry: Option<Ticker>,
    /// Subindustry peer tickers (median return forms the factor).
    #[serde(default)]
    pub subindustry: Vec<Ticker>,
    /// Asset class used to gate key-rate factor injection.
    #[serde(default)]
    pub asset_class: Option<String>,
}

impl FactorProxies {
    /// The single-proxy factor ticker for `factor`, if configured.
    ///
    /// Subindustry and interest-rate factors are not single proxies and
    /// always return `None` here.
    pub fn style_proxy(&self, factor: FactorId) -> Option<&Ticker> {
        match factor {
            FactorId::Market => self.market.as_ref(),
            FactorId::Momentum => self.momentum.as_ref(),
            FactorId::Value => self.value.as_ref(),
            FactorId::Industry => self.industry.as_ref(),
            FactorId::Subindustry | FactorId::InterestRate => None,
        }
    }

    /// Every proxy ticker referenced by the bundle, peers included.
    pub fn proxy_tickers(&self) -> Vec<&Ticker> {
        let mut out = Vec::new();
        for factor in [
            FactorId::Market,
            FactorId::Momentum,
            FactorId::Value,
            FactorId::Industry,
        ] {
            if let Some(t) = self.style_proxy(factor) {
                out.push(t);
            }
        }
        out.extend(self.subindustry.iter());
        out
    }
}

/// Map from ticker to its factor proxy bundle.
pub type ProxyMap = BTreeMap<Ticker, FactorProxies>;

/// Portfolio-level limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLimits {
    /// Maximum annual portfolio volatility.
    #[serde(default)]
    pub max_volatility: Option<f64>,
    /// Loss tolerance (negative decimal), consumed by the worst-case
    /// beta engine.
    #[serde(default)]
    pub max_loss: Option<f64>,
}

/// Concentration limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationLimits {
    /// Maximum absolute weight of a single position.
    #[serde(default)]
    pub max_single_stock_weight: Option<f64>,
}

/// Variance-share limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VarianceLimits {
    /// Maximum factor share of portfolio variance.
    #[serde(default)]
    pub max_factor_contribution: Option<f64>,
    /// Maximum market-factor share of portfolio variance.
    #[serde(default)]
    pub max_market_contribution: Option<f64>,
    /// Maximum single-industry share of portfolio variance.
    #[serde(default)]
    pub max_industry_contribution: Option<f64>,
}

/// The hierarchical risk limit document.
///
/// Every sub-limit is optional; a missing limit skips the corresponding
/// check rather than failing evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Portfolio-level limits.
    #[serde(default)]
    pub portfolio_limits: PortfolioLimits,
    /// Concentration limits.
    #[serde(default)]
    pub concentration_limits: ConcentrationLimits,
    /// Variance-share limits.
    #[serde(default)]
    pub variance_limits: VarianceLimits,
    /// Loss tolerance used to derive per-factor beta caps (negative).
    #[serde(default)]
    pub max_single_factor_loss: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ticker_uppercase_at_boundary() {
        assert_eq!(Ticker::new("aapl").as_str(), "AAPL");
        assert_eq!(Ticker::from(" spy "), Ticker::new("SPY"));
        let t: Ticker = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(t.as_str(), "MSFT");
    }

    #[test]
    fn test_date_window_rejects_negative() {
        assert!(DateWindow::new(d(2024, 1, 31), d(2020, 1, 31)).is_err());
        let w = DateWindow::new(d(2020, 1, 31), d(2023, 12, 31)).unwrap();
        assert!(w.contains(d(2021, 6, 30)));
        assert!(!w.contains(d(2024, 1, 31)));
    }

    #[test]
    fn test_series_invariants() {
        let ok = MonthlySeries::new(vec![d(2020, 1, 31), d(2020, 2, 29)], vec![100.0, 101.0]);
        assert!(ok.is_ok());

        let bad_order =
            MonthlySeries::new(vec![d(2020, 2, 29), d(2020, 1, 31)], vec![1.0, 2.0]);
        assert!(bad_order.is_err());

        let bad_value = MonthlySeries::new(vec![d(2020, 1, 31)], vec![f64::NAN]);
        assert!(bad_value.is_err());
    }

    #[test]
    fn test_simple_returns() {
        let prices = MonthlySeries::new(
            vec![d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)],
            vec![100.0, 110.0, 99.0],
        )
        .unwrap();
        let rets = prices.simple_returns(2).unwrap();
        assert_eq!(rets.len(), 2);
        assert_eq!(rets.dates()[0], d(2020, 2, 29));
        assert_relative_eq!(rets.values()[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(rets.values()[1], -0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_simple_returns_insufficient() {
        let prices = MonthlySeries::new(vec![d(2020, 1, 31)], vec![100.0]).unwrap();
        assert!(matches!(
            prices.simple_returns(2),
            Err(RondaError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_first_differences() {
        let yields = MonthlySeries::new(
            vec![d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)],
            vec![1.50, 1.25, 0.75],
        )
        .unwrap();
        let diffs = yields.first_differences();
        assert_eq!(diffs.len(), 2);
        assert_relative_eq!(diffs.values()[0], -0.25, epsilon = 1e-12);
        assert_relative_eq!(diffs.values()[1], -0.50, epsilon = 1e-12);
    }

    #[test]
    fn test_align_intersects_dates() {
        let a = MonthlySeries::new(
            vec![d(2020, 1, 31), d(2020, 2, 29), d(2020, 3, 31)],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        let b = MonthlySeries::new(vec![d(2020, 2, 29), d(2020, 3, 31)], vec![20.0, 30.0]).unwrap();
        let (dates, cols) = align(&[&a, &b]);
        assert_eq!(dates, vec![d(2020, 2, 29), d(2020, 3, 31)]);
        assert_eq!(cols[0], vec![2.0, 3.0]);
        assert_eq!(cols[1], vec![20.0, 30.0]);
    }

    #[test]
    fn test_holdings_rejects_duplicates() {
        let mut h = Holdings::new();
        h.insert(Ticker::new("AAPL"), Holding::Weight(0.5)).unwrap();
        assert!(h.insert(Ticker::new("aapl"), Holding::Shares(10.0)).is_err());
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_holdings_preserve_input_order() {
        let h = Holdings::from_weights([("MSFT", 0.5), ("AAPL", 0.5)]).unwrap();
        let tickers = h.tickers();
        assert_eq!(tickers[0].as_str(), "MSFT");
        assert_eq!(tickers[1].as_str(), "AAPL");
    }

    #[test]
    fn test_factor_bucket_membership() {
        assert!(FactorId::Market.in_factor_bucket());
        assert!(FactorId::InterestRate.in_factor_bucket());
        assert!(!FactorId::Industry.in_factor_bucket());
        assert!(!FactorId::Subindustry.in_factor_bucket());
    }

    #[test]
    fn test_risk_limits_all_optional() {
        let limits: RiskLimits = serde_json::from_str("{}").unwrap();
        assert!(limits.portfolio_limits.max_volatility.is_none());
        assert!(limits.max_single_factor_loss.is_none());

        let limits: RiskLimits = serde_json::from_str(
            r#"{"portfolio_limits": {"max_volatility": 0.2}, "max_single_factor_loss": -0.1}"#,
        )
        .unwrap();
        assert_eq!(limits.portfolio_limits.max_volatility, Some(0.2));
        assert_eq!(limits.max_single_factor_loss, Some(-0.1));
    }
}
