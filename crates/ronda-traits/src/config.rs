//! Engine configuration.
//!
//! [`EngineConfig`] gathers every recognized option in one serde-friendly
//! document with conservative defaults. The engine owns one instance and
//! passes it explicitly; there is no process-global configuration state.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{Date, Ticker};

/// A key-rate Treasury maturity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Maturity {
    /// 2-year Treasury yield.
    #[serde(rename = "UST2Y")]
    Y2,
    /// 5-year Treasury yield.
    #[serde(rename = "UST5Y")]
    Y5,
    /// 10-year Treasury yield.
    #[serde(rename = "UST10Y")]
    Y10,
    /// 30-year Treasury yield.
    #[serde(rename = "UST30Y")]
    Y30,
}

impl Maturity {
    /// Internal factor key (e.g. `UST10Y`).
    pub const fn as_key(&self) -> &'static str {
        match self {
            Self::Y2 => "UST2Y",
            Self::Y5 => "UST5Y",
            Self::Y10 => "UST10Y",
            Self::Y30 => "UST30Y",
        }
    }

    /// Column name used by the Treasury yield provider.
    pub const fn provider_field(&self) -> &'static str {
        match self {
            Self::Y2 => "year2",
            Self::Y5 => "year5",
            Self::Y10 => "year10",
            Self::Y30 => "year30",
        }
    }
}

/// Scaling applied to raw yield levels before differencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScale {
    /// Input levels are percentage points; converted to decimal (÷100).
    Pp,
    /// Input levels are already decimal.
    Decimal,
}

impl RateScale {
    /// Multiplier applied to yield differences.
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Pp => 0.01,
            Self::Decimal => 1.0,
        }
    }
}

/// Key-rate factor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateFactorConfig {
    /// Maturities forming the key-rate vector.
    pub default_maturities: Vec<Maturity>,
    /// Minimum maturities with data required to run the rate regression.
    pub min_required_maturities: usize,
    /// Scaling of provider yield levels.
    pub scale: RateScale,
    /// Asset classes for which the rate factor block is added.
    pub eligible_asset_classes: Vec<String>,
}

impl Default for RateFactorConfig {
    fn default() -> Self {
        Self {
            default_maturities: vec![Maturity::Y2, Maturity::Y5, Maturity::Y10, Maturity::Y30],
            min_required_maturities: 2,
            scale: RateScale::Pp,
            eligible_asset_classes: vec!["bond".to_string(), "real_estate".to_string()],
        }
    }
}

/// Minimum observation counts and data-quality warning thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityThresholds {
    /// Minimum monthly observations for factor beta estimation.
    pub min_observations_for_factor_betas: usize,
    /// Minimum observations for the key-rate regression.
    pub min_observations_for_interest_rate_beta: usize,
    /// Minimum price observations needed to compute returns.
    pub min_observations_for_returns_calculation: usize,
    /// Minimum observations for any regression.
    pub min_observations_for_regression: usize,
    /// Minimum months for the CAPM alpha/beta regression.
    pub min_observations_for_capm_regression: usize,
    /// Minimum monthly return observations for expected-return estimation.
    pub min_observations_for_expected_returns: usize,
    /// Minimum valid peers required to form the subindustry median.
    pub min_valid_peers_for_median: usize,
    /// Peer drop rate above which a data-quality flag is raised.
    pub max_peer_drop_rate: f64,
    /// Rate regression adjusted R² below which a flag is raised.
    pub min_r2_for_rate_factors: f64,
    /// Interest-rate beta magnitude above which a flag is raised.
    pub max_reasonable_interest_rate_beta: f64,
    /// Regression condition number above which the profile is degraded.
    pub max_condition_number: f64,
    /// Variance inflation factor above which the profile is degraded.
    pub max_vif: f64,
}

impl Default for DataQualityThresholds {
    fn default() -> Self {
        Self {
            min_observations_for_factor_betas: 2,
            min_observations_for_interest_rate_beta: 6,
            min_observations_for_returns_calculation: 2,
            min_observations_for_regression: 3,
            min_observations_for_capm_regression: 12,
            min_observations_for_expected_returns: 11,
            min_valid_peers_for_median: 1,
            max_peer_drop_rate: 0.8,
            min_r2_for_rate_factors: 0.3,
            max_reasonable_interest_rate_beta: 25.0,
            max_condition_number: 30.0,
            max_vif: 10.0,
        }
    }
}

/// How per-metric scores aggregate into a component score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreAggregation {
    /// Conservative: the worst metric drives the component.
    Min,
    /// Arithmetic mean of the metric scores.
    WeightedMean,
}

/// Breakpoints of the piecewise-linear excess-ratio score curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    /// Ratio at or below which a metric scores 100.
    pub safe: f64,
    /// Ratio scoring 75 (at the limit).
    pub caution: f64,
    /// Ratio scoring 50.
    pub danger: f64,
    /// Ratio at or above which a metric scores 0.
    pub critical: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            safe: 0.8,
            caution: 1.0,
            danger: 1.5,
            critical: 2.0,
        }
    }
}

/// Risk score configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskScoreConfig {
    /// Excess-ratio curve breakpoints.
    pub thresholds: ScoreThresholds,
    /// Per-component aggregation of metric scores.
    pub aggregation: ScoreAggregation,
    /// Leverage ratio above which a risk factor is reported.
    pub leverage_warning_threshold: f64,
    /// Herfindahl index above which a diversification warning is reported.
    pub herfindahl_warning_threshold: f64,
}

impl Default for RiskScoreConfig {
    fn default() -> Self {
        Self {
            thresholds: ScoreThresholds::default(),
            aggregation: ScoreAggregation::Min,
            leverage_warning_threshold: 1.1,
            herfindahl_warning_threshold: 0.15,
        }
    }
}

/// Sizes of the per-function in-memory LRU caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LruSizes {
    /// Entries held for price series loaders.
    pub prices: u64,
    /// Entries held for the Treasury yield loader.
    pub treasury: u64,
}

impl Default for LruSizes {
    fn default() -> Self {
        Self {
            prices: 256,
            treasury: 32,
        }
    }
}

/// Disk and RAM cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of the columnar disk cache.
    pub dir: PathBuf,
    /// In-memory LRU sizes.
    pub lru_sizes: LruSizes,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache_prices"),
            lru_sizes: LruSizes::default(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per request (1 initial + retries).
    pub max_attempts: u32,
    /// Base delay of the exponential backoff, in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_ms: 500,
        }
    }
}

/// Default analysis window used when a caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindowConfig {
    /// Default start date.
    pub start: Date,
    /// Default end date.
    pub end: Date,
}

impl Default for AnalysisWindowConfig {
    fn default() -> Self {
        Self {
            start: Date::from_ymd_opt(2019, 1, 31).expect("valid default start date"),
            end: Date::from_ymd_opt(2026, 1, 29).expect("valid default end date"),
        }
    }
}

/// The complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default analysis window.
    pub analysis_window: AnalysisWindowConfig,
    /// When true, rescale holdings so `Σ|w| = 1`.
    pub normalize_weights: bool,
    /// Historical lookback for worst-case scenario analysis, in years.
    pub worst_case_lookback_years: u32,
    /// Lookback for expected-return estimation, in years.
    pub expected_returns_lookback_years: u32,
    /// Fallback annual return when estimation fails.
    pub expected_returns_fallback_default: f64,
    /// Conservative fallback annual return for cash proxies.
    pub cash_proxy_fallback_return: f64,
    /// Tickers treated as cash or near-cash positions.
    pub cash_proxies: BTreeSet<Ticker>,
    /// Loss tolerance assumed when the limits document carries none
    /// (negative decimal).
    pub default_loss_tolerance: f64,
    /// Key-rate factor settings.
    pub rate_factors: RateFactorConfig,
    /// Observation thresholds and quality flags.
    pub data_quality: DataQualityThresholds,
    /// Risk score curve and aggregation.
    pub risk_score: RiskScoreConfig,
    /// Cache locations and sizes.
    pub cache: CacheConfig,
    /// HTTP timeouts and retry policy.
    pub http: HttpConfig,
    /// Bound on concurrent data fetches.
    pub worker_pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_window: AnalysisWindowConfig::default(),
            normalize_weights: false,
            worst_case_lookback_years: 10,
            expected_returns_lookback_years: 10,
            expected_returns_fallback_default: 0.06,
            cash_proxy_fallback_return: 0.02,
            cash_proxies: ["SGOV", "ESTR", "IB01", "CASH", "USD"]
                .into_iter()
                .map(Ticker::new)
                .collect(),
            default_loss_tolerance: -0.10,
            rate_factors: RateFactorConfig::default(),
            data_quality: DataQualityThresholds::default(),
            risk_score: RiskScoreConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            worker_pool_size: 8,
        }
    }
}

impl EngineConfig {
    /// Whether `ticker` is a configured cash proxy.
    pub fn is_cash_proxy(&self, ticker: &Ticker) -> bool {
        self.cash_proxies.contains(ticker)
    }

    /// Whether `asset_class` gets the key-rate factor block.
    pub fn is_rate_eligible(&self, asset_class: Option<&str>) -> bool {
        asset_class.is_some_and(|c| {
            self.rate_factors
                .eligible_asset_classes
                .iter()
                .any(|e| e == c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_mirror_settings() {
        let cfg = EngineConfig::default();
        assert!(!cfg.normalize_weights);
        assert_eq!(cfg.worst_case_lookback_years, 10);
        assert_eq!(cfg.risk_score.thresholds.safe, 0.8);
        assert_eq!(cfg.risk_score.thresholds.critical, 2.0);
        assert_eq!(cfg.rate_factors.default_maturities.len(), 4);
        assert_eq!(cfg.http.timeout_secs, 30);
        assert!(cfg.is_cash_proxy(&Ticker::new("SGOV")));
        assert!(!cfg.is_cash_proxy(&Ticker::new("AAPL")));
    }

    #[test]
    fn test_rate_eligibility() {
        let cfg = EngineConfig::default();
        assert!(cfg.is_rate_eligible(Some("bond")));
        assert!(cfg.is_rate_eligible(Some("real_estate")));
        assert!(!cfg.is_rate_eligible(Some("equity")));
        assert!(!cfg.is_rate_eligible(None));
    }

    #[test]
    fn test_maturity_provider_fields() {
        assert_eq!(Maturity::Y2.provider_field(), "year2");
        assert_eq!(Maturity::Y30.as_key(), "UST30Y");
    }

    #[test]
    fn test_partial_config_deserializes() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"normalize_weights": true, "worker_pool_size": 4}"#).unwrap();
        assert!(cfg.normalize_weights);
        assert_eq!(cfg.worker_pool_size, 4);
        assert_eq!(cfg.http.max_attempts, 3);
    }
}
