//! Result objects returned by the engine facade.
//!
//! These are pure data records: formatting and serialization live with
//! the callers (CLI, API wrappers), not here.

use serde::{Deserialize, Serialize};

use ronda_model::{CapmStats, StockFactorProfile};
use ronda_portfolio::{PortfolioView, RiskScore, SuggestedLimits, WorstCaseAnalysis, limits};
use ronda_traits::table::Table;
use ronda_traits::types::{DateWindow, Ticker};

/// A full portfolio analysis: the view plus compliance and score output.
#[derive(Debug, Clone)]
pub struct RiskAnalysisResult {
    /// The portfolio view.
    pub view: PortfolioView,
    /// Risk checks (volatility, concentration, variance shares).
    pub risk_checks: Table,
    /// Beta checks per factor and industry proxy.
    pub beta_checks: Table,
    /// The historical worst-case analysis the beta caps derive from.
    pub worst_case: WorstCaseAnalysis,
    /// The composite risk score.
    pub risk_score: RiskScore,
    /// Limits backed out from the loss tolerance.
    pub suggested_limits: SuggestedLimits,
}

impl RiskAnalysisResult {
    /// Whether every evaluated check passed.
    pub fn passes(&self) -> bool {
        limits::all_pass(&self.risk_checks) && limits::all_pass(&self.beta_checks)
    }
}

/// Baseline and scenario analyses plus side-by-side comparisons.
#[derive(Debug, Clone)]
pub struct WhatIfResult {
    /// The unmodified portfolio.
    pub baseline: RiskAnalysisResult,
    /// The portfolio after the shift.
    pub scenario: RiskAnalysisResult,
    /// The scenario weight vector.
    pub scenario_weights: Vec<(Ticker, f64)>,
    /// Risk checks compared base vs scenario.
    pub risk_comparison: Table,
    /// Beta checks compared base vs scenario.
    pub beta_comparison: Table,
}

/// Optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Minimize portfolio variance.
    MinVariance,
    /// Maximize expected return under the volatility ceiling.
    MaxReturn,
}

/// Optimal weights plus the full analysis at those weights.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// The objective that was solved.
    pub objective: Objective,
    /// Optimal weights in holding order.
    pub weights: Vec<(Ticker, f64)>,
    /// The complete analysis at the optimal weights.
    pub analysis: RiskAnalysisResult,
}

/// Single-stock analysis output.
#[derive(Debug, Clone)]
pub enum StockAnalysis {
    /// Multi-factor profile against a proxy bundle.
    MultiFactor {
        /// The analyzed ticker.
        ticker: Ticker,
        /// The analysis window.
        window: DateWindow,
        /// The estimated profile.
        profile: StockFactorProfile,
    },
    /// Simple market regression against a benchmark.
    MarketRegression {
        /// The analyzed ticker.
        ticker: Ticker,
        /// The analysis window.
        window: DateWindow,
        /// Benchmark proxy used (SPY by default).
        benchmark: Ticker,
        /// CAPM regression statistics.
        capm: CapmStats,
        /// Monthly total volatility.
        vol_monthly: f64,
        /// Annual total volatility.
        vol_annual: f64,
    },
}
