//! Composite risk scoring.
//!
//! Each metric maps its excess ratio `r = |actual| / limit` through a
//! piecewise-linear curve (100 at `r ≤ safe`, 75 at the limit, 50 at
//! `danger`, 0 at `r ≥ critical`), metric scores aggregate into four
//! component scores, and the overall score is the minimum of the
//! components. Category bands are fixed: ≥90 excellent, ≥80 good,
//! ≥70 moderate, ≥60 elevated, else high.

use std::fmt;

use serde::{Deserialize, Serialize};

use ronda_traits::config::{RiskScoreConfig, ScoreAggregation, ScoreThresholds};
use ronda_traits::types::{FactorId, RiskLimits, Ticker};

use crate::limits::INDUSTRY_PROXY_PREFIX;
use crate::view::PortfolioView;
use crate::worst_case::WorstCaseAnalysis;

/// Risk category derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Score ≥ 90.
    Excellent,
    /// Score ≥ 80.
    Good,
    /// Score ≥ 70.
    Moderate,
    /// Score ≥ 60.
    Elevated,
    /// Score < 60.
    High,
}

impl RiskCategory {
    /// Map a score to its band.
    pub const fn from_score(score: u32) -> Self {
        match score {
            90.. => Self::Excellent,
            80..90 => Self::Good,
            70..80 => Self::Moderate,
            60..70 => Self::Elevated,
            _ => Self::High,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Moderate => "moderate",
            Self::Elevated => "elevated",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Per-component scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// Factor beta and factor variance exposure.
    pub factor_risk: u32,
    /// Single-position concentration.
    pub concentration_risk: u32,
    /// Total volatility against its limit.
    pub volatility_risk: u32,
    /// Industry-proxy exposure.
    pub sector_risk: u32,
}

impl ComponentScores {
    /// The minimum component score.
    pub fn min(&self) -> u32 {
        self.factor_risk
            .min(self.concentration_risk)
            .min(self.volatility_risk)
            .min(self.sector_risk)
    }
}

/// A per-factor potential loss estimate: current beta times the factor's
/// worst historical month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialLoss {
    /// Factor or proxy label.
    pub factor: String,
    /// Current portfolio beta.
    pub beta: f64,
    /// Worst single-month factor return in the lookback window.
    pub worst_month: f64,
    /// Estimated portfolio loss if the worst month repeats.
    pub potential_loss: f64,
}

/// Potential losses and the tolerance they are measured against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialLosses {
    /// Per-factor estimates, worst first.
    pub by_factor: Vec<PotentialLoss>,
    /// The configured loss tolerance (negative).
    pub max_loss_limit: f64,
}

/// The composite risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Overall score in `[0, 100]` (minimum of the components).
    pub overall: u32,
    /// Category band of the overall score.
    pub category: RiskCategory,
    /// Component scores.
    pub component_scores: ComponentScores,
    /// Potential loss estimates.
    pub potential_losses: PotentialLosses,
    /// Identified risk issues, most severe first.
    pub risk_factors: Vec<String>,
    /// Suggested remediations.
    pub recommendations: Vec<String>,
}

/// Map an excess ratio through the piecewise-linear score curve.
pub fn score_excess_ratio(ratio: f64, t: &ScoreThresholds) -> f64 {
    let lerp = |x: f64, x0: f64, x1: f64, y0: f64, y1: f64| {
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    };
    if !ratio.is_finite() {
        return 0.0;
    }
    if ratio <= t.safe {
        100.0
    } else if ratio <= t.caution {
        lerp(ratio, t.safe, t.caution, 100.0, 75.0)
    } else if ratio <= t.danger {
        lerp(ratio, t.caution, t.danger, 75.0, 50.0)
    } else if ratio < t.critical {
        lerp(ratio, t.danger, t.critical, 50.0, 0.0)
    } else {
        0.0
    }
}

fn aggregate(metric_scores: &[f64], aggregation: ScoreAggregation) -> u32 {
    if metric_scores.is_empty() {
        return 100;
    }
    let raw = match aggregation {
        ScoreAggregation::Min => metric_scores.iter().copied().fold(100.0, f64::min),
        ScoreAggregation::WeightedMean => {
            metric_scores.iter().sum::<f64>() / metric_scores.len() as f64
        }
    };
    raw.clamp(0.0, 100.0).round() as u32
}

/// Compute the composite risk score for a portfolio view.
pub fn compute_risk_score(
    view: &PortfolioView,
    limits: &RiskLimits,
    worst_case: &WorstCaseAnalysis,
    cfg: &RiskScoreConfig,
) -> RiskScore {
    let t = &cfg.thresholds;
    let mut risk_factors: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();

    let ratio = |actual: f64, limit: f64| {
        if limit > 0.0 && limit.is_finite() {
            Some(actual.abs() / limit)
        } else {
            None
        }
    };

    // Volatility component.
    let mut volatility_ratios = Vec::new();
    if let Some(limit) = limits.portfolio_limits.max_volatility
        && let Some(r) = ratio(view.volatility_annual, limit)
    {
        volatility_ratios.push(r);
        if r > 1.0 {
            risk_factors.push(format!(
                "Volatility {:.1}% exceeds the {:.1}% limit",
                view.volatility_annual * 100.0,
                limit * 100.0
            ));
            recommendations
                .push("Reduce overall volatility by trimming the highest-risk positions".to_string());
        }
    }

    // Concentration component.
    let mut concentration_ratios = Vec::new();
    if let Some(limit) = limits.concentration_limits.max_single_stock_weight
        && let Some(r) = ratio(view.max_abs_weight(), limit)
    {
        concentration_ratios.push(r);
        if r > 1.0 {
            risk_factors.push(format!(
                "Largest position {:.1}% exceeds the {:.1}% concentration limit",
                view.max_abs_weight() * 100.0,
                limit * 100.0
            ));
            recommendations.push("Trim the largest position below its weight limit".to_string());
        }
    }

    // Factor component: beta caps plus variance-share limits.
    let mut factor_ratios = Vec::new();
    for (factor, beta) in &view.portfolio_factor_betas {
        if !factor.in_factor_bucket() {
            continue;
        }
        let cap = worst_case.max_beta(*factor);
        if let Some(r) = ratio(*beta, cap) {
            factor_ratios.push(r);
            if r > 1.0 {
                risk_factors.push(format!(
                    "{factor} beta {beta:.2} exceeds the {cap:.2} worst-case cap"
                ));
                recommendations.push(format!("Reduce {factor} exposure below β = {cap:.2}"));
            }
        }
    }
    let vd = &view.variance_decomposition;
    if let Some(limit) = limits.variance_limits.max_factor_contribution
        && let Some(r) = ratio(vd.factor_pct, limit)
    {
        factor_ratios.push(r);
        if r > 1.0 {
            risk_factors.push(format!(
                "Factor variance share {:.0}% exceeds the {:.0}% limit",
                vd.factor_pct * 100.0,
                limit * 100.0
            ));
            recommendations.push("Diversify away from systematic factor exposure".to_string());
        }
    }
    if let Some(limit) = limits.variance_limits.max_market_contribution {
        let market_pct = vd
            .factor_breakdown_pct
            .iter()
            .find(|(f, _)| *f == FactorId::Market)
            .map_or(0.0, |(_, p)| *p);
        if let Some(r) = ratio(market_pct, limit) {
            factor_ratios.push(r);
            if r > 1.0 {
                risk_factors.push(format!(
                    "Market variance share {:.0}% exceeds the {:.0}% limit",
                    market_pct * 100.0,
                    limit * 100.0
                ));
                recommendations.push("Hedge or reduce market beta".to_string());
            }
        }
    }

    // Sector component: per-proxy betas plus the industry variance share.
    let mut sector_ratios = Vec::new();
    for (proxy, beta) in &view.industry_variance.per_industry_group_beta {
        let cap = worst_case
            .max_betas_by_proxy
            .iter()
            .find(|(t, _)| t == proxy)
            .map_or(f64::INFINITY, |(_, b)| *b);
        if let Some(r) = ratio(*beta, cap) {
            sector_ratios.push(r);
            if r > 1.0 {
                risk_factors.push(format!(
                    "{INDUSTRY_PROXY_PREFIX}{proxy} beta {beta:.2} exceeds its {cap:.2} cap"
                ));
                recommendations.push(format!("Reduce {proxy} industry exposure"));
            }
        }
    }
    if let Some(limit) = limits.variance_limits.max_industry_contribution
        && let Some(r) = ratio(view.industry_variance.max_percent(), limit)
    {
        sector_ratios.push(r);
        if r > 1.0 {
            risk_factors.push(format!(
                "Top industry variance share {:.0}% exceeds the {:.0}% limit",
                view.industry_variance.max_percent() * 100.0,
                limit * 100.0
            ));
            recommendations.push("Spread exposure across more industries".to_string());
        }
    }

    // Structural warnings that inform but do not score.
    if view.leverage.is_finite() && view.leverage > cfg.leverage_warning_threshold {
        risk_factors.push(format!("Leverage {:.2}x above warning threshold", view.leverage));
    }
    if view.herfindahl > cfg.herfindahl_warning_threshold {
        risk_factors.push(format!(
            "Herfindahl index {:.2} indicates low diversification",
            view.herfindahl
        ));
    }

    let score_all = |ratios: &[f64]| {
        let scores: Vec<f64> = ratios.iter().map(|r| score_excess_ratio(*r, t)).collect();
        aggregate(&scores, cfg.aggregation)
    };
    let component_scores = ComponentScores {
        factor_risk: score_all(&factor_ratios),
        concentration_risk: score_all(&concentration_ratios),
        volatility_risk: score_all(&volatility_ratios),
        sector_risk: score_all(&sector_ratios),
    };
    let overall = component_scores.min();

    // Potential losses: β × worst month per factor type.
    let mut by_factor: Vec<PotentialLoss> = worst_case
        .worst_by_factor
        .iter()
        .map(|(factor, (label, worst))| {
            let beta = view.factor_beta(*factor);
            PotentialLoss {
                factor: format!("{factor} ({label})"),
                beta,
                worst_month: *worst,
                potential_loss: beta * worst,
            }
        })
        .collect();
    by_factor.sort_by(|a, b| {
        a.potential_loss
            .partial_cmp(&b.potential_loss)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    RiskScore {
        overall,
        category: RiskCategory::from_score(overall),
        component_scores,
        potential_losses: PotentialLosses {
            by_factor,
            max_loss_limit: worst_case.max_loss,
        },
        risk_factors,
        recommendations,
    }
}

/// A proposed limit with its remediation flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuggestedLimit {
    /// The currently configured limit, if any.
    pub current: Option<f64>,
    /// The tightest limit that restores compliance.
    pub suggested: f64,
    /// Whether the portfolio must change before the suggested limit can
    /// hold.
    pub needs_reduction: bool,
}

/// Limits backed out from the loss tolerance and current exposures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestedLimits {
    /// Per-factor beta limits.
    pub factor_limits: Vec<(FactorId, SuggestedLimit)>,
    /// Per-industry-proxy beta limits.
    pub proxy_limits: Vec<(Ticker, SuggestedLimit)>,
    /// Annual volatility limit.
    pub volatility_limit: Option<SuggestedLimit>,
    /// Max single position weight limit.
    pub concentration_limit: Option<SuggestedLimit>,
}

/// Invert the constraint system: propose the tightest limits consistent
/// with the loss tolerance, flagging exposures that must shrink first.
pub fn suggest_limits(
    view: &PortfolioView,
    limits: &RiskLimits,
    worst_case: &WorstCaseAnalysis,
) -> SuggestedLimits {
    let factor_limits = worst_case
        .max_betas
        .iter()
        .map(|(factor, cap)| {
            let beta = view.factor_beta(*factor);
            (
                *factor,
                SuggestedLimit {
                    current: None,
                    suggested: *cap,
                    needs_reduction: beta.abs() > *cap,
                },
            )
        })
        .collect();

    let proxy_limits = worst_case
        .max_betas_by_proxy
        .iter()
        .map(|(proxy, cap)| {
            let beta = view
                .industry_variance
                .per_industry_group_beta
                .iter()
                .find(|(t, _)| t == proxy)
                .map_or(0.0, |(_, b)| *b);
            (
                proxy.clone(),
                SuggestedLimit {
                    current: None,
                    suggested: *cap,
                    needs_reduction: beta.abs() > *cap,
                },
            )
        })
        .collect();

    // A monthly move of one σ at the suggested volatility matches the
    // loss tolerance.
    let volatility_limit = {
        let derived = worst_case.max_loss.abs() * ronda_traits::stats::MONTHS_PER_YEAR.sqrt();
        let current = limits.portfolio_limits.max_volatility;
        let suggested = current.map_or(derived, |c| c.min(derived));
        Some(SuggestedLimit {
            current,
            suggested,
            needs_reduction: view.volatility_annual > suggested,
        })
    };

    // The largest position sized so its worst market month stays inside
    // the tolerance.
    let concentration_limit = worst_case.worst_month(FactorId::Market).map(|worst| {
        let derived = if worst < 0.0 {
            (worst_case.max_loss / worst).abs()
        } else {
            f64::INFINITY
        };
        let current = limits.concentration_limits.max_single_stock_weight;
        let suggested = current.map_or(derived, |c| c.min(derived));
        SuggestedLimit {
            current,
            suggested,
            needs_reduction: view.max_abs_weight() > suggested,
        }
    });

    SuggestedLimits {
        factor_limits,
        proxy_limits,
        volatility_limit,
        concentration_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn thresholds() -> ScoreThresholds {
        ScoreThresholds::default()
    }

    #[test]
    fn test_score_curve_breakpoints() {
        let t = thresholds();
        assert_relative_eq!(score_excess_ratio(0.5, &t), 100.0);
        assert_relative_eq!(score_excess_ratio(0.8, &t), 100.0);
        assert_relative_eq!(score_excess_ratio(1.0, &t), 75.0);
        assert_relative_eq!(score_excess_ratio(1.5, &t), 50.0);
        assert_relative_eq!(score_excess_ratio(2.0, &t), 0.0);
        assert_relative_eq!(score_excess_ratio(5.0, &t), 0.0);
        // Midpoints interpolate linearly.
        assert_relative_eq!(score_excess_ratio(0.9, &t), 87.5);
        assert_relative_eq!(score_excess_ratio(1.25, &t), 62.5);
        assert_relative_eq!(score_excess_ratio(1.75, &t), 25.0);
    }

    #[test]
    fn test_curve_is_monotone_decreasing() {
        let t = thresholds();
        let mut last = 101.0;
        for i in 0..100 {
            let r = i as f64 * 0.03;
            let s = score_excess_ratio(r, &t);
            assert!(s <= last, "score increased at ratio {r}");
            last = s;
        }
    }

    #[test]
    fn test_vol_over_limit_scores_at_most_75() {
        // Annual vol 0.22 against a 0.20 limit: ratio 1.1.
        let t = thresholds();
        let s = score_excess_ratio(0.22 / 0.20, &t);
        assert!(s <= 75.0);
        assert_relative_eq!(s, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_aggregation_modes() {
        let scores = [100.0, 50.0];
        assert_eq!(aggregate(&scores, ScoreAggregation::Min), 50);
        assert_eq!(aggregate(&scores, ScoreAggregation::WeightedMean), 75);
        assert_eq!(aggregate(&[], ScoreAggregation::Min), 100);
    }

    #[test]
    fn test_category_bands() {
        assert_eq!(RiskCategory::from_score(100), RiskCategory::Excellent);
        assert_eq!(RiskCategory::from_score(90), RiskCategory::Excellent);
        assert_eq!(RiskCategory::from_score(89), RiskCategory::Good);
        assert_eq!(RiskCategory::from_score(79), RiskCategory::Moderate);
        assert_eq!(RiskCategory::from_score(69), RiskCategory::Elevated);
        assert_eq!(RiskCategory::from_score(0), RiskCategory::High);
    }

    #[test]
    fn test_infinite_ratio_scores_zero() {
        assert_relative_eq!(score_excess_ratio(f64::INFINITY, &thresholds()), 0.0);
    }
}
