#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Portfolio-level risk aggregation.
//!
//! Everything in this crate is pure computation: the portfolio view, the
//! worst-case beta engine, limit evaluation and scoring all operate on
//! series and profiles assembled upstream.

pub mod exposure;
pub mod limits;
pub mod score;
pub mod view;
pub mod worst_case;

pub use exposure::{
    StandardizedPortfolio, normalize_weights, standardize_portfolio, weight_exposures,
};
pub use limits::{evaluate_beta_limits, evaluate_risk_limits};
pub use score::{RiskCategory, RiskScore, SuggestedLimits, compute_risk_score, suggest_limits};
pub use view::{IndustryVariance, PortfolioView, VarianceDecomposition, ViewInputs, build_portfolio_view};
pub use worst_case::{WorstCaseAnalysis, WorstCaseInputs, calc_max_factor_betas};
