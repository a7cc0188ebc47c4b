#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # ronda
//!
//! Portfolio risk analysis engine.
//!
//! ## Crate Organization
//!
//! - [`traits`] - Core types, errors and configuration
//! - [`data`] - Price/yield loaders, two-level cache, returns panels
//! - [`model`] - Regression kernel and per-stock risk profiles
//! - [`portfolio`] - Aggregation, worst-case betas, limits, scoring
//! - [`opt`] - Constrained optimizers and the what-if applier
//!
//! ## Architecture
//!
//! 1. **Data** fetches month-end prices and Treasury yields behind a
//!    parquet disk cache and an in-memory LRU
//! 2. **Model** regresses each stock on its factor proxy bundle
//! 3. **Portfolio** composes profiles into the portfolio view and
//!    evaluates the limit system
//! 4. **Opt** solves min-variance / max-return books and applies
//!    what-if scenarios through the identical analysis path
//!
//! The [`RiskEngine`] facade owns the data context and exposes the five
//! typed operations: `analyze_portfolio`, `analyze_what_if`, `optimize`,
//! `analyze_stock` and `risk_score`.

/// Version information for the ronda crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod engine;
mod results;

pub use engine::RiskEngine;
pub use results::{
    Objective, OptimizationResult, RiskAnalysisResult, StockAnalysis, WhatIfResult,
};

// Re-export error and configuration types
pub use ronda_traits::{EngineConfig, Result, RondaError};

/// Core types, errors and configuration.
pub mod traits {
    pub use ronda_traits::*;
}

/// Common data types (tickers, series, holdings, limits).
pub mod types {
    pub use ronda_traits::types::*;
}

/// Market data loaders, caching, and returns panels.
pub mod data {
    pub use ronda_data::*;
}

/// Regression kernel and per-stock profiles.
pub mod model {
    pub use ronda_model::*;
}

/// Portfolio aggregation, limits and scoring.
pub mod portfolio {
    pub use ronda_portfolio::*;
}

/// Optimizers and what-if analysis.
pub mod opt {
    pub use ronda_opt::*;
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ronda::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        EngineConfig, Objective, OptimizationResult, Result, RiskAnalysisResult, RiskEngine,
        RondaError, StockAnalysis, WhatIfResult,
    };
    pub use ronda_opt::PortfolioShift;
    pub use ronda_portfolio::{PortfolioView, RiskScore};
    pub use ronda_traits::types::{
        Date, DateWindow, FactorProxies, Holding, Holdings, ProxyMap, RiskLimits, Ticker,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    #[test]
    fn test_error_types() {
        let _result: Result<()> = Ok(());
        let _error: RondaError = RondaError::InputInvalid("test".to_string());
    }
}
