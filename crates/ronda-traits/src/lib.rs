#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core type definitions for the Ronda portfolio risk engine.
//!
//! This crate provides the foundational vocabulary for portfolio risk
//! analysis: tickers, month-end series, holdings, factor proxy bundles,
//! risk limits, engine configuration, and the shared error taxonomy.

/// The version of the ronda-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod config;
pub mod error;
pub mod stats;
pub mod table;
pub mod types;

// Re-exports
pub use config::EngineConfig;
pub use error::{Result, RondaError};
pub use table::{Table, Value};
pub use types::{
    Date, DateWindow, FactorId, FactorProxies, Holding, Holdings, MonthlySeries, PriceSeries,
    Provenance, ProxyMap, RiskLimits, Ticker,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
