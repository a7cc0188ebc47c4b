#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Regression kernel and per-stock risk profiles.
//!
//! The kernels in this crate are pure functions on immutable series:
//! inputs are fetched and aligned upstream, and nothing here blocks or
//! performs I/O.

pub mod ols;
pub mod peers;
pub mod profile;
pub mod rates;

pub use ols::{CapmStats, OlsFit, multi_factor_ols, single_factor_ols};
pub use peers::{PeerMedianOutcome, peer_median_returns};
pub use profile::{DataQualityFlag, ProfileInputs, ProfileQuality, StockFactorProfile, build_profile};
pub use rates::{RateAggregation, RateBetaDiagnostics, RateBetas, key_rate_regression, prepare_rate_factors};
