#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ronda/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Optimizers and the what-if applier.
//!
//! The solvers are deterministic: fixed starting points, fixed iteration
//! budgets, no randomness. Constraints that cannot be expressed linearly
//! are enforced by a penalty during descent and post-solution rejection.

pub mod delta;
pub mod objective;
pub mod solver;
pub mod whatif;

pub use delta::{PortfolioShift, format_shift, parse_shift};
pub use objective::{BetaCap, OptimizerSettings, run_max_return, run_min_variance};
pub use solver::{Bounds, ensure_positive_definite, project_capped_simplex, symmetrize};
pub use whatif::{apply_shift, compare_tables};
