//! Error types for the Ronda engine.
//!
//! This module defines the error taxonomy shared across the Ronda crates.
//! Out-of-limit portfolios are never errors (they are structured compliance
//! output); degraded data quality is carried as result metadata. The kinds
//! below are reserved for conditions that prevent producing a result at all.

use thiserror::Error;

/// The main error type for Ronda operations.
#[derive(Debug, Error)]
pub enum RondaError {
    /// Malformed caller input: ambiguous holdings, unparsable shift strings,
    /// inverted date windows, structurally broken limit documents.
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// A required series is empty or too short after fetch and cache.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Aligned observations fall below the configured minimum for the
    /// requested regression or estimate.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Transport or HTTP failure against the data provider after retries.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Non-finite inputs, singular matrices, dimension mismatches.
    #[error("Numeric failure: {0}")]
    Numeric(String),

    /// The optimization constraint set admits no solution.
    #[error("Optimization infeasible: {0}")]
    Infeasible(String),

    /// The optimization objective is unbounded under the given constraints.
    #[error("Optimization unbounded: {0}")]
    Unbounded(String),
}

impl RondaError {
    /// Shorthand constructor for [`RondaError::InputInvalid`].
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputInvalid(msg.into())
    }

    /// Shorthand constructor for [`RondaError::Numeric`].
    pub fn numeric(msg: impl Into<String>) -> Self {
        Self::Numeric(msg.into())
    }
}

/// A specialized Result type for Ronda operations.
pub type Result<T> = std::result::Result<T, RondaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RondaError::InsufficientData("3 obs < 12 required".to_string());
        assert_eq!(err.to_string(), "Insufficient data: 3 obs < 12 required");

        let err = RondaError::input("both shares and weight supplied for AAPL");
        assert_eq!(
            err.to_string(),
            "Invalid input: both shares and weight supplied for AAPL"
        );
    }

    #[test]
    fn test_result_type() {
        let ok_result: Result<i32> = Ok(42);
        assert!(ok_result.is_ok());

        let err_result: Result<i32> = Err(RondaError::numeric("singular covariance"));
        assert!(err_result.is_err());
    }
}
