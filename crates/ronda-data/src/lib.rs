//! Market data loaders and caching for the Ronda engine.
//!
//! This crate owns every side effect of the core: HTTP calls against the
//! [Financial Modeling Prep](https://financialmodelingprep.com/) price and
//! Treasury endpoints, the parquet-backed disk cache, and the in-memory
//! LRU layer in front of it. Everything downstream of [`DataContext`] is
//! pure computation on immutable series.
//!
//! # Environment Variables
//!
//! Set `FMP_API_KEY` in your environment or `.env` file:
//!
//! ```bash
//! FMP_API_KEY=your_api_key_here
//! ```

mod cache;
mod client;
mod context;
pub mod panel;
mod types;

pub use cache::{CacheKey, DiskCache};
pub use client::FmpClient;
pub use context::DataContext;
pub use panel::{PanelMeta, ReturnsPanel};
pub use types::{AdjustedRow, EodRow, TreasuryRow, YieldFrame};

use thiserror::Error;

/// Errors that can occur in the data layer.
#[derive(Debug, Error)]
pub enum DataError {
    /// Missing API key.
    #[error("FMP_API_KEY environment variable not set")]
    MissingApiKey,

    /// HTTP request failed after retries.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("FMP API error: {0}")]
    Api(String),

    /// Rate limit exceeded after retries.
    #[error("Rate limit exceeded for endpoint {0}")]
    RateLimitExceeded(String),

    /// Provider returned an empty or malformed payload for a valid symbol.
    #[error("No data available for {symbol} from {endpoint}")]
    NoData {
        /// Symbol the request was for.
        symbol: String,
        /// Endpoint that produced the empty payload.
        endpoint: String,
    },

    /// Disk cache I/O failure.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<DataError> for ronda_traits::RondaError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NoData { symbol, endpoint } => {
                Self::DataUnavailable(format!("{symbol} ({endpoint})"))
            }
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Result type for data-layer operations.
pub type Result<T> = std::result::Result<T, DataError>;
