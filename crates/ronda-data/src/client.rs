//! FMP API client implementation.

use std::env;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use ronda_traits::config::HttpConfig;
use ronda_traits::types::DateWindow;

use crate::types::{AdjustedRow, EodRow, TreasuryRow};
use crate::{DataError, Result};

/// Base URL for the FMP stable API.
const FMP_BASE_URL: &str = "https://financialmodelingprep.com/stable";

/// Financial Modeling Prep API client with bounded retry.
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    api_key: String,
    http: HttpConfig,
}

/// The close-price endpoint returns either a flat array or a wrapped
/// `{ "historical": [...] }` object depending on parameters.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EodPayload {
    Flat(Vec<EodRow>),
    Wrapped {
        #[serde(default)]
        historical: Vec<EodRow>,
    },
}

impl EodPayload {
    fn into_rows(self) -> Vec<EodRow> {
        match self {
            Self::Flat(rows) => rows,
            Self::Wrapped { historical } => historical,
        }
    }
}

impl FmpClient {
    /// Create a new FMP client with the given API key and HTTP policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, http: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            http,
        })
    }

    /// Create a new FMP client from the `FMP_API_KEY` environment variable.
    ///
    /// This will also load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingApiKey`] if the variable is not set.
    pub fn from_env(http: HttpConfig) -> Result<Self> {
        // Try to load .env file (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_key = env::var("FMP_API_KEY").map_err(|_| DataError::MissingApiKey)?;
        Self::new(api_key, http)
    }

    /// Build a URL with the API key.
    fn url(&self, endpoint: &str) -> String {
        if endpoint.contains('?') {
            format!("{FMP_BASE_URL}/{endpoint}&apikey={}", self.api_key)
        } else {
            format!("{FMP_BASE_URL}/{endpoint}?apikey={}", self.api_key)
        }
    }

    /// Make a GET request with bounded exponential-backoff retry and parse
    /// the JSON response.
    ///
    /// Transport errors, 429 and 5xx responses are retried; other HTTP
    /// errors fail immediately with the status attached.
    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        let mut last_err: Option<DataError> = None;

        for attempt in 0..self.http.max_attempts {
            if attempt > 0 {
                let delay = self.http.retry_base_ms * (1 << (attempt - 1));
                debug!(endpoint, attempt, delay_ms = delay, "retrying request");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(endpoint, attempt, error = %e, "transport error");
                    last_err = Some(DataError::Request(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(endpoint, attempt, "rate limited");
                last_err = Some(DataError::RateLimitExceeded(endpoint.to_string()));
                continue;
            }
            if status.is_server_error() {
                warn!(endpoint, attempt, %status, "server error");
                last_err = Some(DataError::Api(format!("HTTP {status}")));
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(DataError::Api(format!("HTTP {status}: {text}")));
            }

            let text = response.text().await?;

            // Check for error responses delivered with a 200 status
            if text.contains("\"Error Message\"") || text.contains("\"error\"") {
                return Err(DataError::Api(text));
            }

            return serde_json::from_str(&text).map_err(DataError::Json);
        }

        Err(last_err.unwrap_or_else(|| DataError::Api("request attempts exhausted".to_string())))
    }

    fn window_params(window: Option<&DateWindow>) -> String {
        let mut params = String::new();
        if let Some(w) = window {
            params.push_str(&format!("&from={}", w.start));
            params.push_str(&format!("&to={}", w.end));
        }
        params
    }

    /// Get daily close prices for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails after retries.
    pub async fn daily_close(
        &self,
        symbol: &str,
        window: Option<&DateWindow>,
    ) -> Result<Vec<EodRow>> {
        let endpoint = format!(
            "historical-price-eod/full?symbol={}&serietype=line{}",
            symbol.to_uppercase(),
            Self::window_params(window),
        );
        let payload: EodPayload = self.get(&endpoint).await?;
        Ok(payload.into_rows())
    }

    /// Get daily dividend-adjusted prices for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails after retries.
    pub async fn daily_dividend_adjusted(
        &self,
        symbol: &str,
        window: Option<&DateWindow>,
    ) -> Result<Vec<AdjustedRow>> {
        let endpoint = format!(
            "historical-price-eod/dividend-adjusted?symbol={}{}",
            symbol.to_uppercase(),
            Self::window_params(window),
        );
        self.get(&endpoint).await
    }

    /// Get daily Treasury yield levels in percentage points.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails after retries.
    pub async fn treasury_rates(&self, window: Option<&DateWindow>) -> Result<Vec<TreasuryRow>> {
        let params = Self::window_params(window);
        let endpoint = if params.is_empty() {
            "treasury-rates".to_string()
        } else {
            // Strip the leading '&'; these are the first query parameters.
            format!("treasury-rates?{}", &params[1..])
        };
        self.get(&endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ronda_traits::types::Date;

    #[test]
    fn test_url_building() {
        let client = FmpClient::new("test_key", HttpConfig::default()).unwrap();
        assert_eq!(
            client.url("treasury-rates"),
            "https://financialmodelingprep.com/stable/treasury-rates?apikey=test_key"
        );
        assert_eq!(
            client.url("historical-price-eod/full?symbol=AAPL"),
            "https://financialmodelingprep.com/stable/historical-price-eod/full?symbol=AAPL&apikey=test_key"
        );
    }

    #[test]
    fn test_window_params() {
        let window = DateWindow::new(
            Date::from_ymd_opt(2020, 1, 31).unwrap(),
            Date::from_ymd_opt(2023, 12, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(
            FmpClient::window_params(Some(&window)),
            "&from=2020-01-31&to=2023-12-31"
        );
        assert_eq!(FmpClient::window_params(None), "");
    }

    #[test]
    fn test_eod_payload_both_shapes() {
        let flat: EodPayload =
            serde_json::from_str(r#"[{"date": "2024-01-31", "close": 10.0}]"#).unwrap();
        assert_eq!(flat.into_rows().len(), 1);

        let wrapped: EodPayload =
            serde_json::from_str(r#"{"historical": [{"date": "2024-01-31", "close": 10.0}]}"#)
                .unwrap();
        assert_eq!(wrapped.into_rows().len(), 1);
    }
}
