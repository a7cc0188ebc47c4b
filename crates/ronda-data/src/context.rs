//! The data context: loaders, caches, and the bounded fetch pool.
//!
//! [`DataContext`] encapsulates every piece of state the data layer needs
//! (HTTP client, disk cache, in-memory LRUs, worker permits) and is passed
//! explicitly to callers. There is no module-level mutable state.

use std::sync::Arc;

use moka::future::Cache as LruCache;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use ronda_traits::EngineConfig;
use ronda_traits::config::Maturity;
use ronda_traits::types::{DateWindow, MonthlySeries, PriceSeries, Provenance, Ticker};

use crate::cache::{CacheKey, DiskCache};
use crate::client::FmpClient;
use crate::types::{YieldFrame, parse_date, resample_to_month_end};
use crate::{DataError, Result};

/// Deterministic, side-effect-free access to month-end price and yield
/// series.
///
/// Each loader goes RAM LRU → disk cache → network, and both cache levels
/// are transparent: results are identical whether the caches were cold or
/// warm. Cancellation is safe at every await point; a cancelled fetch
/// never leaves a half-written cache entry because disk writes are
/// temp-then-rename.
#[derive(Debug, Clone)]
pub struct DataContext {
    client: FmpClient,
    disk: DiskCache,
    close_lru: LruCache<u64, Arc<PriceSeries>>,
    total_return_lru: LruCache<u64, Arc<PriceSeries>>,
    treasury_lru: LruCache<u64, Arc<YieldFrame>>,
    fetch_permits: Arc<Semaphore>,
    maturities: Vec<Maturity>,
}

impl DataContext {
    /// Build a context from the engine configuration, reading the API key
    /// from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingApiKey`] when `FMP_API_KEY` is unset.
    pub fn from_env(config: &EngineConfig) -> Result<Self> {
        let client = FmpClient::from_env(config.http)?;
        Ok(Self::with_client(client, config))
    }

    /// Build a context around an existing client (tests, custom keys).
    pub fn with_client(client: FmpClient, config: &EngineConfig) -> Self {
        Self {
            client,
            disk: DiskCache::new(config.cache.dir.clone()),
            close_lru: LruCache::new(config.cache.lru_sizes.prices),
            total_return_lru: LruCache::new(config.cache.lru_sizes.prices),
            treasury_lru: LruCache::new(config.cache.lru_sizes.treasury),
            fetch_permits: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            maturities: config.rate_factors.default_maturities.clone(),
        }
    }

    /// Month-end close prices for `ticker` (the fallback price path).
    ///
    /// # Errors
    ///
    /// [`DataError::NoData`] on an empty or malformed payload, transport
    /// errors after retries otherwise.
    pub async fn fetch_monthly_close(
        &self,
        ticker: &Ticker,
        window: Option<&DateWindow>,
    ) -> Result<Arc<PriceSeries>> {
        let key = cache_key("monthly_close", ticker.as_str(), window);
        let digest = key.digest();
        if let Some(hit) = self.close_lru.get(&digest).await {
            return Ok(hit);
        }
        if let Some(series) = self.disk.load_price_series(ticker, &key) {
            let arc = Arc::new(series);
            self.close_lru.insert(digest, arc.clone()).await;
            return Ok(arc);
        }

        let rows = self.client.daily_close(ticker.as_str(), window).await?;
        let series = resample_to_month_end(
            rows.into_iter()
                .filter_map(|r| Some((parse_date(&r.date)?, r.close?))),
        );
        if series.is_empty() {
            return Err(DataError::NoData {
                symbol: ticker.to_string(),
                endpoint: "historical-price-eod/full".to_string(),
            });
        }
        let prices = PriceSeries {
            ticker: ticker.clone(),
            provenance: Provenance::PriceOnly,
            series,
        };
        self.disk.store_price_series(&key, &prices)?;
        let arc = Arc::new(prices);
        self.close_lru.insert(digest, arc.clone()).await;
        Ok(arc)
    }

    /// Month-end dividend-adjusted prices for `ticker` (preferred), with
    /// fallback to close-only prices tagged [`Provenance::PriceOnly`].
    /// Dividends are never fabricated.
    ///
    /// # Errors
    ///
    /// Fails only when both the adjusted and the fallback path fail.
    pub async fn fetch_monthly_total_return_price(
        &self,
        ticker: &Ticker,
        window: Option<&DateWindow>,
    ) -> Result<Arc<PriceSeries>> {
        let key = cache_key("monthly_total_return", ticker.as_str(), window);
        let digest = key.digest();
        if let Some(hit) = self.total_return_lru.get(&digest).await {
            return Ok(hit);
        }
        if let Some(series) = self.disk.load_price_series(ticker, &key) {
            let arc = Arc::new(series);
            self.total_return_lru.insert(digest, arc.clone()).await;
            return Ok(arc);
        }

        let prices = match self.fetch_adjusted(ticker, window).await {
            Ok(series) => PriceSeries {
                ticker: ticker.clone(),
                provenance: Provenance::TotalReturn,
                series,
            },
            Err(primary) => {
                warn!(
                    ticker = %ticker,
                    error = %primary,
                    "dividend-adjusted fetch failed, falling back to close-only"
                );
                let close = self.fetch_monthly_close(ticker, window).await.map_err(
                    |fallback| DataError::Api(format!(
                        "both price endpoints failed for {ticker}: adjusted: {primary}; close: {fallback}"
                    )),
                )?;
                PriceSeries {
                    ticker: ticker.clone(),
                    provenance: Provenance::PriceOnly,
                    series: close.series.clone(),
                }
            }
        };

        self.disk.store_price_series(&key, &prices)?;
        let arc = Arc::new(prices);
        self.total_return_lru.insert(digest, arc.clone()).await;
        Ok(arc)
    }

    async fn fetch_adjusted(
        &self,
        ticker: &Ticker,
        window: Option<&DateWindow>,
    ) -> Result<MonthlySeries> {
        let rows = self
            .client
            .daily_dividend_adjusted(ticker.as_str(), window)
            .await?;
        let series = resample_to_month_end(
            rows.into_iter()
                .filter_map(|r| Some((parse_date(&r.date)?, r.adj_close?))),
        );
        if series.is_empty() {
            return Err(DataError::NoData {
                symbol: ticker.to_string(),
                endpoint: "historical-price-eod/dividend-adjusted".to_string(),
            });
        }
        Ok(series)
    }

    /// Month-end Treasury yield levels in percentage points for the
    /// configured maturity set.
    ///
    /// # Errors
    ///
    /// [`DataError::NoData`] when no configured maturity has data.
    pub async fn fetch_monthly_treasury_yield_levels(
        &self,
        window: Option<&DateWindow>,
    ) -> Result<Arc<YieldFrame>> {
        let subject: String = self
            .maturities
            .iter()
            .map(|m| m.as_key())
            .collect::<Vec<_>>()
            .join("_");
        let key = cache_key("treasury_yields", subject, window);
        let digest = key.digest();
        if let Some(hit) = self.treasury_lru.get(&digest).await {
            return Ok(hit);
        }
        if let Some(frame) = self.disk.load_yield_frame(&key, &self.maturities) {
            let arc = Arc::new(frame);
            self.treasury_lru.insert(digest, arc.clone()).await;
            return Ok(arc);
        }

        let rows = self.client.treasury_rates(window).await?;
        let mut entries = Vec::new();
        for maturity in &self.maturities {
            let series = resample_to_month_end(rows.iter().filter_map(|r| {
                Some((parse_date(&r.date)?, r.level(*maturity)?))
            }));
            if !series.is_empty() {
                entries.push((*maturity, series));
            }
        }
        if entries.is_empty() {
            return Err(DataError::NoData {
                symbol: "treasury".to_string(),
                endpoint: "treasury-rates".to_string(),
            });
        }
        let frame = YieldFrame::new(entries);
        self.disk.store_yield_frame(&key, &frame)?;
        let arc = Arc::new(frame);
        self.treasury_lru.insert(digest, arc.clone()).await;
        Ok(arc)
    }

    /// Most recent non-missing month-end close price for `ticker`.
    ///
    /// # Errors
    ///
    /// [`DataError::NoData`] when the series is empty.
    pub async fn latest_price(&self, ticker: &Ticker) -> Result<f64> {
        let prices = self.fetch_monthly_close(ticker, None).await?;
        prices.series.last_value().ok_or_else(|| DataError::NoData {
            symbol: ticker.to_string(),
            endpoint: "historical-price-eod/full".to_string(),
        })
    }

    /// Fetch total-return price series for several tickers on the bounded
    /// worker pool, preserving input order.
    ///
    /// # Errors
    ///
    /// The first per-ticker failure aborts the panel build; remaining
    /// in-flight fetches are cancelled at their next suspension point.
    pub async fn fetch_total_return_panel(
        &self,
        tickers: &[Ticker],
        window: Option<&DateWindow>,
    ) -> Result<Vec<Arc<PriceSeries>>> {
        info!(n_tickers = tickers.len(), "fetching price panel");
        let mut set: JoinSet<(usize, Result<Arc<PriceSeries>>)> = JoinSet::new();
        for (i, ticker) in tickers.iter().enumerate() {
            let ctx = self.clone();
            let ticker = ticker.clone();
            let window = window.copied();
            set.spawn(async move {
                match ctx.fetch_permits.clone().acquire_owned().await {
                    Ok(_permit) => (
                        i,
                        ctx.fetch_monthly_total_return_price(&ticker, window.as_ref())
                            .await,
                    ),
                    Err(_) => (
                        i,
                        Err(DataError::Cache("fetch worker pool closed".to_string())),
                    ),
                }
            });
        }

        let mut out: Vec<Option<Arc<PriceSeries>>> = vec![None; tickers.len()];
        while let Some(joined) = set.join_next().await {
            let (i, result) =
                joined.map_err(|e| DataError::Cache(format!("fetch task failed: {e}")))?;
            out[i] = Some(result?);
        }
        Ok(out
            .into_iter()
            .map(|s| s.expect("every index was spawned and joined"))
            .collect())
    }

    /// Fetch total-return series for several tickers without failing
    /// fast: each slot carries its own result, so callers can drop
    /// unresolved tickers (subindustry peers) instead of aborting.
    pub async fn fetch_total_return_results(
        &self,
        tickers: &[Ticker],
        window: Option<&DateWindow>,
    ) -> Vec<(Ticker, Result<Arc<PriceSeries>>)> {
        let mut set: JoinSet<(usize, Result<Arc<PriceSeries>>)> = JoinSet::new();
        for (i, ticker) in tickers.iter().enumerate() {
            let ctx = self.clone();
            let ticker = ticker.clone();
            let window = window.copied();
            set.spawn(async move {
                match ctx.fetch_permits.clone().acquire_owned().await {
                    Ok(_permit) => (
                        i,
                        ctx.fetch_monthly_total_return_price(&ticker, window.as_ref())
                            .await,
                    ),
                    Err(_) => (
                        i,
                        Err(DataError::Cache("fetch worker pool closed".to_string())),
                    ),
                }
            });
        }

        let mut out: Vec<Option<Result<Arc<PriceSeries>>>> = Vec::new();
        out.resize_with(tickers.len(), || None);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, result)) => out[i] = Some(result),
                Err(e) => warn!(error = %e, "proxy fetch task failed"),
            }
        }
        tickers
            .iter()
            .cloned()
            .zip(out.into_iter().map(|r| {
                r.unwrap_or_else(|| Err(DataError::Cache("fetch task vanished".to_string())))
            }))
            .collect()
    }
}

fn cache_key(function: &'static str, subject: impl Into<String>, window: Option<&DateWindow>) -> CacheKey {
    CacheKey::new(
        function,
        subject,
        window.map(|w| w.start),
        window.map(|w| w.end),
    )
}
