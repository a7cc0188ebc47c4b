//! The engine facade.
//!
//! [`RiskEngine`] owns the data context (HTTP client, caches, worker
//! pool) and composes the data, model, portfolio and optimization crates
//! into the typed operations the collaborators consume. Baseline,
//! what-if and optimizer re-analyses all run through the same
//! [`RiskEngine::analyze_weights`] path, so a zero-delta scenario and a
//! direct analysis produce identical numbers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Datelike;
use ndarray::{Array1, Array2};
use tracing::{info, warn};

use ronda_data::panel::PanelMeta;
use ronda_data::{DataContext, ReturnsPanel};
use ronda_model::{
    DataQualityFlag, ProfileInputs, RateAggregation, StockFactorProfile, build_profile,
    peer_median_returns, prepare_rate_factors, single_factor_ols,
};
use ronda_opt::{
    BetaCap, Bounds, OptimizerSettings, PortfolioShift, apply_shift, compare_tables,
    run_max_return, run_min_variance,
};
use ronda_portfolio::{
    ViewInputs, WorstCaseInputs, build_portfolio_view, calc_max_factor_betas, compute_risk_score,
    evaluate_beta_limits, evaluate_risk_limits, suggest_limits, weight_exposures,
};
use ronda_portfolio::{PortfolioView, RiskScore, WorstCaseAnalysis};
use ronda_traits::error::{Result, RondaError};
use ronda_traits::stats;
use ronda_traits::types::{
    Date, DateWindow, FactorId, FactorProxies, Holdings, MonthlySeries, PriceSeries, Provenance,
    ProxyMap, RiskLimits, Ticker,
};
use ronda_traits::EngineConfig;

use crate::results::{
    Objective, OptimizationResult, RiskAnalysisResult, StockAnalysis, WhatIfResult,
};

/// Default benchmark for the simple market regression path.
const DEFAULT_BENCHMARK: &str = "SPY";

/// The portfolio risk engine.
///
/// Construct once, reuse across analyses: the disk cache and in-memory
/// LRUs make repeated analyses over the same universe cheap, and results
/// are independent of the cache state.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: EngineConfig,
    data: DataContext,
    rate_aggregation: RateAggregation,
}

impl RiskEngine {
    /// Build an engine with the given configuration, reading the
    /// provider API key from the environment.
    ///
    /// # Errors
    ///
    /// Fails when `FMP_API_KEY` is unset.
    pub fn from_env(config: EngineConfig) -> Result<Self> {
        let data = DataContext::from_env(&config)?;
        Ok(Self::with_context(config, data))
    }

    /// Build an engine around an existing data context.
    pub fn with_context(config: EngineConfig, data: DataContext) -> Self {
        Self {
            config,
            data,
            rate_aggregation: RateAggregation::Sum,
        }
    }

    /// The engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Override the key-rate aggregation rule (default: sum).
    pub fn set_rate_aggregation(&mut self, aggregation: RateAggregation) {
        self.rate_aggregation = aggregation;
    }

    fn resolve_window(&self, window: Option<DateWindow>) -> Result<DateWindow> {
        match window {
            Some(w) => Ok(w),
            None => DateWindow::new(
                self.config.analysis_window.start,
                self.config.analysis_window.end,
            ),
        }
    }

    /// Full portfolio analysis: view, limit checks, worst-case betas,
    /// score and suggested limits.
    ///
    /// # Errors
    ///
    /// Propagates data, regression and numeric failures; an out-of-limit
    /// portfolio is not an error.
    pub async fn analyze_portfolio(
        &self,
        holdings: &Holdings,
        window: Option<DateWindow>,
        proxies: &ProxyMap,
        limits: &RiskLimits,
    ) -> Result<RiskAnalysisResult> {
        let window = self.resolve_window(window)?;
        let standardized = self.standardize(holdings).await?;
        self.analyze_weights(
            standardized.weights,
            (
                standardized.net_exposure,
                standardized.gross_exposure,
                standardized.leverage,
            ),
            &window,
            proxies,
            limits,
            None,
        )
        .await
    }

    /// What-if analysis: apply a delta or replacement shift, re-run the
    /// identical analysis on baseline and scenario, and compare.
    ///
    /// # Errors
    ///
    /// Propagates shift-parse failures (`InputInvalid`) and any analysis
    /// failure on either leg.
    pub async fn analyze_what_if(
        &self,
        holdings: &Holdings,
        window: Option<DateWindow>,
        proxies: &ProxyMap,
        limits: &RiskLimits,
        shift: &PortfolioShift,
    ) -> Result<WhatIfResult> {
        let window = self.resolve_window(window)?;
        let standardized = self.standardize(holdings).await?;
        let base_weights = standardized.weights.clone();

        let scenario_weights =
            apply_shift(shift, &base_weights, self.config.normalize_weights)?;
        let scenario_exposures =
            weight_exposures(&scenario_weights, &self.config.cash_proxies);

        let baseline = self
            .analyze_weights(
                base_weights,
                (
                    standardized.net_exposure,
                    standardized.gross_exposure,
                    standardized.leverage,
                ),
                &window,
                proxies,
                limits,
                None,
            )
            .await?;
        let scenario = self
            .analyze_weights(
                scenario_weights.clone(),
                scenario_exposures,
                &window,
                proxies,
                limits,
                None,
            )
            .await?;

        let risk_comparison =
            compare_tables(&baseline.risk_checks, &scenario.risk_checks, "Actual");
        let beta_comparison = compare_tables(
            &baseline.beta_checks,
            &scenario.beta_checks,
            "Portfolio Beta",
        );

        Ok(WhatIfResult {
            baseline,
            scenario,
            scenario_weights,
            risk_comparison,
            beta_comparison,
        })
    }

    /// Optimize the portfolio under the limit system and re-analyze at
    /// the optimal weights.
    ///
    /// # Errors
    ///
    /// [`RondaError::Infeasible`] / [`RondaError::Unbounded`] from the
    /// solver, plus any analysis failure.
    pub async fn optimize(
        &self,
        holdings: &Holdings,
        window: Option<DateWindow>,
        proxies: &ProxyMap,
        limits: &RiskLimits,
        objective: Objective,
        bounds: Option<Bounds>,
        expected_returns: Option<&BTreeMap<Ticker, f64>>,
    ) -> Result<OptimizationResult> {
        let window = self.resolve_window(window)?;
        let standardized = self.standardize(holdings).await?;
        let base = self
            .analyze_weights(
                standardized.weights.clone(),
                (
                    standardized.net_exposure,
                    standardized.gross_exposure,
                    standardized.leverage,
                ),
                &window,
                proxies,
                limits,
                None,
            )
            .await?;

        let tickers = base.view.tickers.clone();
        let n = tickers.len();
        let mut bounds = bounds.unwrap_or_else(|| Bounds::long_only(n));
        if let Some(cap) = limits.concentration_limits.max_single_stock_weight {
            bounds = bounds.with_max_weight(cap);
        }
        let caps = beta_caps(&base.view, &base.worst_case);
        let settings = OptimizerSettings::default();
        let sigma: &Array2<f64> = &base.view.covariance;

        let mut mu_pairs: Option<Vec<(Ticker, f64)>> = None;
        let optimal = match objective {
            Objective::MinVariance => run_min_variance(sigma, &bounds, &caps, &settings)?,
            Objective::MaxReturn => {
                let mu = self
                    .resolve_expected_returns(&tickers, expected_returns, window.end)
                    .await?;
                mu_pairs = Some(
                    tickers
                        .iter()
                        .cloned()
                        .zip(mu.iter().copied())
                        .collect(),
                );
                let ceiling_monthly = limits
                    .portfolio_limits
                    .max_volatility
                    .map(|annual| annual / stats::MONTHS_PER_YEAR.sqrt());
                run_max_return(&mu, sigma, &bounds, &caps, ceiling_monthly, &settings)?
            }
        };

        let weights: Vec<(Ticker, f64)> = tickers
            .iter()
            .cloned()
            .zip(optimal.iter().copied())
            .collect();
        let exposures = weight_exposures(&weights, &self.config.cash_proxies);
        let analysis = self
            .analyze_weights(weights.clone(), exposures, &window, proxies, limits, mu_pairs)
            .await?;

        Ok(OptimizationResult {
            objective,
            weights,
            analysis,
        })
    }

    /// Analyze a single stock: multi-factor profile when a proxy bundle
    /// is supplied, simple market regression otherwise.
    ///
    /// # Errors
    ///
    /// Propagates data and regression failures.
    pub async fn analyze_stock(
        &self,
        ticker: &Ticker,
        window: Option<DateWindow>,
        proxies: Option<&FactorProxies>,
    ) -> Result<StockAnalysis> {
        let window = self.resolve_window(window)?;
        let prices = self
            .data
            .fetch_monthly_total_return_price(ticker, Some(&window))
            .await?;
        let returns = prices.series.restrict(&window).simple_returns(
            self.config
                .data_quality
                .min_observations_for_returns_calculation,
        )?;

        if let Some(bundle) = proxies {
            let proxy_series = self.fetch_proxy_series(std::slice::from_ref(bundle), &window).await;
            let rate_deltas = if self.config.is_rate_eligible(bundle.asset_class.as_deref()) {
                self.fetch_rate_deltas(&window).await?
            } else {
                Vec::new()
            };
            let profile = self.build_stock_profile(
                ticker.clone(),
                &prices,
                returns,
                bundle,
                &proxy_series,
                rate_deltas,
                &window,
            )?;
            return Ok(StockAnalysis::MultiFactor {
                ticker: ticker.clone(),
                window,
                profile,
            });
        }

        let benchmark = Ticker::new(DEFAULT_BENCHMARK);
        let bench_prices = self
            .data
            .fetch_monthly_total_return_price(&benchmark, Some(&window))
            .await?;
        let bench_returns = bench_prices.series.restrict(&window).simple_returns(
            self.config
                .data_quality
                .min_observations_for_returns_calculation,
        )?;
        let (_, cols) = ronda_traits::types::align(&[&returns, &bench_returns]);
        let capm = single_factor_ols(
            &cols[0],
            &cols[1],
            self.config
                .data_quality
                .min_observations_for_capm_regression,
        )?;
        Ok(StockAnalysis::MarketRegression {
            ticker: ticker.clone(),
            window,
            benchmark,
            capm,
            vol_monthly: returns.vol(),
            vol_annual: returns.annual_vol(),
        })
    }

    /// Compute the composite risk score for an existing view.
    pub fn risk_score(
        &self,
        view: &PortfolioView,
        limits: &RiskLimits,
        worst_case: &WorstCaseAnalysis,
    ) -> RiskScore {
        compute_risk_score(view, limits, worst_case, &self.config.risk_score)
    }

    // ------------------------------------------------------------------
    // Internal pipeline
    // ------------------------------------------------------------------

    async fn standardize(
        &self,
        holdings: &Holdings,
    ) -> Result<ronda_portfolio::StandardizedPortfolio> {
        // Shares-form positions need a spot price for conversion.
        let mut latest_prices = BTreeMap::new();
        for (ticker, holding) in holdings.iter() {
            if matches!(holding, ronda_traits::types::Holding::Shares(_)) {
                let price = self.data.latest_price(ticker).await?;
                latest_prices.insert(ticker.clone(), price);
            }
        }
        ronda_portfolio::standardize_portfolio(
            holdings,
            &latest_prices,
            &self.config.cash_proxies,
            self.config.normalize_weights,
        )
    }

    /// The shared analysis path: panel, profiles, view, worst-case,
    /// checks, score. Every public operation funnels through here.
    async fn analyze_weights(
        &self,
        weights: Vec<(Ticker, f64)>,
        exposures: (f64, f64, f64),
        window: &DateWindow,
        proxies: &ProxyMap,
        limits: &RiskLimits,
        expected_returns: Option<Vec<(Ticker, f64)>>,
    ) -> Result<RiskAnalysisResult> {
        let tickers: Vec<Ticker> = weights.iter().map(|(t, _)| t.clone()).collect();
        info!(n_positions = tickers.len(), %window, "analyzing portfolio");

        // Holdings price panel (parallel, bounded).
        let prices = self
            .data
            .fetch_total_return_panel(&tickers, Some(window))
            .await?;

        let mut categories = BTreeMap::new();
        let mut industry_proxy = BTreeMap::new();
        for ticker in &tickers {
            if let Some(bundle) = proxies.get(ticker)
                && let Some(industry) = &bundle.industry
            {
                categories.insert(ticker.clone(), industry.to_string());
                industry_proxy.insert(ticker.clone(), industry.clone());
            }
        }

        let price_refs: Vec<&PriceSeries> = prices.iter().map(|p| p.as_ref()).collect();
        let panel = ReturnsPanel::from_price_series(
            &price_refs,
            Some(window),
            self.config
                .data_quality
                .min_observations_for_returns_calculation,
            PanelMeta {
                categories: categories.clone(),
                ..PanelMeta::default()
            },
        )?;

        // Proxy returns for the analysis window, fetched once.
        let bundles: Vec<&FactorProxies> =
            tickers.iter().filter_map(|t| proxies.get(t)).collect();
        let bundle_slices: Vec<FactorProxies> = bundles.iter().map(|b| (*b).clone()).collect();
        let proxy_series = self.fetch_proxy_series(&bundle_slices, window).await;

        let any_rate_eligible = bundles
            .iter()
            .any(|b| self.config.is_rate_eligible(b.asset_class.as_deref()));
        let rate_deltas = if any_rate_eligible {
            self.fetch_rate_deltas(window).await?
        } else {
            Vec::new()
        };

        // Per-stock profiles.
        let mut profiles = Vec::with_capacity(tickers.len());
        for (ticker, stock_prices) in tickers.iter().zip(&prices) {
            let returns = stock_prices.series.restrict(window).simple_returns(
                self.config
                    .data_quality
                    .min_observations_for_returns_calculation,
            )?;
            let bundle = proxies.get(ticker).cloned().unwrap_or_default();
            let deltas = if self.config.is_rate_eligible(bundle.asset_class.as_deref()) {
                rate_deltas.clone()
            } else {
                Vec::new()
            };
            profiles.push(self.build_stock_profile(
                ticker.clone(),
                stock_prices,
                returns,
                &bundle,
                &proxy_series,
                deltas,
                window,
            )?);
        }

        let view = build_portfolio_view(ViewInputs {
            weights,
            panel: &panel,
            profiles,
            industry_proxy,
            net_exposure: exposures.0,
            gross_exposure: exposures.1,
            leverage: exposures.2,
            expected_returns,
        })?;

        // Worst-case beta caps over the long lookback.
        let worst_case = self.worst_case_analysis(proxies, limits, window).await?;

        let risk_checks = evaluate_risk_limits(&view, limits);
        let beta_checks = evaluate_beta_limits(
            &view.portfolio_factor_betas,
            &worst_case,
            Some(&view.industry_variance.per_industry_group_beta),
        );
        let risk_score = compute_risk_score(&view, limits, &worst_case, &self.config.risk_score);
        let suggested_limits = suggest_limits(&view, limits, &worst_case);

        Ok(RiskAnalysisResult {
            view,
            risk_checks,
            beta_checks,
            worst_case,
            risk_score,
            suggested_limits,
        })
    }

    /// Fetch every unique proxy ticker referenced by the bundles and
    /// return the per-ticker outcome (peers may fail without aborting).
    async fn fetch_proxy_series(
        &self,
        bundles: &[FactorProxies],
        window: &DateWindow,
    ) -> BTreeMap<Ticker, Arc<PriceSeries>> {
        let mut unique: BTreeSet<Ticker> = BTreeSet::new();
        for bundle in bundles {
            unique.extend(bundle.proxy_tickers().into_iter().cloned());
        }
        let unique: Vec<Ticker> = unique.into_iter().collect();
        let mut out = BTreeMap::new();
        for (ticker, result) in self
            .data
            .fetch_total_return_results(&unique, Some(window))
            .await
        {
            match result {
                Ok(series) => {
                    out.insert(ticker, series);
                }
                Err(e) => warn!(proxy = %ticker, error = %e, "proxy fetch failed"),
            }
        }
        out
    }

    async fn fetch_rate_deltas(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<(ronda_traits::config::Maturity, MonthlySeries)>> {
        let frame = self
            .data
            .fetch_monthly_treasury_yield_levels(Some(window))
            .await?;
        Ok(prepare_rate_factors(&frame, self.config.rate_factors.scale))
    }

    /// Assemble profile inputs for one stock and run the regressions.
    #[allow(clippy::too_many_arguments)]
    fn build_stock_profile(
        &self,
        ticker: Ticker,
        prices: &PriceSeries,
        stock_returns: MonthlySeries,
        bundle: &FactorProxies,
        proxy_series: &BTreeMap<Ticker, Arc<PriceSeries>>,
        rate_deltas: Vec<(ronda_traits::config::Maturity, MonthlySeries)>,
        window: &DateWindow,
    ) -> Result<StockFactorProfile> {
        let min_obs = self
            .config
            .data_quality
            .min_observations_for_returns_calculation;
        let mut flags = Vec::new();
        if prices.provenance == Provenance::PriceOnly {
            flags.push(DataQualityFlag::PriceOnlyFallback {
                ticker: ticker.clone(),
            });
        }

        let mut factor_returns: Vec<(FactorId, MonthlySeries)> = Vec::new();
        for factor in [
            FactorId::Market,
            FactorId::Momentum,
            FactorId::Value,
            FactorId::Industry,
        ] {
            let Some(proxy) = bundle.style_proxy(factor) else {
                continue;
            };
            let series = proxy_series.get(proxy).ok_or_else(|| {
                RondaError::DataUnavailable(format!(
                    "{factor} proxy {proxy} did not resolve over {window}"
                ))
            })?;
            factor_returns.push((
                factor,
                series.series.restrict(window).simple_returns(min_obs)?,
            ));
        }

        if !bundle.subindustry.is_empty() {
            let peers: Vec<(Ticker, Option<MonthlySeries>)> = bundle
                .subindustry
                .iter()
                .map(|peer| {
                    let returns = proxy_series.get(peer).and_then(|s| {
                        s.series.restrict(window).simple_returns(min_obs).ok()
                    });
                    (peer.clone(), returns)
                })
                .collect();
            let outcome = peer_median_returns(
                &peers,
                self.config.data_quality.min_valid_peers_for_median,
                self.config.data_quality.max_peer_drop_rate,
            );
            if outcome.excessive_drop_rate {
                flags.push(DataQualityFlag::ThinPeerCoverage {
                    dropped: outcome.dropped.len(),
                    total: bundle.subindustry.len(),
                });
            }
            if let Some(median) = outcome.series {
                factor_returns.push((FactorId::Subindustry, median));
            }
        }

        build_profile(
            ProfileInputs {
                ticker,
                stock_returns,
                factor_returns,
                rate_deltas,
                flags,
            },
            &self.config.data_quality,
            self.config.rate_factors.min_required_maturities,
            &self.rate_aggregation,
        )
    }

    /// Worst-case scan over the configured lookback window.
    async fn worst_case_analysis(
        &self,
        proxies: &ProxyMap,
        limits: &RiskLimits,
        window: &DateWindow,
    ) -> Result<WorstCaseAnalysis> {
        let lookback_start = subtract_years(
            window.end,
            self.config.worst_case_lookback_years,
        );
        let lookback = DateWindow::new(lookback_start, window.end)?;
        let min_obs = self
            .config
            .data_quality
            .min_observations_for_returns_calculation;

        // Which factor roles does each unique proxy serve?
        let mut roles: BTreeMap<Ticker, BTreeSet<FactorId>> = BTreeMap::new();
        for bundle in proxies.values() {
            for factor in [
                FactorId::Market,
                FactorId::Momentum,
                FactorId::Value,
                FactorId::Industry,
            ] {
                if let Some(proxy) = bundle.style_proxy(factor) {
                    roles.entry(proxy.clone()).or_default().insert(factor);
                }
            }
        }
        let role_tickers: Vec<Ticker> = roles.keys().cloned().collect();
        let fetched = self
            .data
            .fetch_total_return_results(&role_tickers, Some(&lookback))
            .await;

        let mut proxy_returns = Vec::new();
        for (ticker, result) in fetched {
            match result {
                Ok(prices) => match prices.series.restrict(&lookback).simple_returns(min_obs) {
                    Ok(returns) => {
                        let factor_roles: Vec<FactorId> =
                            roles[&ticker].iter().copied().collect();
                        proxy_returns.push((ticker, factor_roles, returns));
                    }
                    Err(e) => warn!(proxy = %ticker, error = %e, "worst-case returns skipped"),
                },
                Err(e) => warn!(proxy = %ticker, error = %e, "worst-case fetch skipped"),
            }
        }

        // Subindustry medians per stock over the lookback window.
        let bundles: Vec<FactorProxies> = proxies.values().cloned().collect();
        let peer_series = self.fetch_proxy_series(&bundles, &lookback).await;
        let mut subindustry_medians = Vec::new();
        for (stock, bundle) in proxies {
            if bundle.subindustry.is_empty() {
                continue;
            }
            let peers: Vec<(Ticker, Option<MonthlySeries>)> = bundle
                .subindustry
                .iter()
                .map(|peer| {
                    let returns = peer_series.get(peer).and_then(|s| {
                        s.series.restrict(&lookback).simple_returns(min_obs).ok()
                    });
                    (peer.clone(), returns)
                })
                .collect();
            let outcome = peer_median_returns(
                &peers,
                self.config.data_quality.min_valid_peers_for_median,
                self.config.data_quality.max_peer_drop_rate,
            );
            if let Some(median) = outcome.series {
                subindustry_medians.push((stock.clone(), median));
            }
        }

        let any_rate_eligible = proxies
            .values()
            .any(|b| self.config.is_rate_eligible(b.asset_class.as_deref()));
        let rate_factor = if any_rate_eligible {
            let deltas = self.fetch_rate_deltas(&lookback).await?;
            if deltas.is_empty() {
                None
            } else {
                Some(self.rate_aggregation.collapse_series(&deltas))
            }
        } else {
            None
        };

        let max_loss = limits
            .max_single_factor_loss
            .or(limits.portfolio_limits.max_loss)
            .unwrap_or(self.config.default_loss_tolerance);

        Ok(calc_max_factor_betas(
            &WorstCaseInputs {
                proxy_returns,
                subindustry_medians,
                rate_factor,
                window: lookback,
            },
            max_loss,
        ))
    }

    async fn resolve_expected_returns(
        &self,
        tickers: &[Ticker],
        supplied: Option<&BTreeMap<Ticker, f64>>,
        window_end: Date,
    ) -> Result<Array1<f64>> {
        let lookback = DateWindow::new(
            subtract_years(window_end, self.config.expected_returns_lookback_years),
            window_end,
        )?;
        let mut mu = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            if let Some(value) = supplied.and_then(|m| m.get(ticker)) {
                mu.push(*value);
                continue;
            }
            if self.config.is_cash_proxy(ticker) {
                mu.push(self.config.cash_proxy_fallback_return);
                continue;
            }
            let estimated = match self
                .data
                .fetch_monthly_total_return_price(ticker, Some(&lookback))
                .await
            {
                Ok(prices) => {
                    let returns = prices.series.restrict(&lookback).simple_returns(2).ok();
                    returns.and_then(|r| {
                        (r.len()
                            >= self
                                .config
                                .data_quality
                                .min_observations_for_expected_returns)
                            .then(|| stats::annualize_return(r.mean()))
                    })
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "expected return estimation failed");
                    None
                }
            };
            mu.push(estimated.unwrap_or_else(|| {
                warn!(ticker = %ticker, "using fallback expected return");
                self.config.expected_returns_fallback_default
            }));
        }
        Ok(Array1::from_vec(mu))
    }
}

/// Beta caps for the optimizer: one per finite factor cap, plus one per
/// industry proxy with holdings mapped to it.
fn beta_caps(view: &PortfolioView, worst_case: &WorstCaseAnalysis) -> Vec<BetaCap> {
    let mut caps = Vec::new();
    for (j, factor) in FactorId::ALL.iter().enumerate() {
        if !factor.in_factor_bucket() {
            continue;
        }
        let cap = worst_case.max_beta(*factor);
        if !cap.is_finite() {
            continue;
        }
        caps.push(BetaCap {
            label: format!("{factor} beta"),
            coefficients: view.stock_betas.column(j).to_vec(),
            cap,
        });
    }

    let industry_col = FactorId::ALL
        .iter()
        .position(|f| *f == FactorId::Industry)
        .expect("industry is a canonical factor");
    for (proxy, cap) in &worst_case.max_betas_by_proxy {
        if !cap.is_finite() {
            continue;
        }
        // Coefficients: the industry beta column masked to holdings that
        // map to this proxy.
        let coefficients: Vec<f64> = view
            .tickers
            .iter()
            .enumerate()
            .map(|(i, ticker)| {
                if view.industry_proxy.get(ticker) == Some(proxy) {
                    view.stock_betas[(i, industry_col)]
                } else {
                    0.0
                }
            })
            .collect();
        if coefficients.iter().all(|c| *c == 0.0) {
            continue;
        }
        caps.push(BetaCap {
            label: format!("industry {proxy} beta"),
            coefficients,
            cap: *cap,
        });
    }
    caps
}

/// Move a date back by whole years, clamping leap days.
fn subtract_years(date: Date, years: u32) -> Date {
    let target_year = date.year() - years as i32;
    Date::from_ymd_opt(target_year, date.month(), date.day())
        .or_else(|| Date::from_ymd_opt(target_year, date.month(), 28))
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_subtract_years_plain() {
        assert_eq!(subtract_years(d(2024, 6, 30), 10), d(2014, 6, 30));
    }

    #[test]
    fn test_subtract_years_leap_day() {
        assert_eq!(subtract_years(d(2024, 2, 29), 1), d(2023, 2, 28));
    }
}
