//! Document loading for the CLI.
//!
//! Portfolios, risk limits and what-if scenarios are plain JSON files.
//! Holdings entries carry exactly one of `weight`, `dollars` or `shares`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use ronda::prelude::*;
use ronda_opt::parse_shift;

/// A portfolio document.
///
/// ```json
/// {
///   "name": "Growth book",
///   "holdings": {
///     "AAPL": { "weight": 0.5 },
///     "MSFT": { "shares": 25 }
///   },
///   "expected_returns": { "AAPL": 0.08 },
///   "factor_proxies": {
///     "AAPL": { "market": "SPY", "momentum": "MTUM", "value": "VLUE", "industry": "XLK" }
///   }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct PortfolioDoc {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Positions by ticker.
    pub holdings: BTreeMap<Ticker, Holding>,
    /// Optional expected annual returns by ticker.
    #[serde(default)]
    pub expected_returns: BTreeMap<Ticker, f64>,
    /// Factor proxy bundles by ticker.
    #[serde(default)]
    pub factor_proxies: ProxyMap,
    /// Optional analysis window override.
    #[serde(default)]
    pub start_date: Option<Date>,
    /// Optional analysis window override.
    #[serde(default)]
    pub end_date: Option<Date>,
}

impl PortfolioDoc {
    /// Load and validate a portfolio document.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading portfolio file {}", path.display()))?;
        let doc: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing portfolio file {}", path.display()))?;
        if doc.holdings.is_empty() {
            anyhow::bail!("portfolio file {} has no holdings", path.display());
        }
        Ok(doc)
    }

    /// The holdings in document order.
    pub fn holdings(&self) -> Result<Holdings> {
        let mut holdings = Holdings::new();
        for (ticker, holding) in &self.holdings {
            holdings.insert(ticker.clone(), *holding)?;
        }
        Ok(holdings)
    }

    /// The analysis window override, when both dates are present.
    pub fn window(&self) -> Result<Option<DateWindow>> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Ok(Some(DateWindow::new(start, end)?)),
            _ => Ok(None),
        }
    }
}

/// Load a risk limits document.
pub fn load_limits(path: &Path) -> Result<RiskLimits> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading risk limits file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing risk limits file {}", path.display()))
}

/// A what-if scenario document: a full replacement takes precedence over
/// deltas when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioDoc {
    /// Full replacement weights (decimals).
    #[serde(default)]
    pub new_weights: BTreeMap<Ticker, f64>,
    /// Incremental shifts as strings (`"+200bp"`, `"1.5%"`, `"-0.01"`).
    #[serde(default)]
    pub delta: BTreeMap<Ticker, String>,
}

/// Resolve the scenario shift from an optional file and an optional
/// inline delta list, the inline list overriding overlapping tickers.
pub fn resolve_shift(
    scenario_path: Option<&Path>,
    inline_delta: Option<&str>,
) -> Result<PortfolioShift> {
    let doc = match scenario_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario file {}", path.display()))?;
            serde_json::from_str::<ScenarioDoc>(&raw)
                .with_context(|| format!("parsing scenario file {}", path.display()))?
        }
        None => ScenarioDoc::default(),
    };

    if !doc.new_weights.is_empty() {
        return Ok(PortfolioShift::Replacement(
            doc.new_weights.into_iter().collect(),
        ));
    }

    let mut deltas: Vec<(Ticker, f64)> = Vec::new();
    for (ticker, shift) in &doc.delta {
        deltas.push((ticker.clone(), parse_shift(shift)?));
    }
    if let Some(inline) = inline_delta {
        for pair in inline.split(',') {
            let (ticker, shift) = pair
                .split_once(':')
                .with_context(|| format!("delta entry \"{pair}\" is not TICKER:SHIFT"))?;
            let ticker = Ticker::new(ticker);
            let value = parse_shift(shift)?;
            if let Some(entry) = deltas.iter_mut().find(|(t, _)| *t == ticker) {
                entry.1 = value;
            } else {
                deltas.push((ticker, value));
            }
        }
    }
    if deltas.is_empty() {
        anyhow::bail!("no delta or new_weights provided");
    }
    Ok(PortfolioShift::Deltas(deltas))
}
