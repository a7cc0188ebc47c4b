//! Ronda CLI binary.
//!
//! Command-line interface for the Ronda portfolio risk engine.

mod input;
mod report;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ronda::Objective;
use ronda::prelude::*;

use crate::input::{PortfolioDoc, load_limits, resolve_shift};

#[derive(Parser)]
#[command(name = "ronda")]
#[command(about = "Portfolio risk analysis engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a portfolio against its risk limits
    Analyze {
        /// Portfolio JSON file
        #[arg(short, long, default_value = "portfolio.json")]
        portfolio: PathBuf,

        /// Risk limits JSON file
        #[arg(short, long, default_value = "risk_limits.json")]
        limits: PathBuf,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Analyze a single stock
    Stock {
        /// Ticker symbol
        ticker: String,

        /// Portfolio file supplying the stock's factor proxies
        #[arg(short, long)]
        portfolio: Option<PathBuf>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Evaluate a what-if scenario
    WhatIf {
        /// Portfolio JSON file
        #[arg(short, long, default_value = "portfolio.json")]
        portfolio: PathBuf,

        /// Risk limits JSON file
        #[arg(short, long, default_value = "risk_limits.json")]
        limits: PathBuf,

        /// Scenario JSON file (new_weights or delta)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Inline shifts, e.g. "AAPL:+200bp,GOOGL:-200bp"
        #[arg(short, long)]
        delta: Option<String>,
    },

    /// Optimize the portfolio under its risk limits
    Optimize {
        /// Portfolio JSON file
        #[arg(short, long, default_value = "portfolio.json")]
        portfolio: PathBuf,

        /// Risk limits JSON file
        #[arg(short, long, default_value = "risk_limits.json")]
        limits: PathBuf,

        /// Objective (min-variance or max-return)
        #[arg(short, long, default_value = "min-variance")]
        objective: String,
    },

    /// Print the risk score for a portfolio
    Score {
        /// Portfolio JSON file
        #[arg(short, long, default_value = "portfolio.json")]
        portfolio: PathBuf,

        /// Risk limits JSON file
        #[arg(short, long, default_value = "risk_limits.json")]
        limits: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
    doc_window: Option<DateWindow>,
) -> Result<Option<DateWindow>> {
    match (start, end) {
        (Some(s), Some(e)) => {
            let start = s.parse::<Date>()?;
            let end = e.parse::<Date>()?;
            Ok(Some(DateWindow::new(start, end)?))
        }
        (None, None) => Ok(doc_window),
        _ => anyhow::bail!("provide both --start and --end, or neither"),
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let engine = RiskEngine::from_env(EngineConfig::default())?;

    match cli.command {
        Commands::Analyze {
            portfolio,
            limits,
            start,
            end,
        } => {
            let doc = PortfolioDoc::load(&portfolio)?;
            let limits = load_limits(&limits)?;
            let window = parse_window(start.as_deref(), end.as_deref(), doc.window()?)?;
            let result = engine
                .analyze_portfolio(&doc.holdings()?, window, &doc.factor_proxies, &limits)
                .await?;
            report::print_analysis(doc.name.as_deref(), &result);
        }

        Commands::Stock {
            ticker,
            portfolio,
            start,
            end,
        } => {
            let ticker = Ticker::new(&ticker);
            let (proxies, doc_window) = match portfolio {
                Some(path) => {
                    let doc = PortfolioDoc::load(&path)?;
                    (doc.factor_proxies.get(&ticker).cloned(), doc.window()?)
                }
                None => (None, None),
            };
            let window = parse_window(start.as_deref(), end.as_deref(), doc_window)?;
            let analysis = engine
                .analyze_stock(&ticker, window, proxies.as_ref())
                .await?;
            report::print_stock(&analysis);
        }

        Commands::WhatIf {
            portfolio,
            limits,
            scenario,
            delta,
        } => {
            let doc = PortfolioDoc::load(&portfolio)?;
            let limits = load_limits(&limits)?;
            let shift = resolve_shift(scenario.as_deref(), delta.as_deref())?;
            let result = engine
                .analyze_what_if(
                    &doc.holdings()?,
                    doc.window()?,
                    &doc.factor_proxies,
                    &limits,
                    &shift,
                )
                .await?;
            report::print_what_if(&result);
        }

        Commands::Optimize {
            portfolio,
            limits,
            objective,
        } => {
            let doc = PortfolioDoc::load(&portfolio)?;
            let limits = load_limits(&limits)?;
            let objective = match objective.as_str() {
                "min-variance" | "min_variance" => Objective::MinVariance,
                "max-return" | "max_return" => Objective::MaxReturn,
                other => anyhow::bail!("unknown objective \"{other}\""),
            };
            let result = engine
                .optimize(
                    &doc.holdings()?,
                    doc.window()?,
                    &doc.factor_proxies,
                    &limits,
                    objective,
                    None,
                    if doc.expected_returns.is_empty() {
                        None
                    } else {
                        Some(&doc.expected_returns)
                    },
                )
                .await?;
            report::print_optimization(&result);
        }

        Commands::Score { portfolio, limits } => {
            let doc = PortfolioDoc::load(&portfolio)?;
            let limits = load_limits(&limits)?;
            let result = engine
                .analyze_portfolio(&doc.holdings()?, doc.window()?, &doc.factor_proxies, &limits)
                .await?;
            report::print_score(&result);
        }
    }

    Ok(())
}
