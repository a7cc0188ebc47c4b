//! Terminal report formatting.
//!
//! Pure presentation over the engine's result objects; nothing here feeds
//! back into the analysis.

use ronda::prelude::*;
use ronda::{OptimizationResult, RiskAnalysisResult, StockAnalysis, WhatIfResult};

fn banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║ {title:<60} ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

fn section(title: &str) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{title}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
}

/// Print the full analysis report.
pub fn print_analysis(name: Option<&str>, result: &RiskAnalysisResult) {
    banner(name.unwrap_or("Portfolio Risk Analysis"));

    let view = &result.view;
    println!("{}", view.allocations);

    section("EXPOSURE");
    println!("  Net Exposure:      {:>10.2}", view.net_exposure);
    println!("  Gross Exposure:    {:>10.2}", view.gross_exposure);
    if view.leverage.is_finite() {
        println!("  Leverage:          {:>9.2}x", view.leverage);
    } else {
        println!("  Leverage:          {:>10}", "n/a");
    }
    println!("  Herfindahl Index:  {:>10.4}", view.herfindahl);
    println!();

    section("VOLATILITY");
    println!("  Monthly:           {:>9.4}%", view.volatility_monthly * 100.0);
    println!("  Annual:            {:>9.4}%", view.volatility_annual * 100.0);
    println!();

    section("VARIANCE DECOMPOSITION");
    let vd = &view.variance_decomposition;
    println!("  Portfolio Variance:     {:>10.6}", vd.portfolio_variance);
    println!(
        "  Idiosyncratic:          {:>10.6}  ({:>4.0}%)",
        vd.idiosyncratic_variance,
        vd.idiosyncratic_pct * 100.0
    );
    println!(
        "  Factor:                 {:>10.6}  ({:>4.0}%)",
        vd.factor_variance,
        vd.factor_pct * 100.0
    );
    println!();
    for (factor, pct) in &vd.factor_breakdown_pct {
        println!("    {:<14} {:>5.0}%", factor.to_string(), pct * 100.0);
    }
    println!();

    if !view.industry_variance.percent_of_portfolio.is_empty() {
        section("INDUSTRY VARIANCE");
        for (proxy, pct) in &view.industry_variance.percent_of_portfolio {
            println!("  {:<10} {:>6.1}%", proxy.to_string(), pct * 100.0);
        }
        println!();
        println!("  Per-Industry Group Betas:");
        let mut betas = view.industry_variance.per_industry_group_beta.clone();
        betas.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (proxy, beta) in betas {
            println!("  {:<10} {beta:>+8.4}", proxy.to_string());
        }
        println!();
    }

    section("TOP VARIANCE CONTRIBUTORS (EULER)");
    let mut euler = view.euler_variance_pct.clone();
    euler.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (ticker, pct) in euler.iter().take(10) {
        println!("  {:<10} {:>6.1}%", ticker.to_string(), pct * 100.0);
    }
    println!();

    section("RISK CHECKS");
    println!("{}", result.risk_checks);

    section("BETA CHECKS");
    println!("{}", result.beta_checks);

    print_score(result);

    if !view.warnings.is_empty() {
        section("WARNINGS");
        for warning in &view.warnings {
            println!("  - {warning}");
        }
        println!();
    }
}

/// Print the risk score block.
pub fn print_score(result: &RiskAnalysisResult) {
    let score = &result.risk_score;
    section("RISK SCORE");
    println!("  Overall:            {:>4}/100  ({})", score.overall, score.category);
    println!("  Factor Risk:        {:>4}/100", score.component_scores.factor_risk);
    println!(
        "  Concentration Risk: {:>4}/100",
        score.component_scores.concentration_risk
    );
    println!(
        "  Volatility Risk:    {:>4}/100",
        score.component_scores.volatility_risk
    );
    println!("  Sector Risk:        {:>4}/100", score.component_scores.sector_risk);
    println!();

    if !score.potential_losses.by_factor.is_empty() {
        println!("  Potential Losses (worst historical month):");
        for loss in score.potential_losses.by_factor.iter().take(6) {
            println!(
                "    {:<28} β {:>+6.2} × {:>+7.2}% → {:>+7.2}%",
                loss.factor,
                loss.beta,
                loss.worst_month * 100.0,
                loss.potential_loss * 100.0
            );
        }
        println!(
            "    Loss tolerance: {:.1}%",
            score.potential_losses.max_loss_limit * 100.0
        );
        println!();
    }

    if !score.risk_factors.is_empty() {
        println!("  Risk Factors:");
        for factor in &score.risk_factors {
            println!("    - {factor}");
        }
        println!();
    }
    if !score.recommendations.is_empty() {
        println!("  Recommendations:");
        for rec in &score.recommendations {
            println!("    - {rec}");
        }
        println!();
    }
}

/// Print a single-stock analysis.
pub fn print_stock(analysis: &StockAnalysis) {
    match analysis {
        StockAnalysis::MultiFactor {
            ticker,
            window,
            profile,
        } => {
            banner(&format!("{ticker}: Multi-Factor Profile"));
            println!("Window: {window}\n");
            println!("{:<14} {:>10}", "Factor", "Beta");
            println!("{}", "─".repeat(26));
            for (factor, beta) in &profile.betas {
                println!("{:<14} {beta:>10.4}", factor.to_string());
            }
            println!();
            println!("Adj R²:          {:>10.4}", profile.r2_adj);
            println!("Idio Vol (m):    {:>9.4}%", profile.idio_vol_monthly * 100.0);
            println!("Total Vol (m):   {:>9.4}%", profile.total_vol_monthly * 100.0);
            println!("Total Vol (a):   {:>9.4}%", profile.total_vol_annual * 100.0);
            println!("Observations:    {:>10}", profile.n_obs);
            if profile.is_degraded() {
                println!("\nData quality flags:");
                for flag in profile.flags() {
                    println!("  - {flag}");
                }
            }
        }
        StockAnalysis::MarketRegression {
            ticker,
            window,
            benchmark,
            capm,
            vol_monthly,
            vol_annual,
        } => {
            banner(&format!("{ticker}: Market Regression vs {benchmark}"));
            println!("Window: {window}\n");
            println!("Beta:            {:>10.4}", capm.beta);
            println!("Alpha (m):       {:>9.4}%", capm.alpha_monthly * 100.0);
            println!("R²:              {:>10.4}", capm.r2);
            println!("Idio Vol (m):    {:>9.4}%", capm.idio_vol_monthly * 100.0);
            println!("Total Vol (m):   {:>9.4}%", vol_monthly * 100.0);
            println!("Total Vol (a):   {:>9.4}%", vol_annual * 100.0);
            println!("Observations:    {:>10}", capm.n_obs);
        }
    }
}

/// Print the what-if comparison report.
pub fn print_what_if(result: &WhatIfResult) {
    banner("What-If Scenario");

    println!("Scenario weights:");
    for (ticker, weight) in &result.scenario_weights {
        println!("  {:<10} {:>7.2}%", ticker.to_string(), weight * 100.0);
    }
    println!();

    section("RISK CHECKS: BASE vs SCENARIO");
    println!("{}", result.risk_comparison);

    section("BETA CHECKS: BASE vs SCENARIO");
    println!("{}", result.beta_comparison);

    println!(
        "Scenario score: {} ({}), was {} ({})",
        result.scenario.risk_score.overall,
        result.scenario.risk_score.category,
        result.baseline.risk_score.overall,
        result.baseline.risk_score.category,
    );
}

/// Print the optimization report.
pub fn print_optimization(result: &OptimizationResult) {
    banner("Portfolio Optimization");

    println!("Objective: {:?}", result.objective);
    println!();
    println!("Optimal weights:");
    let mut weights = result.weights.clone();
    weights.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (ticker, weight) in weights {
        if weight.abs() > 0.0005 {
            println!("  {:<10} {:>7.2}%", ticker.to_string(), weight * 100.0);
        }
    }
    println!();

    section("RISK CHECKS AT OPTIMUM");
    println!("{}", result.analysis.risk_checks);

    section("BETA CHECKS AT OPTIMUM");
    println!("{}", result.analysis.beta_checks);

    print_score(&result.analysis);
}
