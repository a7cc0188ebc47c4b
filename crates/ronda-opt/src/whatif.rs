//! What-if scenario application.
//!
//! The applier only produces the shifted weight vector and the comparison
//! tables; baseline and scenario analyses both run through the exact same
//! portfolio-view pipeline upstream, so a zero-delta scenario reproduces
//! the direct analysis bit for bit.

use ronda_traits::error::Result;
use ronda_traits::table::{Table, Value};
use ronda_traits::types::Ticker;

use crate::delta::PortfolioShift;

/// Apply `shift` to the baseline weights.
///
/// # Errors
///
/// Propagates parse/normalization failures from the shift.
pub fn apply_shift(
    shift: &PortfolioShift,
    base: &[(Ticker, f64)],
    normalize: bool,
) -> Result<Vec<(Ticker, f64)>> {
    shift.apply(base, normalize)
}

/// Build a side-by-side comparison of a base and a scenario check table.
///
/// Rows are matched by label (union, base order first); `value_column`
/// is compared numerically and the scenario's pass flag is carried over.
pub fn compare_tables(base: &Table, scenario: &Table, value_column: &str) -> Table {
    let mut out = Table::new(
        format!("{}: Base vs Scenario", scenario.title),
        base.index_label.clone(),
        &["Base", "Scenario", "Change", "Pass"],
    );

    let mut labels: Vec<String> = base.index().to_vec();
    for label in scenario.index() {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }

    for label in labels {
        let base_val = base.get(&label, value_column).and_then(Value::as_num);
        let new_val = scenario.get(&label, value_column).and_then(Value::as_num);
        let pass = scenario
            .get(&label, "Pass")
            .and_then(Value::as_bool)
            .or_else(|| base.get(&label, "Pass").and_then(Value::as_bool));
        let cell = |v: Option<f64>| v.map_or(Value::Text("-".to_string()), Value::Num);
        let change = match (base_val, new_val) {
            (Some(b), Some(n)) => Value::Num(n - b),
            _ => Value::Text("-".to_string()),
        };
        out.push_row(
            label,
            vec![
                cell(base_val),
                cell(new_val),
                change,
                pass.map_or(Value::Text("-".to_string()), Value::Bool),
            ],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checks(title: &str, vol: f64, pass: bool) -> Table {
        let mut t = Table::new(title, "Metric", &["Actual", "Limit", "Pass"]);
        t.push_row(
            "Volatility",
            vec![Value::Num(vol), Value::Num(0.20), Value::Bool(pass)],
        );
        t
    }

    #[test]
    fn test_compare_tables_change_column() {
        let base = checks("Risk Checks", 0.18, true);
        let scenario = checks("Risk Checks", 0.22, false);
        let cmp = compare_tables(&base, &scenario, "Actual");
        assert_relative_eq!(
            cmp.get("Volatility", "Change").and_then(Value::as_num).unwrap(),
            0.04,
            epsilon = 1e-12
        );
        assert_eq!(
            cmp.get("Volatility", "Pass").and_then(Value::as_bool),
            Some(false)
        );
    }

    #[test]
    fn test_compare_tables_union_rows() {
        let base = checks("Risk Checks", 0.18, true);
        let mut scenario = checks("Risk Checks", 0.19, true);
        scenario.push_row(
            "Max Weight",
            vec![Value::Num(0.4), Value::Num(0.3), Value::Bool(false)],
        );
        let cmp = compare_tables(&base, &scenario, "Actual");
        assert_eq!(cmp.len(), 2);
        assert_eq!(
            cmp.get("Max Weight", "Base").map(|v| v.to_string()),
            Some("-".to_string())
        );
    }

    #[test]
    fn test_zero_shift_identity_through_apply() {
        let base = vec![(Ticker::new("AAPL"), 0.5), (Ticker::new("MSFT"), 0.5)];
        let out = apply_shift(&PortfolioShift::zero(), &base, false).unwrap();
        assert_eq!(out, base);
    }
}
