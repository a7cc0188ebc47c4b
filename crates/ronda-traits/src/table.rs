//! A small named-column tabular record for human-readable output.
//!
//! All engine math runs on dense arrays with explicit index vectors; this
//! type exists only at the edges, for allocations tables, limit check
//! tables and side-by-side comparisons. It never feeds back into the math.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Numeric cell.
    Num(f64),
    /// Boolean cell (pass/fail columns).
    Bool(bool),
    /// Text cell.
    Text(String),
}

impl Value {
    /// The numeric value, if this is a [`Value::Num`] cell.
    pub const fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// The boolean value, if this is a [`Value::Bool`] cell.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(v) => write!(f, "{v:.6}"),
            Self::Bool(true) => f.write_str("PASS"),
            Self::Bool(false) => f.write_str("FAIL"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A labeled-row, named-column table of [`Value`] cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table title, shown by the Display impl.
    pub title: String,
    /// Label of the index column.
    pub index_label: String,
    /// Column names, in display order.
    pub columns: Vec<String>,
    index: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given title, index label and columns.
    pub fn new(
        title: impl Into<String>,
        index_label: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        Self {
            title: title.into(),
            index_label: index_label.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            index: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a labeled row. The row length must match the column count.
    pub fn push_row(&mut self, label: impl Into<String>, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.index.push(label.into());
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row labels in display order.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Cell at `(row_label, column)`, if present.
    pub fn get(&self, row_label: &str, column: &str) -> Option<&Value> {
        let r = self.index.iter().position(|l| l == row_label)?;
        let c = self.columns.iter().position(|l| l == column)?;
        self.rows.get(r)?.get(c)
    }

    /// Iterate `(label, row)` pairs in display order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.index
            .iter()
            .map(String::as_str)
            .zip(self.rows.iter().map(Vec::as_slice))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self
            .index
            .iter()
            .map(String::len)
            .chain([self.index_label.len()])
            .max()
            .unwrap_or(8)
            + 2;
        writeln!(f, "{}", self.title)?;
        write!(f, "{:<label_width$}", self.index_label)?;
        for col in &self.columns {
            write!(f, " {col:>14}")?;
        }
        writeln!(f)?;
        for (label, row) in self.iter_rows() {
            write!(f, "{label:<label_width$}")?;
            for cell in row {
                write!(f, " {:>14}", cell.to_string())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_round_trip() {
        let mut table = Table::new("Risk Checks", "Metric", &["Actual", "Limit", "Pass"]);
        table.push_row(
            "Volatility",
            vec![Value::Num(0.22), Value::Num(0.20), Value::Bool(false)],
        );
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("Volatility", "Actual").and_then(Value::as_num),
            Some(0.22)
        );
        assert_eq!(
            table.get("Volatility", "Pass").and_then(Value::as_bool),
            Some(false)
        );
        assert!(table.get("Volatility", "Missing").is_none());
    }

    #[test]
    fn test_display_contains_cells() {
        let mut table = Table::new("Allocations", "Ticker", &["Portfolio Weight"]);
        table.push_row("AAPL", vec![Value::Num(0.5)]);
        let rendered = table.to_string();
        assert!(rendered.contains("AAPL"));
        assert!(rendered.contains("0.5"));
    }
}
