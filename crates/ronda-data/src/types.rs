//! Wire types and month-end resampling.

use chrono::Datelike;
use serde::Deserialize;

use ronda_traits::config::Maturity;
use ronda_traits::types::{Date, MonthlySeries};

/// One end-of-day close row from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EodRow {
    /// Trading date, `YYYY-MM-DD`.
    pub date: String,
    /// Close price.
    #[serde(default)]
    pub close: Option<f64>,
}

/// One end-of-day dividend-adjusted row from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustedRow {
    /// Trading date, `YYYY-MM-DD`.
    pub date: String,
    /// Dividend-adjusted close price.
    #[serde(rename = "adjClose", default)]
    pub adj_close: Option<f64>,
}

/// One daily Treasury yield row, levels in percentage points.
#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryRow {
    /// Observation date, `YYYY-MM-DD`.
    pub date: String,
    /// 2-year yield.
    #[serde(default)]
    pub year2: Option<f64>,
    /// 5-year yield.
    #[serde(default)]
    pub year5: Option<f64>,
    /// 10-year yield.
    #[serde(default)]
    pub year10: Option<f64>,
    /// 30-year yield.
    #[serde(default)]
    pub year30: Option<f64>,
}

impl TreasuryRow {
    /// Yield level for `maturity`, if reported.
    pub const fn level(&self, maturity: Maturity) -> Option<f64> {
        match maturity {
            Maturity::Y2 => self.year2,
            Maturity::Y5 => self.year5,
            Maturity::Y10 => self.year10,
            Maturity::Y30 => self.year30,
        }
    }
}

/// Month-end Treasury yield levels, one series per maturity, in
/// percentage points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct YieldFrame {
    entries: Vec<(Maturity, MonthlySeries)>,
}

impl YieldFrame {
    /// Build a frame from `(maturity, series)` pairs in configured order.
    pub const fn new(entries: Vec<(Maturity, MonthlySeries)>) -> Self {
        Self { entries }
    }

    /// Maturities with data, in configured order.
    pub fn maturities(&self) -> Vec<Maturity> {
        self.entries.iter().map(|(m, _)| *m).collect()
    }

    /// Yield level series for `maturity`, if present.
    pub fn get(&self, maturity: Maturity) -> Option<&MonthlySeries> {
        self.entries
            .iter()
            .find(|(m, _)| *m == maturity)
            .map(|(_, s)| s)
    }

    /// Number of maturities with data.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no maturity has data.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(maturity, series)` pairs in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &(Maturity, MonthlySeries)> {
        self.entries.iter()
    }
}

/// Last calendar day of the month containing `date`.
pub(crate) fn month_end(date: Date) -> Date {
    let (y, m) = (date.year(), date.month());
    let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
    Date::from_ymd_opt(ny, nm, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("month end is always valid")
}

/// Resample daily observations to a calendar month-end series: the last
/// observed value in each month, indexed at the calendar month end.
///
/// Non-finite and unparsable rows are dropped.
pub(crate) fn resample_to_month_end<I>(rows: I) -> MonthlySeries
where
    I: IntoIterator<Item = (Date, f64)>,
{
    let mut latest: std::collections::BTreeMap<Date, (Date, f64)> = std::collections::BTreeMap::new();
    for (date, value) in rows {
        if !value.is_finite() {
            continue;
        }
        let me = month_end(date);
        match latest.get(&me) {
            Some((seen, _)) if *seen >= date => {}
            _ => {
                latest.insert(me, (date, value));
            }
        }
    }
    let dates: Vec<Date> = latest.keys().copied().collect();
    let values: Vec<f64> = latest.values().map(|(_, v)| *v).collect();
    MonthlySeries::new(dates, values).expect("BTreeMap keys are ascending and values finite")
}

/// Parse a provider `YYYY-MM-DD` date string.
pub(crate) fn parse_date(raw: &str) -> Option<Date> {
    Date::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_end() {
        assert_eq!(month_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(month_end(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(month_end(d(2023, 12, 31)), d(2023, 12, 31));
    }

    #[test]
    fn test_resample_keeps_last_observation() {
        let series = resample_to_month_end([
            (d(2024, 1, 3), 10.0),
            (d(2024, 1, 31), 11.0),
            (d(2024, 1, 15), 10.5),
            (d(2024, 2, 14), 12.0),
        ]);
        assert_eq!(series.dates(), &[d(2024, 1, 31), d(2024, 2, 29)]);
        assert_eq!(series.values(), &[11.0, 12.0]);
    }

    #[test]
    fn test_resample_drops_non_finite() {
        let series = resample_to_month_end([(d(2024, 1, 31), f64::NAN), (d(2024, 1, 30), 9.0)]);
        assert_eq!(series.values(), &[9.0]);
    }

    #[test]
    fn test_adjusted_row_field_rename() {
        let row: AdjustedRow =
            serde_json::from_str(r#"{"date": "2024-01-31", "adjClose": 187.5}"#).unwrap();
        assert_eq!(row.adj_close, Some(187.5));
    }
}
