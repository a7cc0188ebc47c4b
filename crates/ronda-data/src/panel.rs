//! Aligned monthly returns panels.
//!
//! The panel is the canonical input for every numerical routine. Series
//! are concatenated column-wise on the union of their month-end dates and
//! NaN rows are *not* dropped globally: per-category and per-subset
//! analyses compute on their own overlapping observation sets, and callers
//! that require a strict common window apply their own intersection via
//! [`ReturnsPanel::complete_rows`].

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use ndarray::{Array2, ArrayView1, ArrayView2};

use ronda_traits::error::{Result, RondaError};
use ronda_traits::stats;
use ronda_traits::types::{Date, DateWindow, MonthlySeries, PriceSeries, Provenance, Ticker};

/// Panel metadata attached at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelMeta {
    /// The analysis window the panel was built for, if constrained.
    pub window: Option<DateWindow>,
    /// Stable hash of the universe (sorted tickers per category), used by
    /// downstream caching; independent of input order.
    pub universe_hash: u64,
    /// Ticker → category map.
    pub categories: BTreeMap<Ticker, String>,
    /// Optional user-facing display labels.
    pub labels: BTreeMap<Ticker, String>,
    /// Price provenance per ticker, for data-quality reporting only.
    pub provenance: BTreeMap<Ticker, Provenance>,
}

/// A column-aligned monthly returns panel with NaN retention.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsPanel {
    tickers: Vec<Ticker>,
    dates: Vec<Date>,
    /// Rows = dates, columns = tickers; NaN marks a missing observation.
    values: Array2<f64>,
    meta: PanelMeta,
}

impl ReturnsPanel {
    /// Assemble a panel from per-ticker return series on the union of
    /// their dates. Column order follows the input order.
    pub fn from_return_series(series: Vec<(Ticker, MonthlySeries)>, mut meta: PanelMeta) -> Self {
        let mut dates: Vec<Date> = series
            .iter()
            .flat_map(|(_, s)| s.dates().iter().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();

        let tickers: Vec<Ticker> = series.iter().map(|(t, _)| t.clone()).collect();
        let mut values = Array2::from_elem((dates.len(), tickers.len()), f64::NAN);
        for (col, (_, s)) in series.iter().enumerate() {
            for (d, v) in s.dates().iter().zip(s.values()) {
                let row = dates.binary_search(d).expect("date is in the union index");
                values[(row, col)] = *v;
            }
        }
        meta.universe_hash = universe_hash(&tickers, &meta.categories);
        Self {
            tickers,
            dates,
            values,
            meta,
        }
    }

    /// Build a panel of monthly simple returns from price series,
    /// restricted to `window` when given.
    ///
    /// # Errors
    ///
    /// Propagates [`RondaError::InsufficientData`] with the offending
    /// ticker attached when a price series is too short.
    pub fn from_price_series(
        prices: &[&PriceSeries],
        window: Option<&DateWindow>,
        min_price_obs: usize,
        mut meta: PanelMeta,
    ) -> Result<Self> {
        let mut series = Vec::with_capacity(prices.len());
        for p in prices {
            let restricted = match window {
                Some(w) => p.series.restrict(w),
                None => p.series.clone(),
            };
            let returns = restricted.simple_returns(min_price_obs).map_err(|e| match e {
                RondaError::InsufficientData(msg) => {
                    RondaError::InsufficientData(format!("{}: {msg}", p.ticker))
                }
                other => other,
            })?;
            meta.provenance.insert(p.ticker.clone(), p.provenance);
            series.push((p.ticker.clone(), returns));
        }
        meta.window = window.copied();
        Ok(Self::from_return_series(series, meta))
    }

    /// Tickers in column order.
    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    /// Union month-end index, ascending.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// The raw values matrix (rows = dates, columns = tickers).
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Panel metadata.
    pub const fn meta(&self) -> &PanelMeta {
        &self.meta
    }

    /// Number of tickers.
    pub fn width(&self) -> usize {
        self.tickers.len()
    }

    /// Column position of `ticker`, if present.
    pub fn position(&self, ticker: &Ticker) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// The return column for `ticker`, NaN where unobserved.
    pub fn column(&self, ticker: &Ticker) -> Option<ArrayView1<'_, f64>> {
        self.position(ticker).map(|i| self.values.column(i))
    }

    /// Rows where every ticker has an observation, as `(dates, matrix)`.
    pub fn complete_rows(&self) -> (Vec<Date>, Array2<f64>) {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|&r| self.values.row(r).iter().all(|v| v.is_finite()))
            .collect();
        let dates = keep.iter().map(|&r| self.dates[r]).collect();
        let mut matrix = Array2::zeros((keep.len(), self.width()));
        for (out_row, &r) in keep.iter().enumerate() {
            matrix.row_mut(out_row).assign(&self.values.row(r));
        }
        (dates, matrix)
    }

    /// Pairwise-complete sample covariance matrix of the columns.
    ///
    /// Each entry uses the rows where both tickers have observations;
    /// entries with fewer than two overlapping observations are NaN.
    pub fn covariance(&self) -> Array2<f64> {
        let n = self.width();
        let mut cov = Array2::from_elem((n, n), f64::NAN);
        for i in 0..n {
            for j in i..n {
                let (a, b) = self.overlap(i, j);
                if a.len() >= 2 {
                    let c = stats::sample_covariance(&a, &b);
                    cov[(i, j)] = c;
                    cov[(j, i)] = c;
                }
            }
        }
        cov
    }

    /// Pairwise-complete sample correlation matrix of the columns.
    pub fn correlation(&self) -> Array2<f64> {
        let n = self.width();
        let mut corr = Array2::from_elem((n, n), f64::NAN);
        for i in 0..n {
            for j in i..n {
                let (a, b) = self.overlap(i, j);
                if a.len() >= 2 {
                    let sa = stats::sample_std(&a);
                    let sb = stats::sample_std(&b);
                    let c = if sa > stats::MIN_DENOMINATOR && sb > stats::MIN_DENOMINATOR {
                        stats::sample_covariance(&a, &b) / (sa * sb)
                    } else {
                        f64::NAN
                    };
                    corr[(i, j)] = c;
                    corr[(j, i)] = c;
                }
            }
        }
        corr
    }

    fn overlap(&self, i: usize, j: usize) -> (Vec<f64>, Vec<f64>) {
        let ci = self.values.column(i);
        let cj = self.values.column(j);
        let mut a = Vec::new();
        let mut b = Vec::new();
        for (x, y) in ci.iter().zip(cj.iter()) {
            if x.is_finite() && y.is_finite() {
                a.push(*x);
                b.push(*y);
            }
        }
        (a, b)
    }
}

/// Stable universe hash: sorted tickers within each category, independent
/// of input order, so equivalent universes share cache entries.
pub fn universe_hash(tickers: &[Ticker], categories: &BTreeMap<Ticker, String>) -> u64 {
    let mut by_category: BTreeMap<&str, Vec<&Ticker>> = BTreeMap::new();
    for t in tickers {
        let cat = categories.get(t).map_or("", String::as_str);
        by_category.entry(cat).or_default().push(t);
    }
    let mut hasher = DefaultHasher::new();
    for (cat, mut members) in by_category {
        members.sort();
        cat.hash(&mut hasher);
        for t in members {
            t.as_str().hash(&mut hasher);
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(dates: &[Date], values: &[f64]) -> MonthlySeries {
        MonthlySeries::new(dates.to_vec(), values.to_vec()).unwrap()
    }

    fn two_column_panel() -> ReturnsPanel {
        let months = [d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)];
        ReturnsPanel::from_return_series(
            vec![
                (Ticker::new("AAA"), series(&months, &[0.01, 0.02, -0.01])),
                (Ticker::new("BBB"), series(&months[1..], &[0.03, 0.00])),
            ],
            PanelMeta::default(),
        )
    }

    #[test]
    fn test_union_index_retains_nan() {
        let panel = two_column_panel();
        assert_eq!(panel.dates().len(), 3);
        let bbb = panel.column(&Ticker::new("BBB")).unwrap();
        assert!(bbb[0].is_nan());
        assert_relative_eq!(bbb[1], 0.03);
    }

    #[test]
    fn test_complete_rows_intersects() {
        let panel = two_column_panel();
        let (dates, matrix) = panel.complete_rows();
        assert_eq!(dates, vec![d(2024, 2, 29), d(2024, 3, 31)]);
        assert_eq!(matrix.nrows(), 2);
        assert_relative_eq!(matrix[(0, 0)], 0.02);
    }

    #[test]
    fn test_pairwise_covariance_uses_overlap() {
        let panel = two_column_panel();
        let cov = panel.covariance();
        // AAA with itself: all three observations.
        assert_relative_eq!(
            cov[(0, 0)],
            ronda_traits::stats::sample_variance(&[0.01, 0.02, -0.01]),
            epsilon = 1e-15
        );
        // AAA vs BBB: only the two overlapping months.
        assert_relative_eq!(
            cov[(0, 1)],
            ronda_traits::stats::sample_covariance(&[0.02, -0.01], &[0.03, 0.00]),
            epsilon = 1e-15
        );
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-15);
    }

    #[test]
    fn test_correlation_of_identical_columns_is_one() {
        let months = [d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)];
        let r = [0.01, 0.02, -0.015];
        let panel = ReturnsPanel::from_return_series(
            vec![
                (Ticker::new("AAA"), series(&months, &r)),
                (Ticker::new("BBB"), series(&months, &r)),
            ],
            PanelMeta::default(),
        );
        let corr = panel.correlation();
        assert_relative_eq!(corr[(0, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_universe_hash_order_independent() {
        let a = [Ticker::new("AAPL"), Ticker::new("MSFT")];
        let b = [Ticker::new("MSFT"), Ticker::new("AAPL")];
        let categories = BTreeMap::new();
        assert_eq!(
            universe_hash(&a, &categories),
            universe_hash(&b, &categories)
        );

        let c = [Ticker::new("MSFT"), Ticker::new("GOOGL")];
        assert_ne!(
            universe_hash(&a, &categories),
            universe_hash(&c, &categories)
        );
    }

    #[test]
    fn test_from_price_series_window_and_returns() {
        let prices = PriceSeries {
            ticker: Ticker::new("AAA"),
            provenance: Provenance::TotalReturn,
            series: series(
                &[d(2023, 12, 31), d(2024, 1, 31), d(2024, 2, 29)],
                &[100.0, 110.0, 121.0],
            ),
        };
        let window = DateWindow::new(d(2023, 12, 1), d(2024, 2, 29)).unwrap();
        let panel =
            ReturnsPanel::from_price_series(&[&prices], Some(&window), 2, PanelMeta::default())
                .unwrap();
        assert_eq!(panel.dates().len(), 2);
        let col = panel.column(&Ticker::new("AAA")).unwrap();
        assert_relative_eq!(col[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(col[1], 0.10, epsilon = 1e-12);
        assert_eq!(
            panel.meta().provenance[&Ticker::new("AAA")],
            Provenance::TotalReturn
        );
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let prices = PriceSeries {
            ticker: Ticker::new("AAA"),
            provenance: Provenance::TotalReturn,
            series: series(&[d(2024, 1, 31)], &[100.0]),
        };
        let err = ReturnsPanel::from_price_series(&[&prices], None, 2, PanelMeta::default())
            .unwrap_err();
        assert!(matches!(err, RondaError::InsufficientData(_)));
        assert!(err.to_string().contains("AAA"));
    }
}
