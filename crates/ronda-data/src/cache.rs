//! Disk-backed columnar cache.
//!
//! Series are stored as zstd-compressed parquet files keyed by a
//! deterministic hash of `(function, subject, window, schema version)`.
//! Corrupt entries are deleted on read and recomputed by the caller.
//! Writes go to a temp file and are renamed into place, so a partial
//! result is never readable and concurrent writers to the same key
//! serialize on the final rename. Failures are never cached.

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::Datelike;
use polars::prelude::*;
use tracing::warn;

use ronda_traits::config::Maturity;
use ronda_traits::types::{Date, MonthlySeries, PriceSeries, Provenance, Ticker};

use crate::types::YieldFrame;
use crate::{DataError, Result};

/// Bumped whenever the on-disk layout changes; part of every cache key.
const CACHE_SCHEMA_VERSION: u32 = 1;

/// Days from the Common Era to the Unix epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Loader function name.
    pub function: &'static str,
    /// Ticker symbol or maturity-set identifier.
    pub subject: String,
    /// Normalized window start, if any.
    pub start: Option<Date>,
    /// Normalized window end, if any.
    pub end: Option<Date>,
}

impl CacheKey {
    /// Create a key for `function` over `subject` and an optional window.
    pub fn new(
        function: &'static str,
        subject: impl Into<String>,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Self {
        Self {
            function,
            subject: subject.into(),
            start,
            end,
        }
    }

    /// Stable 64-bit digest of the key, schema version included.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        CACHE_SCHEMA_VERSION.hash(&mut hasher);
        self.function.hash(&mut hasher);
        self.subject.hash(&mut hasher);
        self.start.hash(&mut hasher);
        self.end.hash(&mut hasher);
        hasher.finish()
    }
}

/// Parquet-backed key-value store for month-end series.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let prefix: String = key
            .subject
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.root
            .join(format!("{prefix}_{:016x}.parquet", key.digest()))
    }

    /// Load a cached price series. Corrupt files are deleted and reported
    /// as a miss so the loader recomputes.
    pub fn load_price_series(&self, ticker: &Ticker, key: &CacheKey) -> Option<PriceSeries> {
        let path = self.path_for(key);
        if !path.is_file() {
            return None;
        }
        match read_series_file(&path) {
            Ok((provenance, series)) => Some(PriceSeries {
                ticker: ticker.clone(),
                provenance,
                series,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, deleting");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store a price series under `key` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Cache`] on I/O or encoding failure.
    pub fn store_price_series(&self, key: &CacheKey, series: &PriceSeries) -> Result<()> {
        let mut df = series_to_frame(series.provenance.as_str(), &series.series)
            .map_err(|e| DataError::Cache(e.to_string()))?;
        self.write_atomic(key, &mut df)
    }

    /// Load a cached Treasury yield frame for the requested maturities.
    pub fn load_yield_frame(&self, key: &CacheKey, maturities: &[Maturity]) -> Option<YieldFrame> {
        let path = self.path_for(key);
        if !path.is_file() {
            return None;
        }
        match read_yield_file(&path, maturities) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, deleting");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store a Treasury yield frame under `key` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Cache`] on I/O or encoding failure.
    pub fn store_yield_frame(&self, key: &CacheKey, frame: &YieldFrame) -> Result<()> {
        let mut df = yields_to_frame(frame).map_err(|e| DataError::Cache(e.to_string()))?;
        self.write_atomic(key, &mut df)
    }

    fn write_atomic(&self, key: &CacheKey, df: &mut DataFrame) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| DataError::Cache(e.to_string()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("parquet.tmp");
        let file = File::create(&tmp).map_err(|e| DataError::Cache(e.to_string()))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(df)
            .map_err(|e| DataError::Cache(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(())
    }
}

fn date_to_days(date: Date) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Option<Date> {
    Date::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

fn series_to_frame(value_column: &str, series: &MonthlySeries) -> PolarsResult<DataFrame> {
    let days: Vec<i32> = series.dates().iter().map(|d| date_to_days(*d)).collect();
    let values: Vec<f64> = series.values().to_vec();
    DataFrame::new(vec![
        Column::new("date".into(), days),
        Column::new(value_column.into(), values),
    ])
}

fn frame_dates(df: &DataFrame) -> PolarsResult<Vec<Date>> {
    df.column("date")?
        .as_materialized_series()
        .i32()?
        .into_iter()
        .map(|d| {
            d.and_then(days_to_date).ok_or_else(|| {
                PolarsError::ComputeError("invalid date value in cache file".into())
            })
        })
        .collect()
}

fn frame_f64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn read_series_file(path: &Path) -> PolarsResult<(Provenance, MonthlySeries)> {
    let file = File::open(path)
        .map_err(|e| PolarsError::ComputeError(format!("open cache file: {e}").into()))?;
    let df = ParquetReader::new(file).finish()?;

    let value_column = df
        .get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .find(|n| n != "date")
        .ok_or_else(|| PolarsError::ComputeError("cache file has no value column".into()))?;
    let provenance = if value_column == Provenance::TotalReturn.as_str() {
        Provenance::TotalReturn
    } else {
        Provenance::PriceOnly
    };

    let dates = frame_dates(&df)?;
    let raw = frame_f64_column(&df, &value_column)?;
    let (dates, values): (Vec<Date>, Vec<f64>) = dates
        .into_iter()
        .zip(raw)
        .filter(|(_, v)| v.is_finite())
        .unzip();
    let series = MonthlySeries::new(dates, values)
        .map_err(|e| PolarsError::ComputeError(e.to_string().into()))?;
    Ok((provenance, series))
}

fn yields_to_frame(frame: &YieldFrame) -> PolarsResult<DataFrame> {
    // Union of all maturities' dates, NaN where a maturity has no level.
    let mut all_dates: Vec<Date> = frame
        .iter()
        .flat_map(|(_, s)| s.dates().iter().copied())
        .collect();
    all_dates.sort_unstable();
    all_dates.dedup();

    let mut columns = vec![Column::new(
        "date".into(),
        all_dates
            .iter()
            .map(|d| date_to_days(*d))
            .collect::<Vec<i32>>(),
    )];
    for (maturity, series) in frame.iter() {
        let values: Vec<f64> = all_dates
            .iter()
            .map(|d| series.get(*d).unwrap_or(f64::NAN))
            .collect();
        columns.push(Column::new(maturity.provider_field().into(), values));
    }
    DataFrame::new(columns)
}

fn read_yield_file(path: &Path, maturities: &[Maturity]) -> PolarsResult<YieldFrame> {
    let file = File::open(path)
        .map_err(|e| PolarsError::ComputeError(format!("open cache file: {e}").into()))?;
    let df = ParquetReader::new(file).finish()?;
    let dates = frame_dates(&df)?;

    let mut entries = Vec::new();
    for maturity in maturities {
        let Ok(raw) = frame_f64_column(&df, maturity.provider_field()) else {
            continue;
        };
        let (md, mv): (Vec<Date>, Vec<f64>) = dates
            .iter()
            .copied()
            .zip(raw)
            .filter(|(_, v)| v.is_finite())
            .unzip();
        if mv.is_empty() {
            continue;
        }
        let series = MonthlySeries::new(md, mv)
            .map_err(|e| PolarsError::ComputeError(e.to_string().into()))?;
        entries.push((*maturity, series));
    }
    Ok(YieldFrame::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_series() -> MonthlySeries {
        MonthlySeries::new(
            vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)],
            vec![100.0, 102.5, 99.75],
        )
        .unwrap()
    }

    #[test]
    fn test_key_digest_is_stable_and_window_sensitive() {
        let a = CacheKey::new("monthly_close", "AAPL", Some(d(2020, 1, 31)), None);
        let b = CacheKey::new("monthly_close", "AAPL", Some(d(2020, 1, 31)), None);
        let c = CacheKey::new("monthly_close", "AAPL", Some(d(2021, 1, 31)), None);
        let e = CacheKey::new("monthly_total_return", "AAPL", Some(d(2020, 1, 31)), None);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_ne!(a.digest(), e.digest());
    }

    #[test]
    fn test_price_series_round_trip() {
        let dir = std::env::temp_dir().join(format!("ronda_cache_test_{}", std::process::id()));
        let cache = DiskCache::new(&dir);
        let ticker = Ticker::new("AAPL");
        let key = CacheKey::new("monthly_total_return", ticker.as_str(), None, None);
        let original = PriceSeries {
            ticker: ticker.clone(),
            provenance: Provenance::TotalReturn,
            series: sample_series(),
        };

        assert!(cache.load_price_series(&ticker, &key).is_none());
        cache.store_price_series(&key, &original).unwrap();
        let loaded = cache.load_price_series(&ticker, &key).unwrap();
        assert_eq!(loaded, original);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_entry_is_evicted() {
        let dir = std::env::temp_dir().join(format!("ronda_cache_corrupt_{}", std::process::id()));
        let cache = DiskCache::new(&dir);
        let ticker = Ticker::new("MSFT");
        let key = CacheKey::new("monthly_close", ticker.as_str(), None, None);

        std::fs::create_dir_all(&dir).unwrap();
        let path = cache.path_for(&key);
        std::fs::write(&path, b"not parquet").unwrap();

        assert!(cache.load_price_series(&ticker, &key).is_none());
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_yield_frame_round_trip() {
        let dir = std::env::temp_dir().join(format!("ronda_cache_yield_{}", std::process::id()));
        let cache = DiskCache::new(&dir);
        let key = CacheKey::new("treasury_yields", "UST2Y_UST10Y", None, None);

        let short = MonthlySeries::new(vec![d(2024, 1, 31)], vec![4.25]).unwrap();
        let long = MonthlySeries::new(vec![d(2024, 1, 31), d(2024, 2, 29)], vec![3.9, 4.0]).unwrap();
        let frame = YieldFrame::new(vec![(Maturity::Y2, short), (Maturity::Y10, long)]);

        cache.store_yield_frame(&key, &frame).unwrap();
        let loaded = cache
            .load_yield_frame(&key, &[Maturity::Y2, Maturity::Y10, Maturity::Y30])
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(Maturity::Y10).unwrap().len(), 2);
        assert_eq!(loaded.get(Maturity::Y2).unwrap().len(), 1);
        assert!(loaded.get(Maturity::Y30).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
