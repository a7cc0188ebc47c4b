//! Subindustry peer-median factor construction.

use tracing::warn;

use ronda_traits::types::{Date, MonthlySeries, Ticker};

/// Outcome of building a peer-median series.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMedianOutcome {
    /// The cross-sectional median return series, when enough peers
    /// resolved. `None` omits the subindustry factor for the stock.
    pub series: Option<MonthlySeries>,
    /// Peers that contributed observations.
    pub used: Vec<Ticker>,
    /// Peers dropped for missing data.
    pub dropped: Vec<Ticker>,
    /// Whether the drop rate exceeded the configured warning threshold.
    pub excessive_drop_rate: bool,
}

/// Cross-sectional equal-weight median of peer monthly returns.
///
/// Each month's median is taken over the peers that have an observation
/// in that month. Peers whose series failed to resolve are dropped with a
/// warning; when fewer than `min_valid_peers` remain the subindustry
/// factor is omitted entirely.
pub fn peer_median_returns(
    peers: &[(Ticker, Option<MonthlySeries>)],
    min_valid_peers: usize,
    max_drop_rate: f64,
) -> PeerMedianOutcome {
    let mut used = Vec::new();
    let mut dropped = Vec::new();
    let mut valid: Vec<&MonthlySeries> = Vec::new();
    for (ticker, series) in peers {
        match series {
            Some(s) if !s.is_empty() => {
                used.push(ticker.clone());
                valid.push(s);
            }
            _ => {
                warn!(peer = %ticker, "peer ticker failed to resolve, dropping");
                dropped.push(ticker.clone());
            }
        }
    }

    let total = peers.len();
    let excessive_drop_rate =
        total > 0 && dropped.len() as f64 / total as f64 > max_drop_rate;

    if valid.len() < min_valid_peers.max(1) {
        return PeerMedianOutcome {
            series: None,
            used,
            dropped,
            excessive_drop_rate,
        };
    }

    // Union of observation months across the valid peers.
    let mut dates: Vec<Date> = valid
        .iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect();
    dates.sort_unstable();
    dates.dedup();

    let mut out_dates = Vec::with_capacity(dates.len());
    let mut out_values = Vec::with_capacity(dates.len());
    for date in dates {
        let mut row: Vec<f64> = valid.iter().filter_map(|s| s.get(date)).collect();
        if row.is_empty() {
            continue;
        }
        row.sort_by(|a, b| a.partial_cmp(b).expect("peer returns are finite"));
        let mid = row.len() / 2;
        let median = if row.len() % 2 == 1 {
            row[mid]
        } else {
            (row[mid - 1] + row[mid]) / 2.0
        };
        out_dates.push(date);
        out_values.push(median);
    }

    let series = MonthlySeries::new(out_dates, out_values)
        .expect("median dates are ascending and values finite");
    PeerMedianOutcome {
        series: Some(series),
        used,
        dropped,
        excessive_drop_rate,
    }
}
