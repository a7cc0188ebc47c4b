//! What-if shift parsing.
//!
//! Shift strings accept basis points (`"+200bp"`, `"-75bps"`), percent
//! (`"1.5%"`) and plain decimals (`"-0.01"`). Parsing is strict: unknown
//! units and non-finite values are rejected. Formatting a parsed value
//! with [`format_shift`] and parsing it back is the identity.

use serde::{Deserialize, Serialize};

use ronda_portfolio::normalize_weights;
use ronda_traits::error::{Result, RondaError};
use ronda_traits::types::Ticker;

/// Convert a human-friendly shift string to a decimal.
///
/// `"+200bp"`, `"-75bps"`, `"1.5%"`, `"-0.01"` → `0.02`, `-0.0075`,
/// `0.015`, `-0.01`.
///
/// # Errors
///
/// [`RondaError::InputInvalid`] on unknown units, empty input, or
/// non-finite values.
pub fn parse_shift(txt: &str) -> Result<f64> {
    let t: String = txt.trim().to_lowercase().replace(' ', "");
    if t.is_empty() {
        return Err(RondaError::input("empty shift string"));
    }

    let (number, scale) = if let Some(stripped) = t.strip_suffix('%') {
        (stripped, 0.01)
    } else if let Some(stripped) = t.strip_suffix("bps") {
        (stripped, 1e-4)
    } else if let Some(stripped) = t.strip_suffix("bp") {
        (stripped, 1e-4)
    } else {
        (t.as_str(), 1.0)
    };

    // Reject alphabetic residue so "5x" or "bp200" cannot sneak through
    // f64 parsing as NaN/inf spellings either.
    if number.is_empty() || number.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(RondaError::input(format!("unparsable shift \"{txt}\"")));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| RondaError::input(format!("unparsable shift \"{txt}\"")))?;
    if !value.is_finite() {
        return Err(RondaError::input(format!("non-finite shift \"{txt}\"")));
    }
    Ok(value * scale)
}

/// Render a shift decimal at full precision, so that
/// `parse_shift(&format_shift(x)) == x` exactly.
pub fn format_shift(value: f64) -> String {
    format!("{value}")
}

/// A requested portfolio change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioShift {
    /// Full replacement weight vector; normalized like any holdings
    /// input. Takes precedence over deltas when both appear in a
    /// scenario document.
    Replacement(Vec<(Ticker, f64)>),
    /// Incremental weight shifts applied on top of the current weights.
    Deltas(Vec<(Ticker, f64)>),
}

impl PortfolioShift {
    /// The no-op shift.
    pub const fn zero() -> Self {
        Self::Deltas(Vec::new())
    }

    /// Parse `(ticker, shift-string)` pairs into a delta shift.
    ///
    /// # Errors
    ///
    /// Propagates [`RondaError::InputInvalid`] from [`parse_shift`].
    pub fn parse_deltas<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut deltas = Vec::new();
        for (ticker, shift) in pairs {
            deltas.push((Ticker::new(ticker), parse_shift(shift)?));
        }
        Ok(Self::Deltas(deltas))
    }

    /// Apply the shift to `base` weights.
    ///
    /// Deltas add onto existing positions; a delta for a ticker not in
    /// the base book opens a new position at the shift. The result is
    /// re-normalized to gross when `normalize` is set.
    ///
    /// # Errors
    ///
    /// Propagates normalization failures on a degenerate result.
    pub fn apply(&self, base: &[(Ticker, f64)], normalize: bool) -> Result<Vec<(Ticker, f64)>> {
        let shifted = match self {
            Self::Replacement(weights) => weights.clone(),
            Self::Deltas(deltas) => {
                let mut out = base.to_vec();
                for (ticker, shift) in deltas {
                    if let Some(entry) = out.iter_mut().find(|(t, _)| t == ticker) {
                        entry.1 += shift;
                    } else {
                        out.push((ticker.clone(), *shift));
                    }
                }
                out
            }
        };
        normalize_weights(&shifted, normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_shift_units() {
        assert_relative_eq!(parse_shift("+200bp").unwrap(), 0.02, epsilon = 1e-15);
        assert_relative_eq!(parse_shift("-75bps").unwrap(), -0.0075, epsilon = 1e-15);
        assert_relative_eq!(parse_shift("1.5%").unwrap(), 0.015, epsilon = 1e-15);
        assert_relative_eq!(parse_shift("-0.01").unwrap(), -0.01, epsilon = 1e-15);
        assert_relative_eq!(parse_shift(" +2 % ").unwrap(), 0.02, epsilon = 1e-15);
    }

    #[test]
    fn test_parse_shift_rejects_unknown_units() {
        assert!(parse_shift("5x").is_err());
        assert!(parse_shift("bp200").is_err());
        assert!(parse_shift("").is_err());
        assert!(parse_shift("nan").is_err());
        assert!(parse_shift("inf%").is_err());
    }

    #[test]
    fn test_format_parse_round_trip() {
        for value in [0.02, -0.0075, 0.015, -0.01, 0.123456789012345, 0.0] {
            let rendered = format_shift(value);
            assert_eq!(parse_shift(&rendered).unwrap(), value);
        }
    }

    #[test]
    fn test_apply_deltas() {
        let base = vec![
            (Ticker::new("AAPL"), 0.3),
            (Ticker::new("MSFT"), 0.3),
            (Ticker::new("GOOGL"), 0.4),
        ];
        let shift = PortfolioShift::parse_deltas([("AAPL", "+200bp"), ("GOOGL", "-200bp")]).unwrap();
        let out = shift.apply(&base, false).unwrap();
        assert_relative_eq!(out[0].1, 0.32, epsilon = 1e-12);
        assert_relative_eq!(out[1].1, 0.30, epsilon = 1e-12);
        assert_relative_eq!(out[2].1, 0.38, epsilon = 1e-12);
    }

    #[test]
    fn test_apply_opens_new_position() {
        let base = vec![(Ticker::new("AAPL"), 1.0)];
        let shift = PortfolioShift::parse_deltas([("NVDA", "5%")]).unwrap();
        let out = shift.apply(&base, false).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[1].1, 0.05, epsilon = 1e-15);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let base = vec![(Ticker::new("AAPL"), 0.6), (Ticker::new("SGOV"), 0.4)];
        let out = PortfolioShift::zero().apply(&base, false).unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn test_replacement_normalizes_when_enabled() {
        let shift =
            PortfolioShift::Replacement(vec![(Ticker::new("AAPL"), 0.25), (Ticker::new("SGOV"), 0.15)]);
        let out = shift.apply(&[], true).unwrap();
        assert_relative_eq!(out[0].1, 0.625, epsilon = 1e-12);
        assert_relative_eq!(out[1].1, 0.375, epsilon = 1e-12);
    }
}
