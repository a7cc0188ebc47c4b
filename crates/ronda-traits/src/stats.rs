//! Statistical utility functions shared across the engine.
//!
//! All estimators use the sample convention (N-1 denominator). Monthly to
//! annual conversion is √12 for volatilities and 12 for variances, applied
//! consistently everywhere.

/// Number of monthly periods in a year.
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Minimum denominator magnitude before a ratio is treated as degenerate.
pub const MIN_DENOMINATOR: f64 = 1e-12;

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (N-1 denominator). Returns 0.0 below two observations.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation (N-1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Sample covariance of two parallel slices (N-1 denominator).
///
/// Returns 0.0 below two observations; the slices must be equal length.
pub fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len();
    if n < 2 {
        return 0.0;
    }
    let ma = mean(a);
    let mb = mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Annualize a monthly volatility (× √12).
pub fn annualize_vol(monthly_vol: f64) -> f64 {
    monthly_vol * MONTHS_PER_YEAR.sqrt()
}

/// Annualize a monthly variance (× 12).
pub fn annualize_var(monthly_var: f64) -> f64 {
    monthly_var * MONTHS_PER_YEAR
}

/// Annualize a mean monthly return geometrically.
pub fn annualize_return(mean_monthly: f64) -> f64 {
    (1.0 + mean_monthly).powf(MONTHS_PER_YEAR) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(mean(&values), 3.0, epsilon = 1e-12);
        assert_relative_eq!(sample_variance(&values), 2.5, epsilon = 1e-12);
        assert_relative_eq!(sample_std(&values), 2.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_mean_empty_is_nan() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_variance_below_two_obs() {
        assert_eq!(sample_variance(&[1.0]), 0.0);
    }

    #[test]
    fn test_covariance_matches_variance() {
        let values = [0.01, -0.02, 0.03, 0.00];
        assert_relative_eq!(
            sample_covariance(&values, &values),
            sample_variance(&values),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_annualization_consistency() {
        let monthly = 0.04;
        assert_relative_eq!(
            annualize_vol(monthly),
            monthly * 12.0f64.sqrt(),
            epsilon = 1e-10
        );
        assert_relative_eq!(
            annualize_vol(monthly).powi(2),
            annualize_var(monthly.powi(2)),
            epsilon = 1e-12
        );
    }
}
