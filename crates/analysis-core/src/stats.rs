//! Small numeric helpers shared by the analyzers.
//!
//! Per-bar series use `f64::NAN` as the "no value yet" sentinel, so most helpers
//! here either skip or propagate NaN explicitly.

/// Mean of a slice; 0.0 when empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Least-squares fit of `values` against their index. Returns `(slope, intercept)`.
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();
    linear_fit(&points)
}

/// Least-squares fit through arbitrary `(x, y)` points. Returns `(slope, intercept)`.
///
/// A single point (or all points sharing one x) yields a flat line through the mean.
pub fn linear_fit(points: &[(f64, f64)]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for &(x, y) in points {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x).powi(2);
    }

    if den.abs() < f64::EPSILON {
        return (0.0, mean_y);
    }
    let slope = num / den;
    (slope, mean_y - slope * mean_x)
}

/// Last non-NaN value of a series.
pub fn last_finite(series: &[f64]) -> Option<f64> {
    series.iter().rev().find(|v| v.is_finite()).copied()
}

/// Value at `idx` if it is defined.
pub fn finite_at(series: &[f64], idx: usize) -> Option<f64> {
    series.get(idx).copied().filter(|v| v.is_finite())
}

/// Percent change from `from` to `to`; NaN when `from` is zero.
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return f64::NAN;
    }
    (to - from) / from * 100.0
}

/// Round to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((std_dev(&data) - 2.138089935).abs() < 1e-6);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let (slope, intercept) = linear_regression(&values);
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_degenerate() {
        let (slope, intercept) = linear_fit(&[(4.0, 10.0)]);
        assert_eq!(slope, 0.0);
        assert_eq!(intercept, 10.0);
    }

    #[test]
    fn test_last_finite_skips_nan() {
        let s = [f64::NAN, 1.0, 2.0, f64::NAN];
        assert_eq!(last_finite(&s), Some(2.0));
        assert_eq!(last_finite(&[f64::NAN]), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert!(pct_change(0.0, 1.0).is_nan());
    }
}
