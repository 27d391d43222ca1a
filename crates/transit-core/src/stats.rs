//! Small robust-statistics helpers shared by the selection and search stages.

/// Mean and population standard deviation. `(NaN, NaN)` when empty.
pub fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Median of the values; NaN when empty.
///
/// Uses `select_nth_unstable` on a scratch copy, so the input is untouched.
pub fn median(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mut scratch = values.to_vec();
    let mid = n / 2;
    scratch.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    if n % 2 == 1 {
        scratch[mid]
    } else {
        let upper = scratch[mid];
        let lower = scratch[..mid]
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
            .unwrap_or(upper);
        (lower + upper) / 2.0
    }
}

/// Coefficient of variation (std / mean). NaN for empty input or a
/// non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let (mean, std) = mean_stddev(values);
    if mean > 0.0 {
        std / mean
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_stddev() {
        let (mean, std) = mean_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_cv_of_constant_is_zero() {
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), 0.0);
        assert!(coefficient_of_variation(&[0.0, 0.0]).is_nan());
    }
}
