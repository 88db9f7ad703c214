//! Descriptive statistics over plain slices
//!
//! Shared by the summaries, detectors, temporal analyzer and fusion engine.
//! Variances are population variances (divide by n).

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Coefficient of variation `std / |mean|`.
///
/// Zero when the mean is zero or the sums overflow to a non-finite ratio.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    match (mean(values), std_dev(values)) {
        (Some(m), Some(s)) if m != 0.0 => {
            let cv = s / m.abs();
            if cv.is_finite() {
                cv
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in percent and clamped to [0, 100]. Non-finite values are ignored;
/// `None` when nothing finite remains.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Ordinary least-squares fit of `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, 0 when `y` has no variance
    pub r_squared: f64,
}

/// Least-squares line through `(x, y)` pairs.
///
/// `None` with fewer than two points or when every `x` is identical.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mx;
        let dy = yi - my;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 {
        0.0
    } else {
        (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(std_dev(&v).unwrap(), 2.0);
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn test_cv_zero_mean() {
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), 0.0);
        assert_relative_eq!(coefficient_of_variation(&[1.0, 3.0]), 0.5);
    }

    #[test]
    fn test_cv_overflowing_values() {
        assert_eq!(coefficient_of_variation(&[1e308; 4]), 0.0);
        assert_eq!(coefficient_of_variation(&[f64::INFINITY, 1.0]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v: Vec<f64> = (1..=5).map(f64::from).collect();
        assert_relative_eq!(percentile(&v, 50.0).unwrap(), 3.0);
        assert_relative_eq!(percentile(&v, 90.0).unwrap(), 4.6, epsilon = 1e-12);
        assert_relative_eq!(percentile(&v, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&v, 100.0).unwrap(), 5.0);
        assert!(percentile(&[f64::NAN], 50.0).is_none());
    }

    #[test]
    fn test_linear_regression() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);

        assert!(linear_regression(&[1.0, 1.0], &[0.0, 2.0]).is_none());
    }
}
