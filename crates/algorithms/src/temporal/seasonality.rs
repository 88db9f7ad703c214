//! Seasonality and anomaly screening of a value series

use serde::{Deserialize, Serialize};

use crate::statistics::descriptive::{coefficient_of_variation, mean, std_dev};

/// Coefficient of variation that maps to full seasonality
pub const CV_SCALE: f64 = 0.5;
/// Points needed before peak-based period estimation is attempted
pub const MIN_PERIOD_POINTS: usize = 12;
/// Minimum spacing between peaks, in samples
pub const PEAK_DISTANCE: usize = 5;

/// Cyclical behaviour of a series
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Seasonality {
    /// `min(cv / 0.5, 1)`
    pub likelihood: f64,
    pub coefficient_of_variation: f64,
    /// Regular peak spacing was found
    pub periodic: bool,
    pub period_days: Option<f64>,
    /// Peak-to-peak range of the values
    pub amplitude: f64,
}

/// Seasonality from values and their day offsets
pub fn seasonality(days: &[f64], values: &[f64]) -> Seasonality {
    let cv = coefficient_of_variation(values);
    let amplitude = values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - values.iter().copied().fold(f64::INFINITY, f64::min);

    let mut out = Seasonality {
        likelihood: (cv / CV_SCALE).clamp(0.0, 1.0),
        coefficient_of_variation: cv,
        amplitude: if amplitude.is_finite() { amplitude } else { 0.0 },
        ..Seasonality::default()
    };

    if values.len() < MIN_PERIOD_POINTS {
        return out;
    }

    let peaks = find_peaks(values, PEAK_DISTANCE);
    if peaks.len() < 2 {
        return out;
    }
    let intervals: Vec<f64> = peaks.windows(2).map(|w| days[w[1]] - days[w[0]]).collect();
    if let (Some(avg), Some(spread)) = (mean(&intervals), std_dev(&intervals)) {
        if avg > 0.0 && spread < avg * 0.3 {
            out.periodic = true;
            out.period_days = Some(avg);
        }
    }
    out
}

/// Local maxima at least `distance` samples apart, tallest kept first
pub fn find_peaks(values: &[f64], distance: usize) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    let mut candidates: Vec<usize> = (1..values.len() - 1)
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1])
        .collect();
    candidates.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::new();
    for c in candidates {
        if kept.iter().all(|&k| c.abs_diff(k) >= distance) {
            kept.push(c);
        }
    }
    kept.sort_unstable();
    kept
}

/// Kind of outlying observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

/// Observation far from the series mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
    pub kind: AnomalyKind,
    /// `z > 3.5`
    pub high: bool,
}

/// Points whose |z| exceeds `z_threshold`; none when the series is flat
pub fn anomalies(values: &[f64], z_threshold: f64) -> Vec<Anomaly> {
    let (Some(m), Some(s)) = (mean(values), std_dev(values)) else {
        return Vec::new();
    };
    if s < 1e-8 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter_map(|(index, &value)| {
            let z = ((value - m) / s).abs();
            (z > z_threshold).then(|| Anomaly {
                index,
                value,
                z_score: z,
                kind: if value > m { AnomalyKind::Spike } else { AnomalyKind::Drop },
                high: z > 3.5,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_find_peaks_distance() {
        let v = [0.0, 1.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.0, 1.2, 0.0];
        // 1 and 3 are two samples apart, only the taller survives
        assert_eq!(find_peaks(&v, 5), vec![1, 8]);
        assert_eq!(find_peaks(&v, 1), vec![1, 3, 8]);
    }

    #[test]
    fn test_periodic_series() {
        let days: Vec<f64> = (0..24).map(|i| i as f64 * 30.0).collect();
        let values: Vec<f64> = (0..24)
            .map(|i| 0.5 + 0.3 * (i as f64 * PI / 3.0 + PI / 6.0).sin())
            .collect();
        let s = seasonality(&days, &values);
        assert!(s.periodic);
        let period = s.period_days.unwrap();
        assert!((period - 180.0).abs() < 1e-6, "period {}", period);
        assert!(s.likelihood > 0.5);
    }

    #[test]
    fn test_short_series_not_periodic() {
        let s = seasonality(&[0.0, 10.0, 20.0], &[0.2, 0.8, 0.2]);
        assert!(!s.periodic);
        assert!(s.likelihood > 0.0);
        assert!((s.amplitude - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_overflowing_values_have_no_seasonality() {
        let s = seasonality(&[0.0, 10.0, 20.0, 30.0], &[1e308; 4]);
        assert_eq!(s.coefficient_of_variation, 0.0);
        assert_eq!(s.likelihood, 0.0);
    }

    #[test]
    fn test_anomalies() {
        let mut v = vec![0.5; 20];
        v[7] = 2.0;
        let found = anomalies(&v, 2.5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 7);
        assert_eq!(found[0].kind, AnomalyKind::Spike);
        assert!(found[0].high);

        assert!(anomalies(&[0.3; 5], 2.5).is_empty());
    }
}
