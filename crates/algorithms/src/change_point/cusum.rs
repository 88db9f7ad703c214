//! Tabular CUSUM on standardized observations
//!
//! ```text
//! z   = (x - mu) / sigma
//! S+_t = max(0, S+_{t-1} + z - k)
//! S-_t = max(0, S-_{t-1} - z - k)
//! ```
//!
//! Alarm when either sum reaches `h`. Suited to abrupt, step-like shifts.

use geoguard_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::{Baseline, ChangePoint, Direction};

/// Which shifts the chart watches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CusumSides {
    Both,
    Upper,
    Lower,
}

/// Parameters for the CUSUM detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumParams {
    /// Allowance (reference value) in standard deviations
    /// Default: 0.5
    pub k: f64,
    /// Decision threshold in standard deviations
    /// Default: 5.0
    pub h: f64,
    pub sides: CusumSides,
    /// Zero both sums after an alarm
    pub reset_after_alarm: bool,
    /// Alarms before this many finite observations are not reported
    /// Default: 5
    pub min_observations: usize,
}

impl Default for CusumParams {
    fn default() -> Self {
        Self {
            k: 0.5,
            h: 5.0,
            sides: CusumSides::Both,
            reset_after_alarm: true,
            min_observations: 5,
        }
    }
}

impl CusumParams {
    /// Sensitive upper chart for bare-soil increases
    pub fn construction() -> Self {
        Self {
            k: 0.3,
            h: 4.0,
            sides: CusumSides::Upper,
            min_observations: 3,
            ..Self::default()
        }
    }

    /// Lower chart for vegetation index collapse
    pub fn deforestation() -> Self {
        Self {
            k: 0.4,
            h: 3.5,
            sides: CusumSides::Lower,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.k > 0.0 && self.k.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "k",
                value: self.k.to_string(),
                reason: "must be positive".into(),
            });
        }
        if !(self.h > 0.0 && self.h.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "h",
                value: self.h.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Run the chart over `values`.
///
/// The trace holds the larger of the two sums at each point, NaN at skipped
/// non-finite points.
pub(crate) fn run(
    values: &[f64],
    baseline: Baseline,
    params: &CusumParams,
) -> (Vec<f64>, Vec<ChangePoint>) {
    let watch_upper = params.sides != CusumSides::Lower;
    let watch_lower = params.sides != CusumSides::Upper;

    let mut s_plus = 0.0f64;
    let mut s_minus = 0.0f64;
    let mut seen = 0usize;
    let mut trace = Vec::with_capacity(values.len());
    let mut flagged = Vec::new();

    for (index, &x) in values.iter().enumerate() {
        if !x.is_finite() {
            trace.push(f64::NAN);
            continue;
        }
        seen += 1;
        let z = (x - baseline.mean) / baseline.std;

        if watch_upper {
            s_plus = (s_plus + z - params.k).max(0.0);
        }
        if watch_lower {
            s_minus = (s_minus - z - params.k).max(0.0);
        }
        trace.push(s_plus.max(s_minus));

        let alarm = if watch_upper && s_plus >= params.h {
            Some((s_plus, Direction::Increase))
        } else if watch_lower && s_minus >= params.h {
            Some((s_minus, Direction::Decrease))
        } else {
            None
        };

        if let Some((statistic, direction)) = alarm {
            if seen >= params.min_observations {
                flagged.push(ChangePoint {
                    index,
                    value: x,
                    statistic,
                    direction,
                    confidence: (statistic / params.h).min(2.0) / 2.0,
                });
                if params.reset_after_alarm {
                    s_plus = 0.0;
                    s_minus = 0.0;
                }
            }
        }
    }

    (trace, flagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_up_detected() {
        let mut values = vec![0.1; 6];
        values.extend([0.4; 6]);
        let (trace, flagged) = run(&values, Baseline::new(0.1, 0.05), &CusumParams::default());

        assert_eq!(trace.len(), 12);
        assert!(!flagged.is_empty());
        let first = &flagged[0];
        assert_eq!(first.index, 6);
        assert_eq!(first.direction, Direction::Increase);
        // z = 6, S+ = 5.5 on the first shifted sample
        assert_relative_eq!(first.statistic, 5.5, epsilon = 1e-9);
        assert_relative_eq!(first.confidence, 0.55, epsilon = 1e-9);
    }

    #[test]
    fn test_upper_only_ignores_drop() {
        let mut values = vec![0.5; 6];
        values.extend([0.1; 6]);
        let (_, flagged) = run(&values, Baseline::new(0.5, 0.05), &CusumParams::construction());
        assert!(flagged.is_empty());

        let (_, flagged) = run(&values, Baseline::new(0.5, 0.05), &CusumParams::deforestation());
        assert!(!flagged.is_empty());
        assert!(flagged.iter().all(|p| p.direction == Direction::Decrease));
    }

    #[test]
    fn test_min_observations_suppresses_early_alarm() {
        let values = [0.9, 0.9, 0.9];
        let (_, flagged) = run(&values, Baseline::new(0.1, 0.05), &CusumParams::default());
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let p = CusumParams { h: 0.0, ..CusumParams::default() };
        assert!(p.validate().is_err());
    }
}
