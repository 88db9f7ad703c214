//! Per-index change between two acquisition dates

use serde::{Deserialize, Serialize};

/// Below this magnitude a previous value is treated as zero
pub const NEAR_ZERO: f64 = 1e-3;

/// Change of one index between the previous and the current date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChange {
    pub name: String,
    pub current: f64,
    pub previous: f64,
    /// `current - previous`
    pub absolute_change: f64,
    pub percent_change: f64,
    /// `|percent_change|` exceeds the index's threshold
    pub is_significant: bool,
}

impl IndexChange {
    /// Build the change record, judging significance against `threshold_pct`.
    pub fn new(name: impl Into<String>, current: f64, previous: f64, threshold_pct: f64) -> Self {
        let percent_change = percent_change(current, previous);
        Self {
            name: name.into(),
            current,
            previous,
            absolute_change: current - previous,
            percent_change,
            is_significant: percent_change.abs() > threshold_pct,
        }
    }

    /// `min(|percent_change| / 100, 1)`
    pub fn normalized_magnitude(&self) -> f64 {
        (self.percent_change.abs() / 100.0).min(1.0)
    }
}

/// Relative change in percent.
///
/// A previous value within [`NEAR_ZERO`] of zero gives 0% when the change is
/// also that small and 100% otherwise.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    let delta = current - previous;
    if previous.abs() < NEAR_ZERO {
        if delta.abs() < NEAR_ZERO {
            0.0
        } else {
            100.0
        }
    } else {
        delta / previous.abs() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percent_change() {
        assert_relative_eq!(percent_change(0.2, 0.62), -67.741935483870968, epsilon = 1e-9);
        assert_relative_eq!(percent_change(0.45, 0.12), 275.0, epsilon = 1e-9);
        // Negative previous values use the magnitude
        assert_relative_eq!(percent_change(-0.1, -0.2), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_near_zero_previous() {
        assert_eq!(percent_change(0.0005, 0.0), 0.0);
        assert_eq!(percent_change(0.3, 0.0), 100.0);
        assert_eq!(percent_change(-0.3, 0.0005), 100.0);
    }

    #[test]
    fn test_significance_is_strict() {
        let c = IndexChange::new("ndvi", 0.6, 0.5, 20.0);
        assert!(!c.is_significant);
        let c = IndexChange::new("ndvi", 0.61, 0.5, 20.0);
        assert!(c.is_significant);
    }
}
