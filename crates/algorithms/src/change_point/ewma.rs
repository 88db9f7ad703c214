//! EWMA control chart
//!
//! ```text
//! z_0 = mu
//! z_t = lambda x_t + (1 - lambda) z_{t-1}
//! L   = k sigma sqrt(lambda / (2 - lambda))
//! ```
//!
//! A point is flagged when `|z_t - mu| > L`. Suited to gradual, sustained drift.

use geoguard_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::{Baseline, ChangePoint, Direction};

/// Parameters for the EWMA detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmaParams {
    /// Smoothing factor in (0, 1]
    /// Default: 0.3
    pub lambda: f64,
    /// Control limit width in baseline standard deviations
    /// Default: 3.0
    pub k: f64,
}

impl Default for EwmaParams {
    fn default() -> Self {
        Self { lambda: 0.3, k: 3.0 }
    }
}

impl EwmaParams {
    /// Slower response, narrower band: vegetation indices
    pub fn vegetation() -> Self {
        Self { lambda: 0.2, k: 2.5 }
    }

    /// Faster response: water-quality indices
    pub fn water_quality() -> Self {
        Self { lambda: 0.4, k: 2.0 }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lambda > 0.0 && self.lambda <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "lambda",
                value: self.lambda.to_string(),
                reason: "must be in (0, 1]".into(),
            });
        }
        if !(self.k > 0.0 && self.k.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "k",
                value: self.k.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Half-width of the asymptotic control band
    pub fn control_limit(&self, sigma: f64) -> f64 {
        self.k * sigma * (self.lambda / (2.0 - self.lambda)).sqrt()
    }
}

/// Run the chart over `values`.
///
/// Returns the statistic trace (NaN at skipped non-finite points) and the
/// flagged points.
pub(crate) fn run(
    values: &[f64],
    baseline: Baseline,
    params: &EwmaParams,
) -> (Vec<f64>, Vec<ChangePoint>) {
    let limit = params.control_limit(baseline.std);
    let mut trace = Vec::with_capacity(values.len());
    let mut flagged = Vec::new();
    let mut z = baseline.mean;

    for (index, &x) in values.iter().enumerate() {
        if !x.is_finite() {
            trace.push(f64::NAN);
            continue;
        }
        z = params.lambda * x + (1.0 - params.lambda) * z;
        trace.push(z);

        let deviation = z - baseline.mean;
        if deviation.abs() > limit {
            flagged.push(ChangePoint {
                index,
                value: x,
                statistic: z,
                direction: Direction::from_sign(deviation),
                confidence: (deviation.abs() / limit).min(2.0) / 2.0,
            });
        }
    }

    (trace, flagged)
}
