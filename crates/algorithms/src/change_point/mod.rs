//! Statistical change-point detection
//!
//! Two classical process-control charts over an ordered sequence of one
//! index's values:
//! - **EWMA**: gradual, sustained drift
//! - **CUSUM**: abrupt, step-like shifts
//!
//! Both run on a scalar series or independently per pixel of a raster stack.
//! Short sequences are reported as [`Status::InsufficientData`] rather than
//! failing.

mod cusum;
mod ewma;
mod severity;

pub use cusum::{CusumParams, CusumSides};
pub use ewma::EwmaParams;
pub use severity::{
    deforestation_severity, vegetation_loss_severity, LossAssessment, LossSeverity,
};

use crate::maybe_rayon::*;
use crate::statistics::descriptive::{mean, std_dev};
use crate::Status;
use geoguard_core::raster::Raster;
use geoguard_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fewest finite observations either detector accepts
pub const MIN_SEQUENCE_LEN: usize = 2;

/// Reference level the charts measure deviations against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std: f64,
}

impl Baseline {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// Estimate from the leading `fraction` of the finite values (at least one),
    /// with the standard deviation floored at `min_std`.
    pub fn estimate(values: &[f64], fraction: f64, min_std: f64) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let take = ((finite.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize)
            .clamp(1, finite.len());
        let head = &finite[..take];
        Some(Self {
            mean: mean(head)?,
            std: std_dev(head)?.max(min_std),
        })
    }

    fn validate(&self) -> Result<()> {
        if !self.mean.is_finite() || !(self.std > 0.0 && self.std.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "baseline",
                value: format!("mean={}, std={}", self.mean, self.std),
                reason: "mean must be finite and std positive".into(),
            });
        }
        Ok(())
    }
}

/// Direction of a detected shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    #[default]
    None,
}

impl Direction {
    fn from_sign(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Increase
        } else if delta < 0.0 {
            Direction::Decrease
        } else {
            Direction::None
        }
    }
}

/// One flagged observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePoint {
    /// Position in the input sequence
    pub index: usize,
    pub value: f64,
    /// EWMA value or CUSUM sum at this point
    pub statistic: f64,
    pub direction: Direction,
    pub confidence: f64,
}

/// Outcome of running a detector over a sequence
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangePointResult {
    pub status: Status,
    pub change_detected: bool,
    /// Highest per-point confidence among flagged points, 0 when none
    pub confidence: f64,
    /// Direction of the most confident flagged point
    pub direction: Direction,
    pub change_points: Vec<ChangePoint>,
    /// Statistic at every input position (NaN where the input was not finite)
    pub trace: Vec<f64>,
    pub baseline: Option<Baseline>,
}

impl ChangePointResult {
    fn insufficient() -> Self {
        Self {
            status: Status::InsufficientData,
            ..Self::default()
        }
    }
}

/// Detector selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum DetectorKind {
    Ewma(EwmaParams),
    Cusum(CusumParams),
}

impl Default for DetectorKind {
    fn default() -> Self {
        DetectorKind::Ewma(EwmaParams::default())
    }
}

/// Parameters for [`detect_change_point`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub detector: DetectorKind,
    /// Explicit baseline; estimated from the sequence head when `None`
    pub baseline: Option<Baseline>,
    /// Leading share of the sequence used to estimate the baseline
    /// Default: 0.5
    pub baseline_fraction: f64,
    /// Floor on the estimated baseline standard deviation
    /// Default: 1e-3
    pub min_std: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            detector: DetectorKind::default(),
            baseline: None,
            baseline_fraction: 0.5,
            min_std: 1e-3,
        }
    }
}

impl DetectorParams {
    pub fn ewma(params: EwmaParams) -> Self {
        Self {
            detector: DetectorKind::Ewma(params),
            ..Self::default()
        }
    }

    pub fn cusum(params: CusumParams) -> Self {
        Self {
            detector: DetectorKind::Cusum(params),
            ..Self::default()
        }
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.detector {
            DetectorKind::Ewma(p) => p.validate()?,
            DetectorKind::Cusum(p) => p.validate()?,
        }
        if let Some(b) = &self.baseline {
            b.validate()?;
        }
        if !(self.min_std > 0.0) {
            return Err(Error::InvalidParameter {
                name: "min_std",
                value: self.min_std.to_string(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Change-point detector algorithm
#[derive(Debug, Clone, Default)]
pub struct ChangePointDetector;

impl Algorithm for ChangePointDetector {
    type Input = Vec<f64>;
    type Output = ChangePointResult;
    type Params = DetectorParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ChangePointDetector"
    }

    fn description(&self) -> &'static str {
        "Detect gradual (EWMA) or abrupt (CUSUM) shifts in an index time series"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        detect_change_point(&input, &params)
    }
}

/// Run the selected detector over an ordered sequence.
///
/// Errors only on invalid parameters; a sequence with fewer than two finite
/// values gives `status = InsufficientData`, no change and zero confidence.
pub fn detect_change_point(sequence: &[f64], params: &DetectorParams) -> Result<ChangePointResult> {
    params.validate()?;
    let result = run_detector(sequence, params);
    if result.change_detected {
        info!(
            points = result.change_points.len(),
            confidence = result.confidence,
            direction = ?result.direction,
            "change point detected"
        );
    }
    Ok(result)
}

fn run_detector(sequence: &[f64], params: &DetectorParams) -> ChangePointResult {
    let finite = sequence.iter().filter(|v| v.is_finite()).count();
    if finite < MIN_SEQUENCE_LEN {
        return ChangePointResult::insufficient();
    }

    let baseline = match params.baseline {
        Some(b) => b,
        None => match Baseline::estimate(sequence, params.baseline_fraction, params.min_std) {
            Some(b) => b,
            None => return ChangePointResult::insufficient(),
        },
    };

    let (trace, change_points) = match &params.detector {
        DetectorKind::Ewma(p) => ewma::run(sequence, baseline, p),
        DetectorKind::Cusum(p) => cusum::run(sequence, baseline, p),
    };

    let strongest = change_points
        .iter()
        .fold(None::<&ChangePoint>, |best, p| match best {
            Some(b) if b.confidence >= p.confidence => Some(b),
            _ => Some(p),
        });

    ChangePointResult {
        status: Status::Ok,
        change_detected: strongest.is_some(),
        confidence: strongest.map_or(0.0, |p| p.confidence),
        direction: strongest.map_or(Direction::None, |p| p.direction),
        change_points,
        trace,
        baseline: Some(baseline),
    }
}

/// Per-pixel detector output
#[derive(Debug, Clone)]
pub struct ChangeMaps {
    /// 1 where a change was detected, 0 elsewhere
    pub flags: Raster<u8>,
    pub confidence: Raster<f64>,
    /// Pixels flagged
    pub changed_pixels: usize,
}

/// Run the detector independently for every pixel of a time-ordered stack.
///
/// An explicit baseline in `params` applies to every pixel; otherwise each
/// pixel estimates its own from the head of its series.
pub fn detect_change_point_stack(stack: &[Raster<f64>], params: &DetectorParams) -> Result<ChangeMaps> {
    params.validate()?;
    let first = stack.first().ok_or_else(|| Error::InvalidParameter {
        name: "stack",
        value: "0 layers".into(),
        reason: "at least one raster is required".into(),
    })?;
    for layer in &stack[1..] {
        first.ensure_same_shape(layer)?;
    }
    let (rows, cols) = first.shape();

    let cells: Vec<(u8, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut series = vec![0.0; stack.len()];
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                for (slot, layer) in series.iter_mut().zip(stack) {
                    *slot = layer.data()[(row, col)];
                }
                let r = run_detector(&series, params);
                row_data.push((u8::from(r.change_detected), r.confidence));
            }
            row_data
        })
        .collect();

    let (flag_data, conf_data): (Vec<u8>, Vec<f64>) = cells.into_iter().unzip();
    let changed_pixels = flag_data.iter().filter(|&&f| f == 1).count();
    debug!(rows, cols, layers = stack.len(), changed_pixels, "per-pixel change detection done");

    let transform = first.transform().copied();
    let mut flags = Raster::from_vec(flag_data, rows, cols)?;
    flags.set_transform(transform);
    let mut confidence = Raster::from_vec(conf_data, rows, cols)?;
    confidence.set_transform(transform);

    Ok(ChangeMaps {
        flags,
        confidence,
        changed_pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sequence_is_insufficient() {
        for detector in [
            DetectorKind::Ewma(EwmaParams::default()),
            DetectorKind::Cusum(CusumParams::default()),
        ] {
            let params = DetectorParams { detector, ..DetectorParams::default() };
            for seq in [&[][..], &[0.4][..], &[0.4, f64::NAN][..]] {
                let r = detect_change_point(seq, &params).unwrap();
                assert_eq!(r.status, Status::InsufficientData);
                assert!(!r.change_detected);
                assert_eq!(r.confidence, 0.0);
            }
        }
    }

    #[test]
    fn test_baseline_estimate_uses_head() {
        let b = Baseline::estimate(&[0.5, 0.5, 0.5, 0.1, 0.1], 0.5, 1e-3).unwrap();
        assert_eq!(b.mean, 0.5);
        assert_eq!(b.std, 1e-3);
        assert!(Baseline::estimate(&[f64::NAN], 0.5, 1e-3).is_none());
    }

    #[test]
    fn test_ewma_detects_drop_with_estimated_baseline() {
        let seq = [0.62, 0.60, 0.61, 0.60, 0.61, 0.45, 0.40, 0.35];
        let r = detect_change_point(&seq, &DetectorParams::default()).unwrap();
        assert_eq!(r.status, Status::Ok);
        assert!(r.change_detected);
        assert_eq!(r.direction, Direction::Decrease);
        assert!(r.confidence > 0.0 && r.confidence <= 1.0);
        assert_eq!(r.trace.len(), seq.len());
    }

    #[test]
    fn test_invalid_baseline_rejected() {
        let params = DetectorParams::default().with_baseline(Baseline::new(0.5, 0.0));
        assert!(detect_change_point(&[0.1, 0.2, 0.3], &params).is_err());
    }

    #[test]
    fn test_stack_flags_changed_pixel() {
        let mut stack = Vec::new();
        for t in 0..8 {
            let mut layer = Raster::filled(3, 3, 0.6);
            if t >= 4 {
                layer.set(1, 1, 0.2).unwrap();
            }
            stack.push(layer);
        }
        let params = DetectorParams::default().with_baseline(Baseline::new(0.6, 0.02));
        let maps = detect_change_point_stack(&stack, &params).unwrap();

        assert_eq!(maps.flags.get(1, 1).unwrap(), 1);
        assert_eq!(maps.flags.get(0, 0).unwrap(), 0);
        assert_eq!(maps.changed_pixels, 1);
        assert!(maps.confidence.get(1, 1).unwrap() > 0.5);
    }

    #[test]
    fn test_stack_shape_mismatch() {
        let stack = vec![Raster::filled(2, 2, 0.1), Raster::filled(2, 3, 0.1)];
        assert!(detect_change_point_stack(&stack, &DetectorParams::default()).is_err());
    }
}
