//! Vegetation loss grading on top of the detectors

use geoguard_core::Result;
use serde::{Deserialize, Serialize};

use super::{
    detect_change_point, Baseline, ChangePointResult, CusumParams, DetectorParams, Direction,
    EwmaParams,
};

/// Grade of a vegetation index drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSeverity {
    Stable,
    Low,
    Moderate,
    High,
    Severe,
}

/// Graded vegetation loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossAssessment {
    pub detected: bool,
    /// Detector confidence scaled by the grade, in [0, 1]
    pub severity_score: f64,
    pub severity: LossSeverity,
    /// Baseline mean minus the latest observation
    pub drop: f64,
    pub detection: ChangePointResult,
}

/// EWMA vegetation chart on an NDVI series, counting decreases only.
///
/// The latest finite observation must be flagged and below the baseline.
/// Grades by drop: < 0.1 low, < 0.2 moderate, < 0.3 high, otherwise severe.
pub fn vegetation_loss_severity(ndvi: &[f64], baseline: Option<Baseline>) -> Result<LossAssessment> {
    let params = DetectorParams {
        baseline,
        ..DetectorParams::ewma(EwmaParams::vegetation())
    };
    assess(ndvi, &params, 0.3)
}

/// Lower-sided CUSUM on an NDVI series, graded like
/// [`vegetation_loss_severity`] with a heavier weight on low drops.
pub fn deforestation_severity(ndvi: &[f64], baseline: Option<Baseline>) -> Result<LossAssessment> {
    let params = DetectorParams {
        baseline,
        ..DetectorParams::cusum(CusumParams::deforestation())
    };
    assess(ndvi, &params, 0.4)
}

fn assess(ndvi: &[f64], params: &DetectorParams, low_weight: f64) -> Result<LossAssessment> {
    let detection = detect_change_point(ndvi, params)?;

    let last = ndvi.iter().rposition(|v| v.is_finite());
    let flagged_last = last.and_then(|i| {
        detection
            .change_points
            .iter()
            .find(|p| p.index == i && p.direction == Direction::Decrease)
    });

    let drop = match (detection.baseline, last) {
        (Some(b), Some(i)) => b.mean - ndvi[i],
        _ => 0.0,
    };

    let Some(point) = flagged_last.filter(|_| drop > 0.0) else {
        return Ok(LossAssessment {
            detected: false,
            severity_score: 0.0,
            severity: LossSeverity::Stable,
            drop,
            detection,
        });
    };

    let (severity, weight) = if drop < 0.1 {
        (LossSeverity::Low, low_weight)
    } else if drop < 0.2 {
        (LossSeverity::Moderate, 0.6)
    } else if drop < 0.3 {
        (LossSeverity::High, 0.8)
    } else {
        (LossSeverity::Severe, 1.0)
    };
    let severity_score = point.confidence * weight;

    Ok(LossAssessment {
        detected: true,
        severity_score,
        severity,
        drop,
        detection,
    })
}
