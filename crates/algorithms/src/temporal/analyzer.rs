//! Trend, velocity and forecast over an index time series

use std::fmt;

use chrono::{DateTime, Utc};
use geoguard_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::seasonality::{anomalies, seasonality, Anomaly, Seasonality};
use crate::statistics::descriptive::{linear_regression, mean};
use crate::Status;

/// Fewest points a trend is fitted to
pub const MIN_POINTS: usize = 3;
/// Slopes (per day) inside this band are "stable"
pub const STABLE_SLOPE: f64 = 1e-4;
/// Mean acceleration above which a series counts as accelerating
pub const ACCELERATION_EPS: f64 = 1e-4;
/// |z| above which an observation is an anomaly
pub const ANOMALY_Z: f64 = 2.5;
/// Horizon used by the forecast when the last interval is zero
pub const DEFAULT_STEP_DAYS: f64 = 30.0;

/// One observation of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Data-quality score in [0, 1]
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    1.0
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            quality: 1.0,
        }
    }
}

/// Whether larger index values mean a healthier landscape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Vegetation and water-extent indices
    #[default]
    HigherIsHealthier,
    /// Built-up, bare-soil, turbidity and algae indices
    HigherIsWorse,
}

/// Parameters for [`analyze_temporal`]
#[derive(Debug, Clone, Default)]
pub struct TemporalParams {
    /// Level whose crossing time is extrapolated
    pub critical_threshold: Option<f64>,
    pub polarity: Polarity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Least-squares trend over days since the first observation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Index units per day
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub confidence: f64,
}

/// Velocity/acceleration severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSeverity {
    #[default]
    Stable,
    SlowImprovement,
    SlowDegradation,
    ModerateImprovement,
    ModerateDegradation,
    RapidImprovement,
    RapidDegradation,
}

impl ChangeSeverity {
    /// Bucket `(velocity, acceleration)`.
    ///
    /// ```text
    /// |v| < 0.001 and |a| < 1e-4   stable
    /// |v| < 0.002                  slow_*      (a > 0 degrades)
    /// |v| < 0.005                  moderate_*  (a > 0 degrades)
    /// otherwise                    rapid_*     (v < 0 degrades)
    /// ```
    ///
    /// The degradation sides swap for [`Polarity::HigherIsWorse`].
    pub fn classify(velocity: f64, acceleration: f64, polarity: Polarity) -> Self {
        let speed = velocity.abs();
        if speed < 0.001 && acceleration.abs() < 1e-4 {
            return ChangeSeverity::Stable;
        }
        let healthy = polarity == Polarity::HigherIsHealthier;

        if speed < 0.005 {
            let degrading = (acceleration > 0.0) == healthy;
            return match (speed < 0.002, degrading) {
                (true, false) => ChangeSeverity::SlowImprovement,
                (true, true) => ChangeSeverity::SlowDegradation,
                (false, false) => ChangeSeverity::ModerateImprovement,
                (false, true) => ChangeSeverity::ModerateDegradation,
            };
        }

        if (velocity < 0.0) == healthy {
            ChangeSeverity::RapidDegradation
        } else {
            ChangeSeverity::RapidImprovement
        }
    }

    pub fn is_rapid(self) -> bool {
        matches!(
            self,
            ChangeSeverity::RapidImprovement | ChangeSeverity::RapidDegradation
        )
    }
}

impl fmt::Display for ChangeSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeSeverity::Stable => "stable",
            ChangeSeverity::SlowImprovement => "slow improvement",
            ChangeSeverity::SlowDegradation => "slow degradation",
            ChangeSeverity::ModerateImprovement => "moderate improvement",
            ChangeSeverity::ModerateDegradation => "moderate degradation",
            ChangeSeverity::RapidImprovement => "rapid improvement",
            ChangeSeverity::RapidDegradation => "rapid degradation",
        };
        f.write_str(s)
    }
}

/// Finite-difference rates of change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Mean value change per day
    pub average_velocity: f64,
    /// Rate over the most recent interval
    pub current_velocity: f64,
    /// Mean change between consecutive velocities
    pub acceleration: f64,
    pub is_accelerating: bool,
    /// Days until the critical threshold at the current rate
    pub days_to_critical: Option<f64>,
    pub severity: ChangeSeverity,
}

/// Full temporal analysis of one index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemporalAnalysis {
    pub status: Status,
    pub periods_analyzed: usize,
    pub trend: Trend,
    pub velocity: Velocity,
    pub anomalies: Vec<Anomaly>,
    pub seasonality: Seasonality,
    /// One step ahead along the fitted slope
    pub forecast: f64,
    pub interpretation: String,
}

/// Temporal trend analyzer algorithm
#[derive(Debug, Clone, Default)]
pub struct TemporalAnalyzer;

impl Algorithm for TemporalAnalyzer {
    type Input = Vec<TimeSeriesPoint>;
    type Output = TemporalAnalysis;
    type Params = TemporalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "TemporalAnalyzer"
    }

    fn description(&self) -> &'static str {
        "Trend, velocity, seasonality and forecast of an index time series"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Ok(analyze_temporal(&input, &params))
    }
}

/// Analyze a time series of index values.
///
/// Points are sorted by timestamp and non-finite values dropped. Fewer than
/// three usable points, or timestamps that are all identical, give
/// `status = InsufficientData` with zeroed fields.
pub fn analyze_temporal(points: &[TimeSeriesPoint], params: &TemporalParams) -> TemporalAnalysis {
    let mut series: Vec<&TimeSeriesPoint> = points.iter().filter(|p| p.value.is_finite()).collect();
    if series.len() < points.len() {
        warn!(dropped = points.len() - series.len(), "non-finite values removed from series");
    }
    series.sort_by_key(|p| p.timestamp);

    let insufficient = TemporalAnalysis {
        status: Status::InsufficientData,
        periods_analyzed: series.len(),
        ..TemporalAnalysis::default()
    };
    if series.len() < MIN_POINTS {
        return insufficient;
    }

    let t0 = series[0].timestamp;
    let days: Vec<f64> = series
        .iter()
        .map(|p| (p.timestamp - t0).num_milliseconds() as f64 / 86_400_000.0)
        .collect();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();

    let Some(fit) = linear_regression(&days, &values) else {
        debug!("all timestamps identical, no trend");
        return insufficient;
    };

    let trend = trend_from_fit(fit.slope, fit.intercept, fit.r_squared);
    let velocity = velocity(&days, &values, params);
    let seasonality = seasonality(&days, &values);

    let n = values.len();
    let mut step = days[n - 1] - days[n - 2];
    if step == 0.0 {
        step = DEFAULT_STEP_DAYS;
    }
    let forecast = values[n - 1] + trend.slope * step;

    let interpretation = interpret(&trend, &velocity, &seasonality);
    debug!(
        slope = trend.slope,
        severity = %velocity.severity,
        seasonal = seasonality.likelihood,
        "temporal analysis"
    );

    TemporalAnalysis {
        status: Status::Ok,
        periods_analyzed: n,
        anomalies: anomalies(&values, ANOMALY_Z),
        trend,
        velocity,
        seasonality,
        forecast,
        interpretation,
    }
}

fn trend_from_fit(slope: f64, intercept: f64, r_squared: f64) -> Trend {
    let (direction, confidence) = if slope.abs() < STABLE_SLOPE {
        (TrendDirection::Stable, 0.5 + 0.4 * (1.0 - r_squared))
    } else if slope > 0.0 {
        (TrendDirection::Increasing, r_squared)
    } else {
        (TrendDirection::Decreasing, r_squared)
    };
    Trend {
        direction,
        slope,
        intercept,
        r_squared,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

fn velocity(days: &[f64], values: &[f64], params: &TemporalParams) -> Velocity {
    let velocities: Vec<f64> = days
        .windows(2)
        .zip(values.windows(2))
        .filter_map(|(d, v)| {
            let dt = d[1] - d[0];
            (dt > 0.0).then(|| (v[1] - v[0]) / dt)
        })
        .collect();

    let Some(&current) = velocities.last() else {
        return Velocity::default();
    };
    let accelerations: Vec<f64> = velocities.windows(2).map(|w| w[1] - w[0]).collect();
    let acceleration = mean(&accelerations).unwrap_or(0.0);

    let days_to_critical = params.critical_threshold.and_then(|threshold| {
        if current == 0.0 {
            return None;
        }
        let last = values[values.len() - 1];
        let days = (threshold - last) / current;
        (days >= 0.0).then_some(days)
    });

    Velocity {
        average_velocity: mean(&velocities).unwrap_or(0.0),
        current_velocity: current,
        acceleration,
        is_accelerating: acceleration > ACCELERATION_EPS,
        days_to_critical,
        severity: ChangeSeverity::classify(current, acceleration, params.polarity),
    }
}

fn interpret(trend: &Trend, velocity: &Velocity, seasonality: &Seasonality) -> String {
    let mut parts = Vec::new();

    let strength = if trend.confidence > 0.7 {
        "strong"
    } else if trend.confidence > 0.5 {
        "moderate"
    } else {
        "weak"
    };
    match trend.direction {
        TrendDirection::Stable => {
            parts.push("The index shows stable values with no significant trend.".to_string())
        }
        TrendDirection::Increasing => parts.push(format!(
            "A {strength} increasing trend is detected (R²={:.3}).",
            trend.r_squared
        )),
        TrendDirection::Decreasing => parts.push(format!(
            "A {strength} decreasing trend is detected (R²={:.3}).",
            trend.r_squared
        )),
    }

    if velocity.severity.is_rapid() {
        parts.push(format!("Change is happening rapidly ({}).", velocity.severity));
        if velocity.is_accelerating {
            parts.push(
                "The rate of change is accelerating, requiring immediate attention.".to_string(),
            );
        }
        if let Some(days) = velocity.days_to_critical.filter(|d| *d < 180.0) {
            parts.push(format!(
                "Critical threshold may be reached in approximately {} days.",
                days as i64
            ));
        }
    }

    if seasonality.periodic && seasonality.likelihood > 0.6 {
        if let Some(period) = seasonality.period_days {
            parts.push(format!(
                "Seasonal pattern detected with ~{} day cycle. Some changes may be natural seasonal variation.",
                period as i64
            ));
        }
    }

    parts.join(" ")
}
