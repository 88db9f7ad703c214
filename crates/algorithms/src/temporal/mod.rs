//! Multi-temporal analysis of one index
//!
//! Trend (least squares), velocity and acceleration, severity buckets,
//! time to a critical threshold, anomalies, seasonality and a one-step
//! forecast.

mod analyzer;
mod seasonality;

pub use analyzer::{
    analyze_temporal, ChangeSeverity, Polarity, TemporalAnalysis, TemporalAnalyzer,
    TemporalParams, TimeSeriesPoint, Trend, TrendDirection, Velocity,
};
pub use seasonality::{anomalies, find_peaks, seasonality, Anomaly, AnomalyKind, Seasonality};
