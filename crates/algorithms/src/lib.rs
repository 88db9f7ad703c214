//! # GeoGuard Algorithms
//!
//! Change detection and multi-index fusion over satellite imagery.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: Spectral indices and their scalar summaries
//! - **change_point**: EWMA and CUSUM detectors, scalar or per pixel
//! - **temporal**: Trend, velocity, seasonality and forecast of one index
//! - **statistics**: Descriptive helpers and grid-based change hotspots
//! - **fusion**: Rules-based classification and composite risk scoring
//! - **alerts**: Priority scoring and spatio-temporal grouping of alerts

pub mod alerts;
pub mod change_point;
pub mod fusion;
pub mod imagery;
mod maybe_rayon;
pub mod statistics;
pub mod temporal;

use serde::{Deserialize, Serialize};

/// Whether an analysis had enough input to produce numbers.
///
/// Numeric fields of a result with [`Status::InsufficientData`] are zeroed
/// and should not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    InsufficientData,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alerts::{
        aoi_importance, group_related_alerts, prioritize, prioritize_alert, AlertContext,
        AlertRecord, PriorityLevel, PriorityParams, PriorityRecord, Urgency,
    };
    pub use crate::change_point::{
        detect_change_point, detect_change_point_stack, Baseline, ChangePointDetector,
        ChangePointResult, CusumParams, DetectorKind, DetectorParams, Direction, EwmaParams,
    };
    pub use crate::fusion::{
        AoiMetadata, ChangeCategory, Fusion, FusionConfig, FusionEngine, FusionResult, Region,
        RiskLevel,
    };
    pub use crate::imagery::{
        compute_indices, compute_indices_with, summarize, summarize_indices, IndexCalculator,
        IndexParams, IndexSummary, SpectralIndex, SummaryMap,
    };
    pub use crate::statistics::{analyze_hotspots, HotspotAnalyzer, HotspotParams, HotspotReport};
    pub use crate::temporal::{
        analyze_temporal, Polarity, TemporalAnalysis, TemporalAnalyzer, TemporalParams,
        TimeSeriesPoint,
    };
    pub use crate::Status;
    pub use geoguard_core::prelude::*;
}
