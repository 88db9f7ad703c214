//! Reduction of index rasters to scalar summaries

use std::collections::BTreeMap;

use geoguard_core::raster::Raster;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::indices::IndexRasters;

/// Scalar statistics of one index raster
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    /// Number of finite pixels that went into the statistics
    #[serde(default)]
    pub valid_count: usize,
}

impl IndexSummary {
    /// Summary of a single scalar observation
    pub fn from_value(value: f64) -> Self {
        Self {
            mean: value,
            min: value,
            max: value,
            std: 0.0,
            valid_count: 1,
        }
    }
}

/// Summaries keyed by index name, the format exchanged with the fusion engine
pub type SummaryMap = BTreeMap<String, IndexSummary>;

/// Reduce a raster to mean/min/max/std over its finite pixels.
///
/// A raster without any finite pixel yields all-zero statistics.
pub fn summarize(raster: &Raster<f64>) -> IndexSummary {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for v in raster.valid_values() {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if count == 0 {
        warn!(pixels = raster.len(), "no finite pixels, reporting zero summary");
        return IndexSummary::default();
    }

    let mean = sum / count as f64;
    let var = raster
        .valid_values()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / count as f64;

    IndexSummary {
        mean,
        min,
        max,
        std: var.sqrt(),
        valid_count: count,
    }
}

/// Summarize every computed index
pub fn summarize_indices(indices: &IndexRasters) -> SummaryMap {
    indices
        .iter()
        .map(|(index, raster)| (index.name().to_string(), summarize(raster)))
        .collect()
}
