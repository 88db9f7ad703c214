//! Statistical analysis
//!
//! - **descriptive**: mean, standard deviation, percentiles, least squares
//! - **hotspots**: grid-based localization of change between two rasters

pub mod descriptive;
pub mod hotspots;

pub use descriptive::{coefficient_of_variation, linear_regression, mean, percentile, std_dev, LinearFit};
pub use hotspots::{
    analyze_hotspots, change_magnitude, classify_distribution, grid_cells, CellWindow,
    Distribution, Hotspot, HotspotAnalyzer, HotspotParams, HotspotReport, HotspotSeverity,
};
