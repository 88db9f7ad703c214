//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, EVI, SAVI, NDWI, MNDWI, NDBI, BAI, BSI, NBRI,
//!   thermal proxy, algae and turbidity indices
//! - Summaries: mean/min/max/std reduction of index rasters

mod indices;
mod summary;

pub use indices::{
    compute_index, compute_indices, compute_indices_with, normalized_difference,
    IndexCalculator, IndexParams, IndexRasters, SpectralIndex, EPSILON,
};
pub use summary::{summarize, summarize_indices, IndexSummary, SummaryMap};
