//! Raster data structures

mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::{Footprint, GeoTransform};
pub use grid::Raster;
