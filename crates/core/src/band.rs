//! Spectral bands and co-registered band sets

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reflectance band of an optical earth-observation sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    RedEdge1,
    RedEdge2,
    RedEdge3,
    Swir1,
    Swir2,
}

/// Band layout of a Sentinel-2 L2A stack: B02, B03, B04, B08, B05, B06, B07, B11, B12.
pub const SENTINEL2_ORDER: [Band; 9] = [
    Band::Blue,
    Band::Green,
    Band::Red,
    Band::Nir,
    Band::RedEdge1,
    Band::RedEdge2,
    Band::RedEdge3,
    Band::Swir1,
    Band::Swir2,
];

/// Minimum number of layers a stack must carry (blue, green, red, nir)
pub const MIN_STACK_BANDS: usize = 4;

impl Band {
    pub fn name(self) -> &'static str {
        match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::RedEdge1 => "red_edge_1",
            Band::RedEdge2 => "red_edge_2",
            Band::RedEdge3 => "red_edge_3",
            Band::Swir1 => "swir_1",
            Band::Swir2 => "swir_2",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = Error;

    /// Accepts canonical names, compact aliases (`swir1`, `rededge1`) and
    /// Sentinel-2 band codes (`b08`).
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        let band = match key.as_str() {
            "blue" | "b2" | "b02" => Band::Blue,
            "green" | "b3" | "b03" => Band::Green,
            "red" | "b4" | "b04" => Band::Red,
            "nir" | "nearinfrared" | "b8" | "b08" => Band::Nir,
            "rededge1" | "re1" | "b5" | "b05" => Band::RedEdge1,
            "rededge2" | "re2" | "b6" | "b06" => Band::RedEdge2,
            "rededge3" | "re3" | "b7" | "b07" => Band::RedEdge3,
            "swir1" | "swir" | "b11" => Band::Swir1,
            "swir2" | "b12" => Band::Swir2,
            _ => {
                return Err(Error::InvalidParameter {
                    name: "band",
                    value: s.to_string(),
                    reason: "unknown band name".into(),
                })
            }
        };
        Ok(band)
    }
}

/// Co-registered reflectance rasters keyed by band.
///
/// Every raster in the set has the same shape; [`BandSet::insert`] rejects a
/// raster that disagrees with the bands already present.
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    bands: BTreeMap<Band, Raster<f64>>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a band
    pub fn insert(&mut self, band: Band, raster: Raster<f64>) -> Result<()> {
        if let Some((_, existing)) = self.bands.iter().find(|(b, _)| **b != band) {
            existing.ensure_same_shape(&raster)?;
        }
        self.bands.insert(band, raster);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, band: Band, raster: Raster<f64>) -> Result<Self> {
        self.insert(band, raster)?;
        Ok(self)
    }

    /// Build from `(name, raster)` pairs, parsing names with [`Band::from_str`]
    pub fn from_named<I, S>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Raster<f64>)>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for (name, raster) in layers {
            set.insert(name.as_ref().parse()?, raster)?;
        }
        Ok(set)
    }

    /// Split a `(rows, cols, bands)` cube into a band set.
    ///
    /// `order` names the band of each layer and defaults to [`SENTINEL2_ORDER`].
    /// Layers beyond the order are ignored; fewer than four layers is an error.
    pub fn from_stack(
        stack: &Array3<f64>,
        order: Option<&[Band]>,
        transform: Option<GeoTransform>,
    ) -> Result<Self> {
        let (rows, cols, layers) = stack.dim();
        if layers < MIN_STACK_BANDS || rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let order = order.unwrap_or(&SENTINEL2_ORDER);

        let mut set = Self::new();
        for (layer, &band) in order.iter().enumerate().take(layers) {
            let mut raster = Raster::from_array(stack.slice(s![.., .., layer]).to_owned());
            raster.set_transform(transform);
            set.insert(band, raster)?;
        }
        Ok(set)
    }

    pub fn get(&self, band: Band) -> Option<&Raster<f64>> {
        self.bands.get(&band)
    }

    pub fn contains(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    /// `(rows, cols)` shared by every band, `None` when empty
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.values().next().map(Raster::shape)
    }

    /// Georeferencing of the first band that carries one
    pub fn transform(&self) -> Option<GeoTransform> {
        self.bands.values().find_map(|r| r.transform().copied())
    }

    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        self.bands.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, &Raster<f64>)> {
        self.bands.iter().map(|(b, r)| (*b, r))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_aliases() {
        assert_eq!("B08".parse::<Band>().unwrap(), Band::Nir);
        assert_eq!("swir1".parse::<Band>().unwrap(), Band::Swir1);
        assert_eq!("SWIR_2".parse::<Band>().unwrap(), Band::Swir2);
        assert_eq!("red-edge-1".parse::<Band>().unwrap(), Band::RedEdge1);
        assert!("thermal".parse::<Band>().is_err());
    }

    #[test]
    fn test_insert_rejects_shape_mismatch() {
        let mut set = BandSet::new();
        set.insert(Band::Red, Raster::filled(4, 4, 0.1)).unwrap();
        assert!(set.insert(Band::Nir, Raster::filled(4, 5, 0.4)).is_err());
        // Replacing a band with a new shape is fine when it is the only band
        set.insert(Band::Red, Raster::filled(2, 2, 0.1)).unwrap();
        assert_eq!(set.shape(), Some((2, 2)));
    }

    #[test]
    fn test_from_stack_sentinel2_order() {
        let mut cube = Array3::<f64>::zeros((3, 3, 9));
        for layer in 0..9 {
            cube.slice_mut(s![.., .., layer]).fill(layer as f64 / 10.0);
        }
        let set = BandSet::from_stack(&cube, None, None).unwrap();
        assert_eq!(set.len(), 9);
        assert_eq!(set.get(Band::Nir).unwrap().get(0, 0).unwrap(), 0.3);
        assert_eq!(set.get(Band::RedEdge1).unwrap().get(1, 1).unwrap(), 0.4);
        assert_eq!(set.get(Band::Swir2).unwrap().get(2, 2).unwrap(), 0.8);
    }

    #[test]
    fn test_from_stack_needs_four_bands() {
        let cube = Array3::<f64>::zeros((3, 3, 3));
        assert!(BandSet::from_stack(&cube, None, None).is_err());

        let four = Array3::<f64>::zeros((3, 3, 4));
        let set = BandSet::from_stack(&four, None, None).unwrap();
        assert!(set.contains(Band::Nir));
        assert!(!set.contains(Band::Swir1));
    }
}
