//! Spectral index catalog
//!
//! Every index is a pure per-pixel function of a few bands. Denominators carry
//! a small epsilon instead of NaN masking, so degenerate pixels produce large
//! but finite values rather than failures. Results are not clipped.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::maybe_rayon::*;
use geoguard_core::band::{Band, BandSet};
use geoguard_core::raster::Raster;
use geoguard_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Added to every denominator
pub const EPSILON: f64 = 1e-8;

/// Spectral indices computed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Enhanced Vegetation Index
    Evi,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
    /// Modified NDWI (Xu, uses SWIR)
    Mndwi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Burned Area Index
    Bai,
    /// Bare Soil Index
    Bsi,
    /// Normalized Burn Ratio
    Nbri,
    /// SWIR-1 reflectance standing in for a thermal band
    ThermalProxy,
    /// Red-edge over red, rises with chlorophyll in water
    AlgaeIndex,
    /// Red over NIR, rises with suspended sediment
    TurbidityIndex,
}

impl SpectralIndex {
    /// Whole catalog in evaluation order
    pub const ALL: [SpectralIndex; 12] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Evi,
        SpectralIndex::Savi,
        SpectralIndex::Ndwi,
        SpectralIndex::Mndwi,
        SpectralIndex::Ndbi,
        SpectralIndex::Bai,
        SpectralIndex::Bsi,
        SpectralIndex::Nbri,
        SpectralIndex::ThermalProxy,
        SpectralIndex::AlgaeIndex,
        SpectralIndex::TurbidityIndex,
    ];

    /// Key used in summary maps and configuration tables
    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Evi => "evi",
            SpectralIndex::Savi => "savi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Mndwi => "mndwi",
            SpectralIndex::Ndbi => "ndbi",
            SpectralIndex::Bai => "bai",
            SpectralIndex::Bsi => "bsi",
            SpectralIndex::Nbri => "nbri",
            SpectralIndex::ThermalProxy => "thermal_proxy",
            SpectralIndex::AlgaeIndex => "algae_index",
            SpectralIndex::TurbidityIndex => "turbidity_index",
        }
    }

    /// Bands the formula reads, in the order [`evaluate`](Self::evaluate) expects them
    pub fn required_bands(self) -> &'static [Band] {
        use Band::*;
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Savi | SpectralIndex::Bai => &[Nir, Red],
            SpectralIndex::Evi => &[Nir, Red, Blue],
            SpectralIndex::Ndwi => &[Green, Nir],
            SpectralIndex::Mndwi => &[Green, Swir1],
            SpectralIndex::Ndbi => &[Swir1, Nir],
            SpectralIndex::Bsi => &[Swir1, Red, Nir, Blue],
            SpectralIndex::Nbri => &[Nir, Swir2],
            SpectralIndex::ThermalProxy => &[Swir1],
            SpectralIndex::AlgaeIndex => &[RedEdge1, Red],
            SpectralIndex::TurbidityIndex => &[Red, Nir],
        }
    }

    /// Evaluate the formula for one pixel.
    ///
    /// `px` holds the band values in [`required_bands`](Self::required_bands) order.
    ///
    /// ```text
    /// ndvi   = (nir - red) / (nir + red)
    /// evi    = 2.5 (nir - red) / (nir + 6 red - 7.5 blue + 1)
    /// savi   = (nir - red) / (nir + red + L) * (1 + L)
    /// bai    = 1 / ((0.1 - red)^2 + (0.06 - nir)^2)
    /// bsi    = ((swir1 + red) - (nir + blue)) / ((swir1 + red) + (nir + blue))
    /// ```
    pub fn evaluate(self, px: &[f64], savi_l: f64) -> f64 {
        match self {
            SpectralIndex::Ndvi
            | SpectralIndex::Ndwi
            | SpectralIndex::Mndwi
            | SpectralIndex::Ndbi
            | SpectralIndex::Nbri => nd(px[0], px[1]),
            SpectralIndex::Evi => {
                let (nir, red, blue) = (px[0], px[1], px[2]);
                2.5 * (nir - red) / (nir + 6.0 * red - 7.5 * blue + 1.0 + EPSILON)
            }
            SpectralIndex::Savi => {
                let (nir, red) = (px[0], px[1]);
                (nir - red) / (nir + red + savi_l + EPSILON) * (1.0 + savi_l)
            }
            SpectralIndex::Bai => {
                let (nir, red) = (px[0], px[1]);
                1.0 / ((0.1 - red).powi(2) + (0.06 - nir).powi(2) + EPSILON)
            }
            SpectralIndex::Bsi => nd(px[0] + px[1], px[2] + px[3]),
            SpectralIndex::ThermalProxy => px[0],
            SpectralIndex::AlgaeIndex | SpectralIndex::TurbidityIndex => {
                px[0] / (px[1] + EPSILON)
            }
        }
    }
}

#[inline]
fn nd(a: f64, b: f64) -> f64 {
    (a - b) / (a + b + EPSILON)
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        SpectralIndex::ALL
            .into_iter()
            .find(|idx| idx.name() == key)
            .or(match key.as_str() {
                "nbr" => Some(SpectralIndex::Nbri),
                "thermal" => Some(SpectralIndex::ThermalProxy),
                "algae" => Some(SpectralIndex::AlgaeIndex),
                "turbidity" => Some(SpectralIndex::TurbidityIndex),
                _ => None,
            })
            .ok_or_else(|| Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "unknown spectral index".into(),
            })
    }
}

/// Parameters for [`compute_indices_with`]
#[derive(Debug, Clone)]
pub struct IndexParams {
    /// Subset to compute; `None` computes the whole catalog
    pub indices: Option<Vec<SpectralIndex>>,
    /// SAVI soil brightness correction factor
    /// Default: 0.5
    pub savi_l: f64,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            indices: None,
            savi_l: 0.5,
        }
    }
}

/// Computed index rasters keyed by index
pub type IndexRasters = BTreeMap<SpectralIndex, Raster<f64>>;

/// Index calculator algorithm
#[derive(Debug, Clone, Default)]
pub struct IndexCalculator;

impl Algorithm for IndexCalculator {
    type Input = BandSet;
    type Output = IndexRasters;
    type Params = IndexParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "IndexCalculator"
    }

    fn description(&self) -> &'static str {
        "Derive vegetation, water, built-up, burn and water-quality indices from a band set"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        compute_indices_with(&input, &params)
    }
}

/// Compute every catalog index whose bands are present.
///
/// Indices with a missing band are left out of the result; that is not an error.
pub fn compute_indices(bands: &BandSet) -> Result<IndexRasters> {
    compute_indices_with(bands, &IndexParams::default())
}

/// Compute a selection of indices
pub fn compute_indices_with(bands: &BandSet, params: &IndexParams) -> Result<IndexRasters> {
    if params.savi_l < 0.0 || !params.savi_l.is_finite() {
        return Err(Error::InvalidParameter {
            name: "savi_l",
            value: params.savi_l.to_string(),
            reason: "must be a finite non-negative number".into(),
        });
    }

    let selection: &[SpectralIndex] = params.indices.as_deref().unwrap_or(&SpectralIndex::ALL);
    let mut out = IndexRasters::new();

    for &index in selection {
        let inputs: Option<Vec<&Raster<f64>>> = index
            .required_bands()
            .iter()
            .map(|&band| bands.get(band))
            .collect();

        let Some(inputs) = inputs else {
            debug!(index = index.name(), "skipping index, required band missing");
            continue;
        };

        let raster = pixelwise(&inputs, |px| index.evaluate(px, params.savi_l))?;
        out.insert(index, raster);
    }

    debug!(computed = out.len(), bands = bands.len(), "spectral indices computed");
    Ok(out)
}

/// Compute a single index, `None` when a band is missing
pub fn compute_index(
    bands: &BandSet,
    index: SpectralIndex,
    params: &IndexParams,
) -> Result<Option<Raster<f64>>> {
    let single = IndexParams {
        indices: Some(vec![index]),
        savi_l: params.savi_l,
    };
    Ok(compute_indices_with(bands, &single)?.remove(&index))
}

/// Generic normalized difference `(a - b) / (a + b + eps)`
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.ensure_same_shape(band_b)?;
    pixelwise(&[band_a, band_b], |px| nd(px[0], px[1]))
}

/// Row-parallel evaluation of `f` over co-registered inputs
fn pixelwise<F>(inputs: &[&Raster<f64>], f: F) -> Result<Raster<f64>>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let first = inputs
        .first()
        .ok_or_else(|| Error::Algorithm("pixelwise evaluation needs at least one band".into()))?;
    let (rows, cols) = first.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let views: Vec<_> = inputs.iter().map(|r| r.data().row(row)).collect();
            let mut px = vec![0.0; inputs.len()];
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                for (slot, view) in px.iter_mut().zip(&views) {
                    *slot = view[col];
                }
                row_data.push(f(&px));
            }
            row_data
        })
        .collect();

    let mut out = Raster::from_vec(data, rows, cols)?;
    out.set_transform(first.transform().copied());
    Ok(out)
}
