//! Grid-based change hotspots
//!
//! The absolute before/after difference is partitioned into an N x N grid.
//! Cells whose mean change exceeds a percentile of the whole difference
//! raster are hotspots. The grid layout of the hotspots is then classified
//! by 8-connected adjacency.

use crate::maybe_rayon::*;
use crate::statistics::descriptive::percentile;
use geoguard_core::raster::{Footprint, Raster};
use geoguard_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Parameters for [`analyze_hotspots`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotspotParams {
    /// Cells per side of the analysis grid
    /// Default: 10
    pub grid_size: usize,
    /// Percentile of the change raster used as hotspot threshold
    /// Default: 90
    pub percentile: f64,
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            grid_size: 10,
            percentile: 90.0,
        }
    }
}

/// Hotspot grade by intensity over threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotSeverity {
    Low,
    Moderate,
    High,
    Critical,
}

impl HotspotSeverity {
    /// `ratio > 2.0` critical, `> 1.5` high, `> 1.2` moderate, else low.
    /// The ratio is 1 when the threshold is not positive.
    pub fn classify(intensity: f64, threshold: f64) -> Self {
        let ratio = if threshold > 0.0 { intensity / threshold } else { 1.0 };
        if ratio > 2.0 {
            HotspotSeverity::Critical
        } else if ratio > 1.5 {
            HotspotSeverity::High
        } else if ratio > 1.2 {
            HotspotSeverity::Moderate
        } else {
            HotspotSeverity::Low
        }
    }
}

/// Spatial arrangement of the hotspot cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    None,
    Isolated,
    Clustered,
    Scattered,
    Dispersed,
}

/// One grid cell with concentrated change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// Grid row of the cell
    pub row: usize,
    /// Grid column of the cell
    pub col: usize,
    /// Mean absolute change over the cell
    pub intensity: f64,
    pub max_intensity: f64,
    /// Pixels in the cell above the threshold
    pub pixel_count: usize,
    pub severity: HotspotSeverity,
    /// Map extent of the cell when the raster is georeferenced
    pub bounds: Option<Footprint>,
}

/// Hotspots of one before/after pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    pub hotspots: Vec<Hotspot>,
    pub distribution: Distribution,
    /// Always `grid_size²`
    pub cells_analyzed: usize,
    pub threshold: f64,
    pub coverage_percent: f64,
    pub largest_hotspot: Option<Hotspot>,
    pub total_pixels: usize,
}

impl HotspotReport {
    pub fn total_hotspots(&self) -> usize {
        self.hotspots.len()
    }

    pub fn hotspot_pixels(&self) -> usize {
        self.hotspots.iter().map(|h| h.pixel_count).sum()
    }
}

/// Pixel window of one grid cell, half-open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindow {
    pub grid_row: usize,
    pub grid_col: usize,
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

/// Partition a `rows x cols` raster into `n x n` windows.
///
/// Cells are `rows / n` by `cols / n`; the last row and column of cells
/// absorb the remainder. Windows may be empty when the raster is smaller
/// than the grid.
pub fn grid_cells(rows: usize, cols: usize, n: usize) -> Vec<CellWindow> {
    let ch = rows / n.max(1);
    let cw = cols / n.max(1);
    let mut cells = Vec::with_capacity(n * n);
    for gr in 0..n {
        for gc in 0..n {
            let row_end = if gr + 1 == n { rows } else { (gr + 1) * ch };
            let col_end = if gc + 1 == n { cols } else { (gc + 1) * cw };
            cells.push(CellWindow {
                grid_row: gr,
                grid_col: gc,
                row_start: (gr * ch).min(row_end),
                row_end,
                col_start: (gc * cw).min(col_end),
                col_end,
            });
        }
    }
    cells
}

/// `|after - before|`, NaN where either input is not finite
pub fn change_magnitude(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    before.zip_map(after, |b, a| {
        if b.is_finite() && a.is_finite() {
            (a - b).abs()
        } else {
            f64::NAN
        }
    })
}

/// Hotspot analysis algorithm
#[derive(Debug, Clone, Default)]
pub struct HotspotAnalyzer;

impl Algorithm for HotspotAnalyzer {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = HotspotReport;
    type Params = HotspotParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "HotspotAnalyzer"
    }

    fn description(&self) -> &'static str {
        "Localize where change between two index rasters is concentrated"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        analyze_hotspots(&input.0, &input.1, &params)
    }
}

/// Find grid cells where the change between two co-registered rasters is concentrated.
///
/// # Arguments
/// * `before` - Index raster at the earlier date
/// * `after` - Index raster at the later date, same shape
/// * `params` - Grid size and threshold percentile
pub fn analyze_hotspots(
    before: &Raster<f64>,
    after: &Raster<f64>,
    params: &HotspotParams,
) -> Result<HotspotReport> {
    if params.grid_size == 0 {
        return Err(Error::InvalidParameter {
            name: "grid_size",
            value: "0".into(),
            reason: "grid must have at least one cell per side".into(),
        });
    }
    if !(0.0..=100.0).contains(&params.percentile) {
        return Err(Error::InvalidParameter {
            name: "percentile",
            value: params.percentile.to_string(),
            reason: "must be within [0, 100]".into(),
        });
    }

    let change = change_magnitude(before, after)?;
    let (rows, cols) = change.shape();
    let n = params.grid_size;
    let cells_analyzed = n * n;

    let finite: Vec<f64> = change.valid_values().collect();
    let Some(threshold) = percentile(&finite, params.percentile) else {
        warn!(rows, cols, "no finite change values, no hotspots");
        return Ok(HotspotReport {
            hotspots: Vec::new(),
            distribution: Distribution::None,
            cells_analyzed,
            threshold: 0.0,
            coverage_percent: 0.0,
            largest_hotspot: None,
            total_pixels: rows * cols,
        });
    };

    let data = change.data();
    let transform = change.transform().copied();
    let hotspots: Vec<Hotspot> = grid_cells(rows, cols, n)
        .into_par_iter()
        .filter_map(|cell| {
            let mut sum = 0.0;
            let mut count = 0usize;
            let mut max = f64::NEG_INFINITY;
            let mut above = 0usize;
            for r in cell.row_start..cell.row_end {
                for c in cell.col_start..cell.col_end {
                    let v = data[(r, c)];
                    if !v.is_finite() {
                        continue;
                    }
                    sum += v;
                    count += 1;
                    max = max.max(v);
                    if v > threshold {
                        above += 1;
                    }
                }
            }
            if count == 0 {
                return None;
            }
            let intensity = sum / count as f64;
            (intensity > threshold).then(|| Hotspot {
                row: cell.grid_row,
                col: cell.grid_col,
                intensity,
                max_intensity: max,
                pixel_count: above,
                severity: HotspotSeverity::classify(intensity, threshold),
                bounds: transform.map(|gt| {
                    gt.window_footprint(cell.row_start, cell.row_end, cell.col_start, cell.col_end)
                }),
            })
        })
        .collect();

    let distribution = classify_distribution(&hotspots);
    let largest_hotspot = hotspots
        .iter()
        .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        .cloned();
    let coverage_percent = hotspots.len() as f64 / cells_analyzed as f64 * 100.0;

    debug!(
        threshold,
        hotspots = hotspots.len(),
        distribution = ?distribution,
        "hotspot analysis"
    );

    Ok(HotspotReport {
        hotspots,
        distribution,
        cells_analyzed,
        threshold,
        coverage_percent,
        largest_hotspot,
        total_pixels: rows * cols,
    })
}

/// Classify hotspot layout by 8-connected adjacency of grid cells.
///
/// ```text
/// 0 hotspots                                   none
/// largest component > half of them (and >= 2)  clustered
/// no two adjacent, count <= 3                  isolated
/// no two adjacent, count > 3                   scattered
/// otherwise                                    dispersed
/// ```
pub fn classify_distribution(hotspots: &[Hotspot]) -> Distribution {
    let n = hotspots.len();
    if n == 0 {
        return Distribution::None;
    }

    let adjacent = |a: &Hotspot, b: &Hotspot| a.row.abs_diff(b.row) <= 1 && a.col.abs_diff(b.col) <= 1;

    let mut component = vec![usize::MAX; n];
    let mut sizes = Vec::new();
    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = sizes.len();
        let mut size = 0;
        let mut stack = vec![start];
        component[start] = id;
        while let Some(i) = stack.pop() {
            size += 1;
            for j in 0..n {
                if component[j] == usize::MAX && adjacent(&hotspots[i], &hotspots[j]) {
                    component[j] = id;
                    stack.push(j);
                }
            }
        }
        sizes.push(size);
    }

    let largest = sizes.iter().copied().max().unwrap_or(0);
    if largest >= 2 && largest * 2 > n {
        Distribution::Clustered
    } else if largest == 1 && n <= 3 {
        Distribution::Isolated
    } else if largest == 1 {
        Distribution::Scattered
    } else {
        Distribution::Dispersed
    }
}
