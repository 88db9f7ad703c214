//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2, Zip};

/// A 2D grid of cell values with optional georeferencing.
///
/// Rasters are stored row-major as `(row, col)`. Every band and index raster
/// exchanged by the engine is a `Raster<f64>`; flags use `Raster<u8>`.
///
/// # Example
///
/// ```
/// use geoguard_core::Raster;
///
/// let mut nir: Raster<f64> = Raster::filled(4, 4, 0.42);
/// nir.set(1, 2, 0.10).unwrap();
/// assert_eq!(nir.get(1, 2).unwrap(), 0.10);
/// assert_eq!(nir.shape(), (4, 4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: Option<GeoTransform>,
}

impl<T: RasterElement> Raster<T> {
    /// Raster of zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Raster filled with a single value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Wrap an existing array
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: None,
        }
    }

    /// Build from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Build from nested rows (the shape JSON payloads arrive in).
    ///
    /// All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::InvalidDimensions { width, height });
        }
        Self::from_vec(rows.into_iter().flatten().collect(), height, width)
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Error unless `other` has exactly the same shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        Ok(())
    }

    // Data access

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Iterator over values that are usable in reductions (finite floats)
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(|v| v.is_valid())
    }

    /// Apply `f` cell by cell, keeping georeferencing
    pub fn map<U: RasterElement>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
        }
    }

    /// Combine two co-registered rasters cell by cell
    pub fn zip_map<U: RasterElement, V: RasterElement>(
        &self,
        other: &Raster<U>,
        f: impl Fn(T, U) -> V,
    ) -> Result<Raster<V>> {
        self.ensure_same_shape(other)?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));
        Ok(Raster {
            data,
            transform: self.transform,
        })
    }

    // Metadata

    pub fn transform(&self) -> Option<&GeoTransform> {
        self.transform.as_ref()
    }

    pub fn set_transform(&mut self, transform: Option<GeoTransform>) {
        self.transform = transform;
    }

    /// Builder-style variant of [`set_transform`](Self::set_transform)
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(30, 40);
        assert_eq!(raster.rows(), 30);
        assert_eq!(raster.cols(), 40);
        assert_eq!(raster.len(), 1200);
        assert!(raster.transform().is_none());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let ragged = vec![vec![0.1, 0.2], vec![0.3]];
        assert!(Raster::<f64>::from_rows(ragged).is_err());

        let ok = Raster::from_rows(vec![vec![0.1, 0.2], vec![0.3, 0.4]]).unwrap();
        assert_eq!(ok.shape(), (2, 2));
        assert_eq!(ok.get(1, 0).unwrap(), 0.3);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut raster: Raster<f64> = Raster::new(3, 3);
        assert!(raster.get(3, 0).is_err());
        assert!(raster.set(0, 3, 1.0).is_err());
    }

    #[test]
    fn test_valid_values_skip_non_finite() {
        let raster =
            Raster::from_vec(vec![0.2, f64::NAN, f64::INFINITY, 0.4], 2, 2).unwrap();
        let valid: Vec<f64> = raster.valid_values().collect();
        assert_eq!(valid, vec![0.2, 0.4]);
    }

    #[test]
    fn test_zip_map_keeps_transform() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let a: Raster<f64> = Raster::filled(2, 2, 0.5).with_transform(gt);
        let b = Raster::filled(2, 2, 0.2);

        let diff = a.zip_map(&b, |x, y| x - y).unwrap();
        assert_eq!(diff.transform(), Some(&gt));
        assert!((diff.get(0, 0).unwrap() - 0.3).abs() < 1e-12);

        let c: Raster<f64> = Raster::new(3, 2);
        assert!(a.zip_map(&c, |x, y| x + y).is_err());
    }
}
