//! Affine georeferencing for index rasters

use serde::{Deserialize, Serialize};

/// Affine transformation from pixel (col, row) to map coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up scenes have zero rotation terms and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    #[serde(default)]
    pub row_rotation: f64,
    #[serde(default)]
    pub col_rotation: f64,
}

/// Axis-aligned map-space footprint `(min_x, min_y, max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Footprint {
    /// Center point of the footprint
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Map coordinates of a pixel corner (fractional pixel positions allowed)
    pub fn corner(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Footprint of the pixel window `[row_start, row_end) x [col_start, col_end)`.
    pub fn window_footprint(
        &self,
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
    ) -> Footprint {
        let corners = [
            self.corner(col_start as f64, row_start as f64),
            self.corner(col_end as f64, row_start as f64),
            self.corner(col_start as f64, row_end as f64),
            self.corner(col_end as f64, row_end as f64),
        ];

        let mut fp = Footprint {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            fp.min_x = fp.min_x.min(x);
            fp.min_y = fp.min_y.min(y);
            fp.max_x = fp.max_x.max(x);
            fp.max_y = fp.max_y.max(y);
        }
        fp
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_footprint_north_up() {
        let gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let fp = gt.window_footprint(0, 2, 1, 4);

        assert_relative_eq!(fp.min_x, 10.0, epsilon = 1e-10);
        assert_relative_eq!(fp.max_x, 40.0, epsilon = 1e-10);
        assert_relative_eq!(fp.min_y, 80.0, epsilon = 1e-10);
        assert_relative_eq!(fp.max_y, 100.0, epsilon = 1e-10);
        assert_eq!(fp.center(), (25.0, 90.0));
    }
}
