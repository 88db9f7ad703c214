//! Cell value types that can live in a [`Raster`](super::Raster)

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Numeric cell value.
///
/// Reflectance bands and spectral indices are `f64`; change flags are `u8`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Whether the value is usable in a reduction (finite for floats, always for ints)
    fn is_valid(&self) -> bool;

    /// Lossy conversion to `f64`
    fn as_f64(self) -> f64 {
        NumCast::from(self).unwrap_or(f64::NAN)
    }
}

macro_rules! impl_element_int {
    ($($t:ty),*) => {
        $(impl RasterElement for $t {
            fn is_valid(&self) -> bool {
                true
            }
        })*
    };
}

macro_rules! impl_element_float {
    ($($t:ty),*) => {
        $(impl RasterElement for $t {
            fn is_valid(&self) -> bool {
                self.is_finite()
            }
        })*
    };
}

impl_element_int!(u8, u16, i32);
impl_element_float!(f32, f64);
