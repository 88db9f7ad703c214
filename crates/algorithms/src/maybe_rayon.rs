//! Parallel or sequential row fan-out for the raster kernels.
//!
//! Three loops go through here: spectral index evaluation (one task per
//! image row), the per-pixel change-point scan over a time stack (one task
//! per row of the stack) and hotspot scoring (one task per grid cell). With
//! the default `parallel` feature they run on rayon. Without it, as in
//! single-threaded or wasm builds of the detector, the same call sites
//! compile against the sequential `into_par_iter` below. Results come out
//! identical either way since every loop collects in input order.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Row ranges and cell lists iterate in place of a rayon split.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
