
//! Compress and decompress dense multi-dimensional arrays
//! of `f32` or `f64` values without any unsafe code.
//!
//! The codec tiles the array into hypercubes of 4096 elements, transforms
//! each hypercube into sparse residuals, and encodes the surviving bitplanes
//! behind per-chunk occupancy masks. Hypercubes are grouped into
//! superblocks, and two levels of offset tables make every block
//! independently addressable, so compression and decompression
//! parallelize over superblocks.
//!
//! Three drivers share one stream format: [`sequential`] composes the
//! stages on the calling thread, [`parallel`] distributes superblocks over
//! a thread pool, and [`accelerator`] expresses the same work as grid
//! launches of cooperative work groups. All three produce byte-identical
//! streams. The stream does not record the value type or rank; decompress
//! with the same element type and extent rank that compressed the data.

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,

    clippy::all,
    clippy::pedantic,
)]

#![forbid(unsafe_code)]

pub mod error;
pub mod io; // public to allow custom runtimes to stage stream bytes

pub mod extent;
pub mod profile;
pub mod sequential;
pub mod accelerator;

#[cfg(feature = "rayon")]
pub mod parallel;

mod block;
mod transform;
mod encode;
mod meta;

use error::Result;
use extent::Extent;
use profile::Value;


/// Re-exports of everything commonly required to compress and decompress an array.
pub mod prelude {

    // main entry points
    pub use crate::compressed_size_bound;
    pub use crate::sequential;
    pub use crate::accelerator;

    #[cfg(feature = "rayon")]
    pub use crate::parallel;

    // data types
    pub use crate::extent::{Extent, Slice, SliceMut};
    pub use crate::profile::{Profile, Value};
    pub use crate::error::{Error, Result, UnitResult};
}


/// Upper bound on the compressed length of any array of the extent,
/// valid for every driver. Size compression buffers with this.
pub fn compressed_size_bound<T: Value, const D: usize>(extent: Extent<D>) -> Result<usize> {
    meta::FileLayout::<T, D>::new(extent)?.compressed_size_bound()
}
