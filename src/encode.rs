
//! Chunked residual encoding.
//!
//! The residuals of one hypercube are split into chunks of `W` consecutive
//! elements, where `W` is the bit width of the residual word. Every chunk
//! stores one occupancy mask word announcing which of its `W` bitplanes
//! contain a one bit anywhere, followed by exactly those bitplanes,
//! transposed into one word each. Zero bitplanes, which dominate after the
//! transform, occupy no space at all.

use bit_field::BitField;

use crate::error::{Result, UnitResult};
use crate::io::{ReadCursor, WriteCursor};
use crate::profile::{ResidualBits, Value};


/// Serialize the transformed hypercube.
/// Returns the number of bytes written, which never exceeds
/// the compressed block size bound of the profile.
pub(crate) fn encode_block<T: Value>(cube: &[T::Bits], out: &mut WriteCursor<'_>) -> Result<usize> {
    let start = out.position();

    for chunk in cube.chunks_exact(T::Bits::WIDTH) {
        let mut mask = T::Bits::default();
        for &element in chunk {
            mask |= element;
        }

        out.write_value(mask)?;

        for plane_index in (0 .. T::Bits::WIDTH).rev() {
            if mask.get_bit(plane_index) {
                out.write_value(transpose_plane(chunk, plane_index))?;
            }
        }
    }

    Ok(out.position() - start)
}

/// Parse one encoded hypercube into the residual buffer,
/// which is zeroed first. Planes the occupancy mask declares absent
/// therefore contribute zero bits.
pub(crate) fn decode_block<T: Value>(read: &mut ReadCursor<'_>, cube: &mut [T::Bits]) -> UnitResult {
    for element in cube.iter_mut() {
        *element = T::Bits::default();
    }

    for chunk in cube.chunks_exact_mut(T::Bits::WIDTH) {
        let mask: T::Bits = read.read_value()?;

        for plane_index in (0 .. T::Bits::WIDTH).rev() {
            if mask.get_bit(plane_index) {
                let plane: T::Bits = read.read_value()?;
                scatter_plane(chunk, plane_index, plane);
            }
        }
    }

    Ok(())
}

/// Gather bit `plane_index` of every chunk element into one word:
/// bit `j` of the result is bit `plane_index` of element `j`.
fn transpose_plane<B: ResidualBits>(chunk: &[B], plane_index: usize) -> B {
    let mut plane = B::default();

    for (element_index, element) in chunk.iter().enumerate() {
        if element.get_bit(plane_index) {
            plane.set_bit(element_index, true);
        }
    }

    plane
}

/// Scatter the plane word back: for every set bit `j`,
/// set bit `plane_index` of element `j`.
fn scatter_plane<B: ResidualBits>(chunk: &mut [B], plane_index: usize, plane: B) {
    for (element_index, element) in chunk.iter_mut().enumerate() {
        if plane.get_bit(element_index) {
            element.set_bit(plane_index, true);
        }
    }
}
