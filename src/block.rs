
//! Hypercube enumeration over an extent, moving elements between the
//! array and a residual cube buffer, and the packed border region.
//!
//! Hypercubes tile the array from its lowest corner; whatever their grid
//! does not cover is the border, which travels through the stream verbatim.

use crate::error::{Result, UnitResult};
use crate::extent::{Extent, Slice, SliceMut};
use crate::io::{ReadCursor, WriteCursor};
use crate::profile::{hypercube_side_length, Value};


/// The grid of hypercubes covering the lower-aligned part of an extent.
/// Everything here is determined solely by the extent and the rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HypercubeGrid<const D: usize> {
    extent: Extent<D>,
    side_length: usize,
    cube_counts: [usize; D],
}

impl<const D: usize> HypercubeGrid<D> {

    /// The hypercube grid of the extent. Extents smaller than one
    /// hypercube side produce an empty grid along that dimension.
    pub fn new(extent: Extent<D>) -> Self {
        let side_length = hypercube_side_length(D);

        let mut cube_counts = [0_usize; D];
        for dimension in 0 .. D {
            cube_counts[dimension] = extent.components[dimension] / side_length;
        }

        Self { extent, side_length, cube_counts }
    }

    pub fn extent(&self) -> Extent<D> {
        self.extent
    }

    pub fn side_length(&self) -> usize {
        self.side_length
    }

    /// Total number of hypercubes in the grid.
    pub fn num_hypercubes(&self) -> usize {
        self.cube_counts.iter().product()
    }

    /// Lowest-corner multi-index of the hypercube,
    /// enumerated in row-major order over the grid.
    pub fn hypercube_origin(&self, hypercube_index: usize) -> [usize; D] {
        debug_assert!(hypercube_index < self.num_hypercubes());

        let mut origin = [0_usize; D];
        let mut remaining = hypercube_index;

        for dimension in (0 .. D).rev() {
            origin[dimension] = (remaining % self.cube_counts[dimension]) * self.side_length;
            remaining /= self.cube_counts[dimension];
        }

        origin
    }

    /// Per dimension, the number of elements covered by hypercubes.
    fn covered(&self, dimension: usize) -> usize {
        self.cube_counts[dimension] * self.side_length
    }

    /// Number of elements outside every hypercube.
    /// The element count of the extent is validated before the grid is built,
    /// so neither product can overflow.
    pub fn border_element_count(&self) -> usize {
        let total: usize = self.extent.components.iter().product();
        let covered: usize = (0 .. D).map(|dimension| self.covered(dimension)).product();
        total - covered
    }

    /// Visit every row-major row of the extent as `(row_start_offset, covered_length)`:
    /// the first `covered_length` elements of the row belong to some hypercube,
    /// the remaining elements belong to the border.
    fn for_each_row(&self, mut visit: impl FnMut(usize, usize)) {
        let row_length = self.extent.components[D - 1];
        let num_rows: usize = self.extent.components[.. D - 1].iter().product();
        let covered_row_length = self.covered(D - 1);

        for row in 0 .. num_rows {
            // decompose the row index into the leading coordinates
            let mut remaining = row;
            let mut row_is_covered = true;
            for dimension in (0 .. D - 1).rev() {
                let coordinate = remaining % self.extent.components[dimension];
                remaining /= self.extent.components[dimension];
                row_is_covered &= coordinate < self.covered(dimension);
            }

            let covered_length = if row_is_covered { covered_row_length } else { 0 };
            visit(row * row_length, covered_length);
        }
    }
}


/// Load the hypercube at the origin into the cube buffer,
/// mapping every element to its residual representation,
/// in canonical nested row-major order.
pub(crate) fn load_hypercube<T: Value, const D: usize>(
    data: &Slice<'_, T, D>, origin: [usize; D],
    grid: &HypercubeGrid<D>, cube: &mut [T::Bits],
) {
    let side_length = grid.side_length();
    let extent = grid.extent();
    let source = data.data();

    for (row, cube_row) in cube.chunks_exact_mut(side_length).enumerate() {
        let start = extent.linear_offset(row_index::<D>(origin, row, side_length));

        for (target, value) in cube_row.iter_mut().zip(&source[start .. start + side_length]) {
            *target = value.to_residual_bits();
        }
    }
}

/// Store the cube buffer back into the array at the origin,
/// the exact inverse of `load_hypercube`.
pub(crate) fn store_hypercube<T: Value, const D: usize>(
    data: &mut SliceMut<'_, T, D>, origin: [usize; D],
    grid: &HypercubeGrid<D>, cube: &[T::Bits],
) {
    let side_length = grid.side_length();
    let extent = grid.extent();
    let target = data.data();

    for (row, cube_row) in cube.chunks_exact(side_length).enumerate() {
        let start = extent.linear_offset(row_index::<D>(origin, row, side_length));

        for (value, &residual) in target[start .. start + side_length].iter_mut().zip(cube_row) {
            *value = T::from_residual_bits(residual);
        }
    }
}

/// Multi-index of the first element of the `row`-th side-length row
/// of the hypercube at `origin`.
fn row_index<const D: usize>(origin: [usize; D], row: usize, side_length: usize) -> [usize; D] {
    let mut index = origin;
    let mut remaining = row;

    for dimension in (0 .. D - 1).rev() {
        index[dimension] += remaining % side_length;
        remaining /= side_length;
    }

    index
}


/// Append every border element to the stream as its raw little-endian
/// bit pattern, in row-major scan order.
pub(crate) fn pack_border<T: Value, const D: usize>(
    data: &Slice<'_, T, D>, grid: &HypercubeGrid<D>, out: &mut WriteCursor<'_>,
) -> UnitResult {
    let source = data.data();
    let row_length = grid.extent().components[D - 1];

    let mut result = Ok(());
    grid.for_each_row(|row_start, covered_length| {
        if result.is_ok() && covered_length < row_length {
            let row_border = &source[row_start + covered_length .. row_start + row_length];
            result = out.write_values(row_border);
        }
    });

    result
}

/// Read every border element back from the stream.
/// Returns the number of border bytes consumed.
pub(crate) fn unpack_border<T: Value, const D: usize>(
    data: &mut SliceMut<'_, T, D>, grid: &HypercubeGrid<D>, read: &mut ReadCursor<'_>,
) -> Result<usize> {
    let start = read.position();
    let row_length = grid.extent().components[D - 1];
    let target = data.data();

    let mut result = Ok(());
    grid.for_each_row(|row_start, covered_length| {
        if result.is_ok() && covered_length < row_length {
            let row_border = &mut target[row_start + covered_length .. row_start + row_length];
            result = read.read_values(row_border);
        }
    });

    result?;
    Ok(read.position() - start)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::HYPERCUBE_NUM_ELEMENTS;

    #[test]
    fn grid_counts_and_origins() {
        let grid = HypercubeGrid::<2>::new(Extent::new([130, 70]));
        assert_eq!(grid.num_hypercubes(), 2);
        assert_eq!(grid.hypercube_origin(0), [0, 0]);
        assert_eq!(grid.hypercube_origin(1), [64, 0]);
        assert_eq!(grid.border_element_count(), 130 * 70 - 2 * 4096);

        let grid = HypercubeGrid::<3>::new(Extent::new([16, 33, 50]));
        assert_eq!(grid.num_hypercubes(), 1 * 2 * 3);
        assert_eq!(grid.hypercube_origin(0), [0, 0, 0]);
        assert_eq!(grid.hypercube_origin(1), [0, 0, 16]);
        assert_eq!(grid.hypercube_origin(3), [0, 16, 0]);
        assert_eq!(grid.hypercube_origin(5), [0, 16, 32]);
    }

    #[test]
    fn small_extents_are_pure_border() {
        let grid = HypercubeGrid::<1>::new(Extent::new([4095]));
        assert_eq!(grid.num_hypercubes(), 0);
        assert_eq!(grid.border_element_count(), 4095);

        let grid = HypercubeGrid::<2>::new(Extent::new([63, 1000]));
        assert_eq!(grid.num_hypercubes(), 0);
        assert_eq!(grid.border_element_count(), 63 * 1000);
    }

    #[test]
    fn load_store_hypercube_roundtrip() {
        let extent = Extent::new([20, 17, 40]);
        let num_elements = extent.validate().unwrap();
        let values: Vec<f32> = (0 .. num_elements).map(|index| index as f32).collect();

        let grid = HypercubeGrid::new(extent);
        let slice = Slice::new(&values, extent).unwrap();

        let mut cube = vec![0_u32; HYPERCUBE_NUM_ELEMENTS];
        let origin = grid.hypercube_origin(grid.num_hypercubes() - 1);
        load_hypercube(&slice, origin, &grid, &mut cube);

        // the first cube row starts at the origin itself
        assert_eq!(cube[0], values[extent.linear_offset(origin)].to_residual_bits());

        let mut restored = vec![0.0_f32; num_elements];
        let mut target = SliceMut::new(&mut restored, extent).unwrap();
        store_hypercube(&mut target, origin, &grid, &cube);

        // exactly the elements of that hypercube were restored
        let side = grid.side_length();
        for z in 0 .. extent.components[0] {
            for y in 0 .. extent.components[1] {
                for x in 0 .. extent.components[2] {
                    let offset = extent.linear_offset([z, y, x]);
                    let inside = (origin[0] .. origin[0] + side).contains(&z)
                        && (origin[1] .. origin[1] + side).contains(&y)
                        && (origin[2] .. origin[2] + side).contains(&x);

                    if inside { assert_eq!(restored[offset], values[offset]); }
                    else { assert_eq!(restored[offset], 0.0); }
                }
            }
        }
    }

    #[test]
    fn border_roundtrip_covers_every_uncovered_element() {
        let extent = Extent::new([70, 65]);
        let num_elements = extent.validate().unwrap();
        let values: Vec<f32> = (0 .. num_elements).map(|index| index as f32 * 0.5).collect();

        let grid = HypercubeGrid::new(extent);
        let slice = Slice::new(&values, extent).unwrap();

        let mut bytes = vec![0_u8; grid.border_element_count() * 4];
        let mut write = WriteCursor::new(&mut bytes);
        pack_border(&slice, &grid, &mut write).unwrap();
        assert_eq!(write.position(), bytes.len());

        let mut restored = vec![0.0_f32; num_elements];
        let mut target = SliceMut::new(&mut restored, extent).unwrap();
        let mut read = ReadCursor::new(&bytes);
        let consumed = unpack_border(&mut target, &grid, &mut read).unwrap();
        assert_eq!(consumed, bytes.len());

        for z in 0 .. 70 {
            for x in 0 .. 65 {
                let offset = extent.linear_offset([z, x]);
                if z < 64 && x < 64 { assert_eq!(restored[offset], 0.0); }
                else { assert_eq!(restored[offset], values[offset]); }
            }
        }
    }
}
