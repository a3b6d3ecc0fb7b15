
//! Single-threaded compression and decompression.
//!
//! This driver is the reference composition of the codec stages: every other
//! driver produces byte-identical streams. Hypercubes are processed in
//! canonical scan order, offset tables are back-filled as block lengths
//! become known, and the border is appended last.

use crate::block;
use crate::encode;
use crate::error::{self, Result, UnitResult};
use crate::extent::{Slice, SliceMut};
use crate::io::{Data, ReadCursor, WriteCursor};
use crate::meta::{FileLayout, FileOffsetTable, HypercubeOffset, Superblock, SuperblockOffsetTable};
use crate::profile::{Value, HYPERCUBE_NUM_ELEMENTS};
use crate::transform;


/// Compress the array into the stream buffer.
/// Returns the number of stream bytes written.
/// The buffer should be sized with `compressed_size_bound`.
pub fn compress<T: Value, const D: usize>(
    data: Slice<'_, T, D>, stream: &mut [u8],
) -> Result<usize> {
    let layout = FileLayout::<T, D>::new(data.extent())?;
    let mut out = WriteCursor::new(stream);
    out.reserve(layout.file_header_length())?;

    let mut cube = vec![T::Bits::default(); HYPERCUBE_NUM_ELEMENTS];

    for superblock_index in 0 .. layout.num_superblocks() {
        let superblock = layout.superblock(superblock_index);

        // record where this superblock body starts; superblock zero
        // implicitly follows the file offset table
        if superblock_index > 0 {
            let entry_position = (superblock_index - 1) * u64::BYTE_SIZE;
            out.write_value_at(entry_position, error::usize_to_u64(out.position()))?;
        }

        compress_superblock(&layout, superblock, &data, &mut cube, &mut out)?;
    }

    // the final file table entry is the border position
    let border_position = out.position();
    let entry_position = (layout.file_table_entry_count() - 1) * u64::BYTE_SIZE;
    out.write_value_at(entry_position, error::usize_to_u64(border_position))?;

    block::pack_border(&data, layout.grid(), &mut out)?;
    Ok(out.position())
}

/// Encode one superblock body at the current cursor position:
/// reserve its offset table, encode each hypercube, back-fill the table.
/// Shared by the sequential and the multi-threaded driver.
pub(crate) fn compress_superblock<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, superblock: Superblock,
    data: &Slice<'_, T, D>, cube: &mut [T::Bits], out: &mut WriteCursor<'_>,
) -> UnitResult {
    let body_start = out.position();
    out.reserve(layout.superblock_header_length(superblock.num_hypercubes))?;

    for block_index in 0 .. superblock.num_hypercubes {
        if block_index > 0 {
            let offset = error::usize_to_u32(out.position() - body_start)?;
            let entry_position = body_start + (block_index - 1) * HypercubeOffset::BYTE_SIZE;
            out.write_value_at(entry_position, offset)?;
        }

        let origin = layout.grid().hypercube_origin(superblock.first_hypercube + block_index);
        block::load_hypercube(data, origin, layout.grid(), cube);
        transform::forward::<T, D>(cube);
        encode::encode_block::<T>(cube, out)?;
    }

    Ok(())
}

/// Decompress the stream into the array.
/// Returns the number of stream bytes consumed,
/// which equals the stream length for a well-formed stream.
pub fn decompress<T: Value, const D: usize>(
    stream: &[u8], mut data: SliceMut<'_, T, D>,
) -> Result<usize> {
    let layout = FileLayout::<T, D>::new(data.extent())?;
    let file_table = FileOffsetTable::parse(stream, &layout)?;

    let mut cube = vec![T::Bits::default(); HYPERCUBE_NUM_ELEMENTS];

    for superblock_index in 0 .. layout.num_superblocks() {
        let superblock = layout.superblock(superblock_index);
        let body = &stream[file_table.superblock_range(superblock_index)];
        let block_table = SuperblockOffsetTable::parse(body, superblock, &layout)?;

        for block_index in 0 .. superblock.num_hypercubes {
            let mut read = ReadCursor::new(&body[block_table.block_range(block_index)]);
            decompress_block(&layout, superblock.first_hypercube + block_index, &mut read, &mut cube, &mut data)?;
        }
    }

    let mut read = ReadCursor::new(&stream[file_table.border_start() ..]);
    let border_length = block::unpack_border(&mut data, layout.grid(), &mut read)?;
    Ok(file_table.border_start() + border_length)
}

/// Decode, inverse-transform and store a single hypercube.
pub(crate) fn decompress_block<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, hypercube_index: usize,
    read: &mut ReadCursor<'_>, cube: &mut [T::Bits], data: &mut SliceMut<'_, T, D>,
) -> UnitResult {
    decode_block_residuals::<T, D>(read, cube)?;
    let origin = layout.grid().hypercube_origin(hypercube_index);
    block::store_hypercube(data, origin, layout.grid(), cube);
    Ok(())
}

/// Decode one block into reconstructed residual bits, without storing them.
pub(crate) fn decode_block_residuals<T: Value, const D: usize>(
    read: &mut ReadCursor<'_>, cube: &mut [T::Bits],
) -> UnitResult {
    encode::decode_block::<T>(read, cube)?;
    transform::inverse::<T, D>(cube);
    Ok(())
}
