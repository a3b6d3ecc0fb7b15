
//! Multi-threaded compression and decompression on a rayon thread pool.
//!
//! Work is partitioned at superblock granularity: a superblock body is
//! self-contained (its offset table holds only body-relative offsets), so
//! every worker can encode or decode superblocks without coordination.
//! Assembling the stream and scattering decoded elements into the output
//! array remain sequential passes, which keeps the produced bytes identical
//! to the sequential driver's.

use rayon::prelude::*;

use crate::block;
use crate::error::{self, Error, Result};
use crate::extent::{Slice, SliceMut};
use crate::io::{Data, ReadCursor, WriteCursor};
use crate::meta::{FileLayout, FileOffsetTable, SuperblockOffsetTable};
use crate::profile::{Value, HYPERCUBE_NUM_ELEMENTS};
use crate::sequential;


/// A fixed pool of worker threads shared by any number of
/// compression and decompression calls.
#[derive(Debug)]
pub struct ThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool {

    /// Create a pool of the specified number of worker threads.
    /// Zero selects one thread per available core.
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|error| Error::accelerator(error.to_string()))?;

        Ok(Self { pool })
    }

    /// Compress the array into the stream buffer using all workers.
    /// Returns the number of stream bytes written,
    /// identical to the sequential driver's output.
    pub fn compress<T: Value, const D: usize>(
        &self, data: Slice<'_, T, D>, stream: &mut [u8],
    ) -> Result<usize> {
        let layout = FileLayout::<T, D>::new(data.extent())?;

        // every worker encodes complete superblock bodies into private scratch
        let bodies: Result<Vec<Vec<u8>>> = self.pool.install(|| {
            (0 .. layout.num_superblocks())
                .into_par_iter()
                .map(|superblock_index| encode_superblock_body(&layout, superblock_index, &data))
                .collect()
        });

        // a single sequential pass concatenates them and fills the file table
        let mut out = WriteCursor::new(stream);
        out.reserve(layout.file_header_length())?;

        for (superblock_index, body) in bodies?.iter().enumerate() {
            if superblock_index > 0 {
                let entry_position = (superblock_index - 1) * u64::BYTE_SIZE;
                out.write_value_at(entry_position, error::usize_to_u64(out.position()))?;
            }

            out.write_bytes(body)?;
        }

        let border_position = out.position();
        let entry_position = (layout.file_table_entry_count() - 1) * u64::BYTE_SIZE;
        out.write_value_at(entry_position, error::usize_to_u64(border_position))?;

        block::pack_border(&data, layout.grid(), &mut out)?;
        Ok(out.position())
    }

    /// Decompress the stream into the array using all workers.
    /// Returns the number of stream bytes consumed.
    pub fn decompress<T: Value, const D: usize>(
        &self, stream: &[u8], mut data: SliceMut<'_, T, D>,
    ) -> Result<usize> {
        let layout = FileLayout::<T, D>::new(data.extent())?;
        let file_table = FileOffsetTable::parse(stream, &layout)?;

        // workers reconstruct residual cubes; hypercubes of one superblock
        // interleave in the output array, so scattering stays sequential
        let cubes: Result<Vec<Vec<T::Bits>>> = self.pool.install(|| {
            (0 .. layout.num_superblocks())
                .into_par_iter()
                .map(|superblock_index| {
                    let body = &stream[file_table.superblock_range(superblock_index)];
                    decode_superblock_body(&layout, superblock_index, body)
                })
                .collect()
        });

        for (superblock_index, superblock_cubes) in cubes?.iter().enumerate() {
            let superblock = layout.superblock(superblock_index);

            for (block_index, cube) in superblock_cubes.chunks_exact(HYPERCUBE_NUM_ELEMENTS).enumerate() {
                let origin = layout.grid().hypercube_origin(superblock.first_hypercube + block_index);
                block::store_hypercube(&mut data, origin, layout.grid(), cube);
            }
        }

        let mut read = ReadCursor::new(&stream[file_table.border_start() ..]);
        let border_length = block::unpack_border(&mut data, layout.grid(), &mut read)?;
        Ok(file_table.border_start() + border_length)
    }
}

/// Encode one complete superblock body, offset table included,
/// into a freshly allocated buffer of its worst-case size.
fn encode_superblock_body<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, superblock_index: usize, data: &Slice<'_, T, D>,
) -> Result<Vec<u8>> {
    let superblock = layout.superblock(superblock_index);

    let mut body = vec![0_u8; layout.superblock_size_bound(superblock.num_hypercubes)];
    let mut out = WriteCursor::new(&mut body);
    let mut cube = vec![T::Bits::default(); HYPERCUBE_NUM_ELEMENTS];

    sequential::compress_superblock(layout, superblock, data, &mut cube, &mut out)?;

    let length = out.position();
    body.truncate(length);
    Ok(body)
}

/// Decode every hypercube of one superblock body into residual cubes,
/// stored back to back in hypercube order.
fn decode_superblock_body<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, superblock_index: usize, body: &[u8],
) -> Result<Vec<T::Bits>> {
    let superblock = layout.superblock(superblock_index);
    let block_table = SuperblockOffsetTable::parse(body, superblock, layout)?;

    let mut cubes = vec![T::Bits::default(); superblock.num_hypercubes * HYPERCUBE_NUM_ELEMENTS];

    for (block_index, cube) in cubes.chunks_exact_mut(HYPERCUBE_NUM_ELEMENTS).enumerate() {
        let mut read = ReadCursor::new(&body[block_table.block_range(block_index)]);
        sequential::decode_block_residuals::<T, D>(&mut read, cube)?;
    }

    Ok(cubes)
}
