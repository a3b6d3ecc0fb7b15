
//! Grid-launched compression and decompression in the manner of a SIMT
//! accelerator.
//!
//! The codec consumes a minimal launch interface: a grid runs one
//! cooperative work group per superblock with one work item per hypercube,
//! and reports how long the launch took. Compression is two-pass inside a
//! group: items encode into fixed-capacity scratch, a work-group prefix sum
//! over the encoded lengths yields the intra-superblock offset table, then
//! items copy their bodies to the computed offsets. The host performs the
//! remaining serial prefix sum over superblock lengths, compacts the staged
//! bodies into the final stream, and appends the border.
//!
//! The shipped `HostGrid` executes groups on the host, concurrently when
//! the `rayon` feature is enabled. A device runtime would implement `Grid`
//! over real kernel launches instead.

use std::time::{Duration, Instant};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::block;
use crate::error::{self, Result, UnitResult};
use crate::extent::{Slice, SliceMut};
use crate::io::{Data, ReadCursor, WriteCursor};
use crate::meta::{FileLayout, FileOffsetTable, HypercubeOffset, Superblock, SuperblockOffsetTable};
use crate::profile::{Profile, Value, HYPERCUBE_NUM_ELEMENTS, MAX_HYPERCUBES_PER_SUPERBLOCK};
use crate::sequential;
use crate::transform;
use crate::encode;


/// One cooperative work group of a grid launch.
#[derive(Debug, Clone, Copy)]
pub struct WorkGroup {
    index: usize,
    size: usize,
}

impl WorkGroup {

    /// Position of this group in the grid.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of work items in this group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run the closure once for every work item of this group.
    /// Returns only after all items completed, so consecutive
    /// `distribute` calls have group-barrier semantics.
    pub fn distribute(&self, mut per_item: impl FnMut(usize)) {
        for local_index in 0 .. self.size {
            per_item(local_index);
        }
    }

    /// Like `distribute`, stopping at the first item that fails.
    pub fn try_distribute(&self, mut per_item: impl FnMut(usize) -> UnitResult) -> UnitResult {
        for local_index in 0 .. self.size {
            per_item(local_index)?;
        }

        Ok(())
    }
}


/// The launch interface the codec consumes from an accelerator runtime.
pub trait Grid {

    /// Execute the kernel once per group state, possibly concurrently.
    /// Returns after every group completed, reporting the measured
    /// duration of the whole launch.
    fn launch<S: Send>(
        &self,
        group_size: usize,
        groups: &mut [S],
        kernel: impl Fn(&WorkGroup, &mut S) -> UnitResult + Sync,
    ) -> Result<Duration>;
}


/// Executes work groups on the host, concurrently when the `rayon`
/// feature is enabled, sequentially otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostGrid;

impl Grid for HostGrid {
    fn launch<S: Send>(
        &self,
        group_size: usize,
        groups: &mut [S],
        kernel: impl Fn(&WorkGroup, &mut S) -> UnitResult + Sync,
    ) -> Result<Duration> {
        let launched = Instant::now();

        #[cfg(feature = "rayon")]
        groups.par_iter_mut().enumerate().try_for_each(|(index, state)| {
            kernel(&WorkGroup { index, size: group_size }, state)
        })?;

        #[cfg(not(feature = "rayon"))]
        for (index, state) in groups.iter_mut().enumerate() {
            kernel(&WorkGroup { index, size: group_size }, state)?;
        }

        Ok(launched.elapsed())
    }
}


/// Byte count and measured kernel duration of a grid-launched operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelTimed {

    /// Stream bytes written by compression, or consumed by decompression.
    pub byte_count: usize,

    /// Time spent inside grid launches, excluding host assembly.
    pub kernel_time: Duration,
}


/// The grid-launched driver, parameterized over the accelerator runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine<G = HostGrid> {
    grid: G,
}

impl Engine<HostGrid> {

    /// A driver running its work groups on the host.
    pub fn host() -> Self {
        Self::new(HostGrid)
    }
}

impl<G: Grid> Engine<G> {

    /// A driver running its work groups on the provided runtime.
    pub fn new(grid: G) -> Self {
        Self { grid }
    }

    /// Compress the array into the stream buffer with one grid launch.
    /// The stream is byte-identical to the sequential driver's output.
    pub fn compress<T: Value, const D: usize>(
        &self, data: Slice<'_, T, D>, stream: &mut [u8],
    ) -> Result<KernelTimed> {
        let layout = FileLayout::<T, D>::new(data.extent())?;

        let mut groups: Vec<EncodeGroup> = (0 .. layout.num_superblocks())
            .map(|superblock_index| {
                let superblock = layout.superblock(superblock_index);
                EncodeGroup {
                    superblock,
                    staging: vec![0_u8; layout.superblock_size_bound(superblock.num_hypercubes)],
                    body_length: 0,
                }
            })
            .collect();

        let kernel_time = self.grid.launch(
            MAX_HYPERCUBES_PER_SUPERBLOCK,
            &mut groups,
            |group, state| encode_group_kernel(&layout, &data, group, state),
        )?;

        // host: serial prefix sum over superblock lengths, then compaction
        let mut out = WriteCursor::new(stream);
        out.reserve(layout.file_header_length())?;

        for (superblock_index, state) in groups.iter().enumerate() {
            if superblock_index > 0 {
                let entry_position = (superblock_index - 1) * u64::BYTE_SIZE;
                out.write_value_at(entry_position, error::usize_to_u64(out.position()))?;
            }

            out.write_bytes(&state.staging[.. state.body_length])?;
        }

        let border_position = out.position();
        let entry_position = (layout.file_table_entry_count() - 1) * u64::BYTE_SIZE;
        out.write_value_at(entry_position, error::usize_to_u64(border_position))?;

        block::pack_border(&data, layout.grid(), &mut out)?;
        Ok(KernelTimed { byte_count: out.position(), kernel_time })
    }

    /// Decompress the stream into the array with one grid launch.
    pub fn decompress<T: Value, const D: usize>(
        &self, stream: &[u8], mut data: SliceMut<'_, T, D>,
    ) -> Result<KernelTimed> {
        let layout = FileLayout::<T, D>::new(data.extent())?;
        let file_table = FileOffsetTable::parse(stream, &layout)?;

        let mut groups: Vec<DecodeGroup<'_, T>> = (0 .. layout.num_superblocks())
            .map(|superblock_index| {
                let superblock = layout.superblock(superblock_index);
                DecodeGroup {
                    superblock,
                    body: &stream[file_table.superblock_range(superblock_index)],
                    cubes: vec![T::Bits::default(); superblock.num_hypercubes * HYPERCUBE_NUM_ELEMENTS],
                }
            })
            .collect();

        let kernel_time = self.grid.launch(
            MAX_HYPERCUBES_PER_SUPERBLOCK,
            &mut groups,
            |group, state| decode_group_kernel(&layout, group, state),
        )?;

        // host: scatter the reconstructed cubes and unpack the border
        for state in &groups {
            for (block_index, cube) in state.cubes.chunks_exact(HYPERCUBE_NUM_ELEMENTS).enumerate() {
                let origin = layout.grid()
                    .hypercube_origin(state.superblock.first_hypercube + block_index);

                block::store_hypercube(&mut data, origin, layout.grid(), cube);
            }
        }

        let mut read = ReadCursor::new(&stream[file_table.border_start() ..]);
        let border_length = block::unpack_border(&mut data, layout.grid(), &mut read)?;
        Ok(KernelTimed { byte_count: file_table.border_start() + border_length, kernel_time })
    }
}


/// Per-superblock state of a compression launch.
struct EncodeGroup {
    superblock: Superblock,
    staging: Vec<u8>,
    body_length: usize,
}

/// Per-superblock state of a decompression launch.
struct DecodeGroup<'s, T: Value> {
    superblock: Superblock,
    body: &'s [u8],
    cubes: Vec<T::Bits>,
}

/// Encode one superblock cooperatively:
/// items encode hypercubes into fixed-capacity scratch, the group prefix-sums
/// the lengths into an offset table, then items copy to their offsets.
fn encode_group_kernel<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, data: &Slice<'_, T, D>,
    group: &WorkGroup, state: &mut EncodeGroup,
) -> UnitResult {
    let superblock = state.superblock;
    let block_bound = Profile::<T, D>::COMPRESSED_BLOCK_SIZE_BOUND;

    let mut item_streams = vec![vec![0_u8; block_bound]; superblock.num_hypercubes];
    let mut item_lengths = vec![0_usize; superblock.num_hypercubes];

    group.try_distribute(|item| {
        if item >= superblock.num_hypercubes {
            return Ok(());
        }

        let mut cube = vec![T::Bits::default(); HYPERCUBE_NUM_ELEMENTS];
        let origin = layout.grid().hypercube_origin(superblock.first_hypercube + item);
        block::load_hypercube(data, origin, layout.grid(), &mut cube);
        transform::forward::<T, D>(&mut cube);

        let mut out = WriteCursor::new(&mut item_streams[item]);
        item_lengths[item] = encode::encode_block::<T>(&cube, &mut out)?;
        Ok(())
    })?;

    // group-wide prefix sum over the encoded lengths
    let header_length = layout.superblock_header_length(superblock.num_hypercubes);
    let mut item_offsets = vec![0_usize; superblock.num_hypercubes];
    let mut offset = header_length;
    for item in 0 .. superblock.num_hypercubes {
        item_offsets[item] = offset;
        offset += item_lengths[item];
    }
    state.body_length = offset;

    let mut out = WriteCursor::new(&mut state.staging);
    out.reserve(header_length)?;

    group.try_distribute(|item| {
        if item >= superblock.num_hypercubes {
            return Ok(());
        }

        if item > 0 {
            let entry_position = (item - 1) * HypercubeOffset::BYTE_SIZE;
            out.write_value_at(entry_position, error::usize_to_u32(item_offsets[item])?)?;
        }

        // in-order appends land exactly at the prefix-sum offsets
        debug_assert_eq!(out.position(), item_offsets[item]);
        out.write_bytes(&item_streams[item][.. item_lengths[item]])
    })
}

/// Decode one superblock cooperatively: the group parses its offset table,
/// then every item reconstructs the residuals of its hypercube.
fn decode_group_kernel<T: Value, const D: usize>(
    layout: &FileLayout<T, D>, group: &WorkGroup, state: &mut DecodeGroup<'_, T>,
) -> UnitResult {
    let superblock = state.superblock;
    let body = state.body;
    let block_table = SuperblockOffsetTable::parse(body, superblock, layout)?;

    let mut cube_chunks = state.cubes.chunks_exact_mut(HYPERCUBE_NUM_ELEMENTS);

    group.try_distribute(|item| {
        let cube = match cube_chunks.next() {
            Some(cube) => cube,
            None => return Ok(()), // fewer hypercubes than work items
        };

        debug_assert!(item < superblock.num_hypercubes);
        let mut read = ReadCursor::new(&body[block_table.block_range(item)]);
        sequential::decode_block_residuals::<T, D>(&mut read, cube)
    })
}
