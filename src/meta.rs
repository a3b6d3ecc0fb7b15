
//! The stream layout.
//!
//! A compressed stream is a file offset table, then one body per superblock,
//! then the packed border. Each superblock body is an offset table of its own
//! followed by the encoded hypercubes. Both table levels make every block
//! independently addressable, which is what licenses parallel processing.

use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::block::HypercubeGrid;
use crate::error::{self, Error, Result};
use crate::extent::Extent;
use crate::io::{Data, ReadCursor};
use crate::profile::{Profile, Value, MAX_HYPERCUBES_PER_SUPERBLOCK};


/// The integer type of intra-superblock hypercube offsets. Wide enough for
/// `MAX_HYPERCUBES_PER_SUPERBLOCK` hypercubes at the compressed block size
/// bound of the largest profile.
pub(crate) type HypercubeOffset = u32;

/// One contiguous run of hypercubes, encoded and decoded as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Superblock {

    /// Grid index of the first hypercube of this superblock.
    pub first_hypercube: usize,

    /// Number of hypercubes in this superblock.
    /// Only the last superblock of a stream may have fewer
    /// than `MAX_HYPERCUBES_PER_SUPERBLOCK`.
    pub num_hypercubes: usize,
}

/// Where everything lives in a stream for a given extent.
/// Computed solely from the extent, identically
/// by the compressor and the decompressor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileLayout<T, const D: usize> {
    grid: HypercubeGrid<D>,
    num_superblocks: usize,
    value_type: PhantomData<T>,
}

impl<T: Value, const D: usize> FileLayout<T, D> {

    /// Compute the layout, validating the extent first.
    pub fn new(extent: Extent<D>) -> Result<Self> {
        extent.validate()?;

        let grid = HypercubeGrid::new(extent);
        let num_superblocks =
            (grid.num_hypercubes() + MAX_HYPERCUBES_PER_SUPERBLOCK - 1) / MAX_HYPERCUBES_PER_SUPERBLOCK;

        Ok(Self { grid, num_superblocks, value_type: PhantomData })
    }

    pub fn grid(&self) -> &HypercubeGrid<D> {
        &self.grid
    }

    pub fn num_superblocks(&self) -> usize {
        self.num_superblocks
    }

    /// The hypercube run of the indexed superblock.
    pub fn superblock(&self, superblock_index: usize) -> Superblock {
        debug_assert!(superblock_index < self.num_superblocks);

        let first_hypercube = superblock_index * MAX_HYPERCUBES_PER_SUPERBLOCK;
        let num_hypercubes = MAX_HYPERCUBES_PER_SUPERBLOCK
            .min(self.grid.num_hypercubes() - first_hypercube);

        Superblock { first_hypercube, num_hypercubes }
    }

    /// Number of entries in the file offset table. Even a stream without any
    /// hypercubes records where its border starts.
    pub fn file_table_entry_count(&self) -> usize {
        self.num_superblocks.max(1)
    }

    /// Byte length of the file offset table at the start of the stream.
    pub fn file_header_length(&self) -> usize {
        self.file_table_entry_count() * u64::BYTE_SIZE
    }

    /// Byte length of the offset table at the start of a superblock body.
    pub fn superblock_header_length(&self, num_hypercubes: usize) -> usize {
        (num_hypercubes - 1) * HypercubeOffset::BYTE_SIZE
    }

    /// Worst-case byte length of one whole superblock body.
    pub fn superblock_size_bound(&self, num_hypercubes: usize) -> usize {
        self.superblock_header_length(num_hypercubes)
            + num_hypercubes * Profile::<T, D>::COMPRESSED_BLOCK_SIZE_BOUND
    }

    /// Upper bound on the length of any stream of this layout.
    pub fn compressed_size_bound(&self) -> Result<usize> {
        let num_hypercubes = self.grid.num_hypercubes();

        // the superblock tables hold one entry per hypercube except each superblock's first
        let table_bytes = (num_hypercubes - self.num_superblocks) * HypercubeOffset::BYTE_SIZE;

        let block_bytes = num_hypercubes.checked_mul(Profile::<T, D>::COMPRESSED_BLOCK_SIZE_BOUND);
        let border_bytes = self.grid.border_element_count().checked_mul(T::BYTE_SIZE);

        block_bytes.zip(border_bytes)
            .and_then(|(blocks, border)| {
                self.file_header_length()
                    .checked_add(table_bytes)?
                    .checked_add(blocks)?
                    .checked_add(border)
            })
            .ok_or_else(|| Error::invalid_extent("compressed size bound overflows the address space"))
    }
}


/// The parsed and validated file offset table of a stream.
#[derive(Debug)]
pub(crate) struct FileOffsetTable {
    region_boundaries: Vec<usize>,
    file_header_length: usize,
}

impl FileOffsetTable {

    /// Read the file offset table and reject it unless all entries are
    /// monotonic and within the stream.
    pub fn parse<T: Value, const D: usize>(stream: &[u8], layout: &FileLayout<T, D>) -> Result<Self> {
        let file_header_length = layout.file_header_length();
        let header = stream.get(.. file_header_length)
            .ok_or_else(|| Error::format("stream shorter than its offset table"))?;

        let mut read = ReadCursor::new(header);
        let mut region_boundaries = Vec::with_capacity(layout.file_table_entry_count());

        let mut previous = file_header_length;
        for _ in 0 .. layout.file_table_entry_count() {
            let offset = error::u64_to_usize(read.read_value::<u64>()?)?;

            if offset < previous || offset > stream.len() {
                return Err(Error::format("file offset table not monotonic or out of range"));
            }

            region_boundaries.push(offset);
            previous = offset;
        }

        Ok(Self { region_boundaries, file_header_length })
    }

    /// Byte range of the indexed superblock body within the stream.
    pub fn superblock_range(&self, superblock_index: usize) -> std::ops::Range<usize> {
        let start = if superblock_index == 0 { self.file_header_length }
            else { self.region_boundaries[superblock_index - 1] };

        start .. self.region_boundaries[superblock_index]
    }

    /// Position of the first border byte within the stream.
    pub fn border_start(&self) -> usize {
        *self.region_boundaries.last().expect("file table always has an entry")
    }
}


/// The parsed and validated offset table of one superblock body.
/// Hypercube 0 implicitly starts where the table ends.
#[derive(Debug)]
pub(crate) struct SuperblockOffsetTable {
    block_boundaries: SmallVec<[usize; MAX_HYPERCUBES_PER_SUPERBLOCK]>,
    header_length: usize,
    body_length: usize,
}

impl SuperblockOffsetTable {

    /// Read the offset table at the start of the superblock body and reject
    /// it unless it is strictly increasing and contained in the body.
    pub fn parse<T: Value, const D: usize>(
        body: &[u8], superblock: Superblock, layout: &FileLayout<T, D>,
    ) -> Result<Self> {
        let header_length = layout.superblock_header_length(superblock.num_hypercubes);
        let header = body.get(.. header_length)
            .ok_or_else(|| Error::format("superblock shorter than its offset table"))?;

        let mut read = ReadCursor::new(header);
        let mut block_boundaries = SmallVec::new();

        let mut previous = header_length;
        for _ in 1 .. superblock.num_hypercubes {
            let offset = read.read_value::<HypercubeOffset>()? as usize;

            if offset <= previous || offset > body.len() {
                return Err(Error::format("hypercube offset table not strictly increasing"));
            }

            block_boundaries.push(offset);
            previous = offset;
        }

        Ok(Self { block_boundaries, header_length, body_length: body.len() })
    }

    /// Byte range of the indexed hypercube within the superblock body.
    pub fn block_range(&self, block_index: usize) -> std::ops::Range<usize> {
        let start = if block_index == 0 { self.header_length }
            else { self.block_boundaries[block_index - 1] };

        let end = self.block_boundaries.get(block_index)
            .copied().unwrap_or(self.body_length);

        start .. end
    }
}
