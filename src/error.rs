
//! Error type definitions and checked integer conversions.

use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;

/// A result that may contain a codec error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains a codec error.
pub type UnitResult = Result<()>;


/// An error that may happen while compressing or decompressing an array.
/// Distinguishes invalid inputs, undersized buffers,
/// malformed streams, and runtime failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {

    /// The extent has a zero component, its element count overflows
    /// the address space, or it does not describe the borrowed data.
    InvalidExtent(Cow<'static, str>),

    /// The caller-provided destination buffer cannot hold the output.
    /// Size compression buffers with `compressed_size_bound`.
    InsufficientBuffer,

    /// The compressed stream contradicts the format:
    /// an offset table is not strictly increasing or points outside its region,
    /// a chunk announces more bitplanes than the remaining bytes can hold,
    /// or the stream ends before the border is complete.
    Format(Cow<'static, str>),

    /// The runtime carrying the parallel work, a thread pool or an
    /// accelerator grid, failed to start or complete.
    Accelerator(Cow<'static, str>),
}

impl Error {

    /// Create an error of the variant `InvalidExtent`.
    pub(crate) fn invalid_extent(message: impl Into<Cow<'static, str>>) -> Self {
        Error::InvalidExtent(message.into())
    }

    /// Create an error of the variant `Format`.
    pub(crate) fn format(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Format(message.into())
    }

    /// Create an error of the variant `Accelerator`.
    #[allow(unused)] // only constructed when a runtime is compiled in
    pub(crate) fn accelerator(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Accelerator(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidExtent(message) => write!(formatter, "invalid extent: {}", message),
            Error::InsufficientBuffer => write!(formatter, "output buffer too small"),
            Error::Format(message) => write!(formatter, "malformed stream: {}", message),
            Error::Accelerator(message) => write!(formatter, "accelerator runtime failure: {}", message),
        }
    }
}

impl std::error::Error for Error {}


/// Convert a stream-declared `u64` to `usize`,
/// failing with a format error on 32-bit hosts where it cannot fit.
pub(crate) fn u64_to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::format("offset larger than address space"))
}

/// Convert an in-memory offset to the stream-level `u32` offset representation.
/// Offsets inside a superblock are bounded by the profile, so this never fails
/// for offsets the compressor produces itself.
pub(crate) fn usize_to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::format("offset larger than 32 bits"))
}

/// Convert an in-memory position to the stream-level `u64` offset representation.
pub(crate) fn usize_to_u64(value: usize) -> u64 {
    value as u64 // usize is at most 64 bits on all supported targets
}
