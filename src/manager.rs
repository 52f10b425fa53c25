//! Factory functions that build a view and map it in one call.

use crate::errors::Result;
use crate::handle::{MapLength, MapSource};
use crate::mmap::{Access, Element, Mmap, MmapSink, MmapSource};

/// Build any [`Mmap`] type and map `length` bytes of `source` from byte `offset`.
///
/// # Errors
///
/// Returns errors from [`Mmap::map`].
pub fn make_mmap<'a, A: Access, T: Element>(
    source: impl Into<MapSource<'a>>,
    offset: u64,
    length: impl Into<MapLength>,
) -> Result<Mmap<A, T>> {
    Mmap::open(source, offset, length)
}

/// Build a read-only byte mapping.
///
/// # Errors
///
/// Returns errors from [`Mmap::map`].
pub fn make_mmap_source<'a>(
    source: impl Into<MapSource<'a>>,
    offset: u64,
    length: impl Into<MapLength>,
) -> Result<MmapSource> {
    make_mmap(source, offset, length)
}

/// Build a read-write byte mapping.
///
/// # Errors
///
/// Returns errors from [`Mmap::map`].
pub fn make_mmap_sink<'a>(
    source: impl Into<MapSource<'a>>,
    offset: u64,
    length: impl Into<MapLength>,
) -> Result<MmapSink> {
    make_mmap(source, offset, length)
}
