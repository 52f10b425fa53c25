//! Element-typed, access-mode-typed views over a [`RawMmap`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::errors::{MmapError, Result};
use crate::handle::{FileHandle, MapLength, MapSource};
use crate::raw::{AccessMode, RawMmap};

mod sealed {
    pub trait Sealed {}
}

/// Compile-time access mode of a [`Mmap`].
pub trait Access: sealed::Sealed {
    /// Mode handed to the OS when mapping.
    const MODE: AccessMode;
}

/// Read-only access marker.
#[derive(Debug)]
pub enum ReadOnly {}

/// Read-write access marker. Enables mutable access and [`Mmap::sync`].
#[derive(Debug)]
pub enum ReadWrite {}

impl sealed::Sealed for ReadOnly {}
impl sealed::Sealed for ReadWrite {}

impl Access for ReadOnly {
    const MODE: AccessMode = AccessMode::Read;
}

impl Access for ReadWrite {
    const MODE: AccessMode = AccessMode::Write;
}

/// Plain element types a mapping can be viewed as.
///
/// Every bit pattern of these types is a valid value, so any file content
/// can be read through them.
pub trait Element: sealed::Sealed + Copy + Send + Sync + 'static {}

macro_rules! impl_element {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {}
        )*
    };
}

impl_element!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Memory-mapped view of a file region as a slice of `T`.
///
/// Offsets and lengths passed to [`Mmap::map`] and [`Mmap::open`] are in
/// bytes; every query and window adjustment afterwards is in elements. The
/// view dereferences to `[T]`, so slice methods, indexing and iteration work
/// directly. An unmapped view is an empty slice.
///
/// # Examples
///
/// ```no_run
/// use mmap_region::{MapLength, MmapSink, MmapSource};
///
/// let mut sink = MmapSink::open("data.bin", 0, MapLength::EntireFile)?;
/// sink[0] = b'M';
/// sink.sync()?;
///
/// let source = MmapSource::open("data.bin", 0, 1)?;
/// assert_eq!(source[0], b'M');
/// # Ok::<(), mmap_region::MmapError>(())
/// ```
pub struct Mmap<A: Access = ReadOnly, T: Element = u8> {
    raw: RawMmap,
    _marker: PhantomData<(A, T)>,
}

/// Read-only byte mapping.
pub type MmapSource = Mmap<ReadOnly, u8>;
/// Read-write byte mapping.
pub type MmapSink = Mmap<ReadWrite, u8>;
/// Read-only mapping of `T` elements.
pub type MmapSourceOf<T> = Mmap<ReadOnly, T>;
/// Read-write mapping of `T` elements.
pub type MmapSinkOf<T> = Mmap<ReadWrite, T>;

impl<A: Access, T: Element> Mmap<A, T> {
    /// Create an unmapped view.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawMmap::new(),
            _marker: PhantomData,
        }
    }

    /// Create a view mapping `length` bytes of `source` from byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Mmap::map`].
    pub fn open<'a>(
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
    ) -> Result<Self> {
        let mut map = Self::new();
        map.map(source, offset, length)?;
        Ok(map)
    }

    /// Map `length` bytes of `source` from byte `offset`, replacing any
    /// current mapping on success. On error the view is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`RawMmap::map`], and `MmapError::InvalidArgument`
    /// if byte `offset` is not suitably aligned for `T`.
    pub fn map<'a>(
        &mut self,
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
    ) -> Result<()> {
        let mut raw = RawMmap::new();
        raw.map(source, offset, length, A::MODE)?;
        if raw.as_ptr().align_offset(mem::align_of::<T>()) != 0 {
            return Err(MmapError::InvalidArgument(format!(
                "offset {offset} is not aligned for {}-byte elements",
                mem::align_of::<T>()
            )));
        }
        self.raw = raw;
        Ok(())
    }

    /// Release the mapping; see [`RawMmap::unmap`].
    pub fn unmap(&mut self) {
        self.raw.unmap();
    }

    /// Whether a mapping is established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    /// Number of elements in the conceptual window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len() / mem::size_of::<T>()
    }

    /// Whether the conceptual window holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapped region size in elements.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.raw.mapped_len() / mem::size_of::<T>()
    }

    /// File offset of the first element, in elements.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.raw.offset() / mem::size_of::<T>() as u64
    }

    /// Set the conceptual length, in elements, without remapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` if the window would exceed the mapping.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.raw.set_length(byte_size::<T>(length)?)
    }

    /// Move the conceptual start, in elements past the requested offset,
    /// without remapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` if the window would exceed the mapping.
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        self.raw.set_offset(byte_size::<T>(offset)?)
    }

    /// Native handle of the mapped file.
    #[must_use]
    pub fn file_handle(&self) -> FileHandle {
        self.raw.file_handle()
    }

    /// Native handle of the mapping object.
    #[must_use]
    pub fn mapping_handle(&self) -> FileHandle {
        self.raw.mapping_handle()
    }

    /// Whether the file handle was opened (and will be closed) by this view.
    #[must_use]
    pub fn is_handle_internal(&self) -> bool {
        self.raw.is_handle_internal()
    }

    /// Pointer to the first element, or null when unmapped.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.raw.as_ptr().cast::<T>()
    }

    /// The conceptual window as elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        let ptr = self.as_ptr();
        if ptr.is_null() {
            return &[];
        }
        // SAFETY: `map` checked the alignment, window moves are whole elements,
        // and the window lies inside the live mapping.
        unsafe { std::slice::from_raw_parts(ptr, self.len()) }
    }

    /// Exchange the mappings held by `self` and `other`.
    pub fn swap(&mut self, other: &mut Self) {
        self.raw.swap(&mut other.raw);
    }

    /// The untyped mapping underneath.
    #[must_use]
    pub fn raw(&self) -> &RawMmap {
        &self.raw
    }

    /// Unwrap into the untyped mapping.
    #[must_use]
    pub fn into_raw(self) -> RawMmap {
        self.raw
    }
}

impl<T: Element> Mmap<ReadWrite, T> {
    /// Mutable pointer to the first element, or null when unmapped.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.raw.as_mut_ptr().cast::<T>()
    }

    /// The conceptual window as mutable elements.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        let ptr = self.as_mut_ptr();
        if ptr.is_null() {
            return &mut [];
        }
        // SAFETY: ReadWrite views are always mapped with AccessMode::Write;
        // alignment and bounds hold as in `as_slice`.
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Flush the pages covering the conceptual window to the file.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::FlushFailed` if the OS flush call fails.
    pub fn sync(&self) -> Result<()> {
        self.raw.sync()
    }
}

fn byte_size<T>(elements: usize) -> Result<usize> {
    elements
        .checked_mul(mem::size_of::<T>())
        .ok_or_else(|| MmapError::InvalidArgument(format!("{elements} elements overflow usize")))
}

impl<A: Access, T: Element> Default for Mmap<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Access, T: Element> Deref for Mmap<A, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> DerefMut for Mmap<ReadWrite, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<A: Access, T: Element> AsRef<[T]> for Mmap<A, T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> AsMut<[T]> for Mmap<ReadWrite, T> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, A: Access, T: Element> IntoIterator for &'a Mmap<A, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T: Element> IntoIterator for &'a mut Mmap<ReadWrite, T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<A: Access, T: Element> fmt::Debug for Mmap<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mmap")
            .field("mode", &A::MODE)
            .field("element_size", &mem::size_of::<T>())
            .field("raw", &self.raw)
            .finish()
    }
}

impl<A: Access, T: Element> PartialEq for Mmap<A, T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<A: Access, T: Element> Eq for Mmap<A, T> {}

impl<A: Access, T: Element> PartialOrd for Mmap<A, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<A: Access, T: Element> Ord for Mmap<A, T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<A: Access, T: Element> Hash for Mmap<A, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(bytes).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn wide_elements_scale_lengths() {
        let bytes: Vec<u8> = (0u16..2048).flat_map(u16::to_ne_bytes).collect();
        let file = file_with(&bytes);

        let mut map = MmapSourceOf::<u16>::open(file.path(), 0, MapLength::EntireFile)
            .expect("map u16");
        assert_eq!(map.len(), 2048);
        assert_eq!(map[7], 7);

        assert!(map.set_offset(10).is_err());
        map.set_length(2038).expect("shrink");
        map.set_offset(10).expect("shift");
        assert_eq!(map.offset(), 10);
        assert_eq!(map[0], 10);
        assert_eq!(map.iter().count(), 2038);
        assert!(map.set_length(2039).is_err());
    }

    #[test]
    fn misaligned_typed_offset_is_rejected() {
        let file = file_with(&[0u8; 64]);
        let err = MmapSourceOf::<u32>::open(file.path(), 2, 8).expect_err("misaligned");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn misaligned_remap_keeps_current_window() {
        let bytes: Vec<u8> = (0u32..16).flat_map(u32::to_ne_bytes).collect();
        let file = file_with(&bytes);
        let mut map = MmapSourceOf::<u32>::open(file.path(), 8, 16).expect("map");
        let before = (map.as_ptr(), map.len(), map.offset(), map.file_handle());

        let err = map.map(file.path(), 6, 8).expect_err("misaligned");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert!(map.is_open());
        assert_eq!((map.as_ptr(), map.len(), map.offset(), map.file_handle()), before);
        assert_eq!(&map[..], &[2, 3, 4, 5]);
    }

    #[test]
    fn sink_writes_through() {
        let file = file_with(b"hello world");
        let mut sink = MmapSink::open(file.path(), 6, 5).expect("map sink");
        sink.copy_from_slice(b"WORLD");
        for b in &mut sink {
            *b = b.to_ascii_lowercase();
        }
        sink[0] = b'W';
        sink.sync().expect("sync");
        drop(sink);

        let contents = std::fs::read(file.path()).expect("read back");
        assert_eq!(&contents, b"hello World");
    }

    #[test]
    fn unmapped_view_is_empty_slice() {
        let map = MmapSource::new();
        assert!(!map.is_open());
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
        assert_eq!(map, MmapSource::default());
    }
}
