//! Reference-counted mappings shared between owners.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::Result;
use crate::handle::{FileHandle, MapLength, MapSource};
use crate::mmap::{Access, Element, Mmap, ReadOnly, ReadWrite};

/// A [`Mmap`] with shared ownership.
///
/// Cloning is cheap and yields another owner of the same mapping; the
/// mapping is released when the last owner drops (or when any owner calls
/// [`SharedMmap::unmap`]). Access to the view goes through a
/// `parking_lot::RwLock` guard.
///
/// # Examples
///
/// ```no_run
/// use mmap_region::{MapLength, MmapSource, SharedMmapSource};
///
/// let unique = MmapSource::open("data.bin", 0, MapLength::EntireFile)?;
/// let shared = SharedMmapSource::from(unique);
/// let other = shared.clone();
/// assert_eq!(other.read()[..], shared.read()[..]);
/// # Ok::<(), mmap_region::MmapError>(())
/// ```
pub struct SharedMmap<A: Access = ReadOnly, T: Element = u8> {
    inner: Arc<RwLock<Mmap<A, T>>>,
}

/// Shared read-only byte mapping.
pub type SharedMmapSource = SharedMmap<ReadOnly, u8>;
/// Shared read-write byte mapping.
pub type SharedMmapSink = SharedMmap<ReadWrite, u8>;

impl<A: Access, T: Element> SharedMmap<A, T> {
    /// Create an unmapped shared view.
    #[must_use]
    pub fn new() -> Self {
        Self::from(Mmap::new())
    }

    /// Create a shared view mapping `length` bytes of `source` from byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Mmap::map`].
    pub fn open<'a>(
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
    ) -> Result<Self> {
        Mmap::open(source, offset, length).map(Self::from)
    }

    /// Remap for every owner. On error the current mapping stays in place.
    ///
    /// # Errors
    ///
    /// Returns the error from [`Mmap::map`].
    pub fn map<'a>(
        &self,
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
    ) -> Result<()> {
        self.inner.write().map(source, offset, length)
    }

    /// Release the mapping for every owner.
    pub fn unmap(&self) {
        self.inner.write().unmap();
    }

    /// Whether a mapping is established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.read().is_open()
    }

    /// Number of elements in the conceptual window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the conceptual window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Mapped region size in elements.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.inner.read().mapped_len()
    }

    /// File offset of the first element, in elements.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.inner.read().offset()
    }

    /// Native handle of the mapped file.
    #[must_use]
    pub fn file_handle(&self) -> FileHandle {
        self.inner.read().file_handle()
    }

    /// Native handle of the mapping object.
    #[must_use]
    pub fn mapping_handle(&self) -> FileHandle {
        self.inner.read().mapping_handle()
    }

    /// Number of owners of this mapping.
    #[must_use]
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Shared access to the view.
    pub fn read(&self) -> RwLockReadGuard<'_, Mmap<A, T>> {
        self.inner.read()
    }
}

impl<T: Element> SharedMmap<ReadWrite, T> {
    /// Exclusive access to the view, for writing or window changes.
    pub fn write(&self) -> RwLockWriteGuard<'_, Mmap<ReadWrite, T>> {
        self.inner.write()
    }

    /// Flush the pages covering the conceptual window to the file.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::FlushFailed` if the OS flush call fails.
    pub fn sync(&self) -> Result<()> {
        self.inner.read().sync()
    }
}

impl<A: Access, T: Element> From<Mmap<A, T>> for SharedMmap<A, T> {
    fn from(map: Mmap<A, T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}

impl<A: Access, T: Element> Clone for SharedMmap<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Access, T: Element> Default for SharedMmap<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Access, T: Element> PartialEq for SharedMmap<A, T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || *self.inner.read() == *other.inner.read()
    }
}

impl<A: Access, T: Element> Eq for SharedMmap<A, T> {}

impl<A: Access, T: Element> fmt::Debug for SharedMmap<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMmap")
            .field("use_count", &self.use_count())
            .field("map", &*self.inner.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap::MmapSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(bytes).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn moved_into_shared_keeps_view() {
        let file = file_with(&[b'M'; 3000]);
        let unique = MmapSource::open(file.path(), 0, MapLength::EntireFile).expect("map");
        let shared = SharedMmapSource::from(unique);
        assert!(shared.is_open());
        assert_eq!(shared.len(), 3000);
        assert!(shared.read().iter().all(|&b| b == b'M'));
    }

    #[test]
    fn clones_share_one_mapping() {
        let file = file_with(b"abcdef");
        let a = SharedMmapSource::open(file.path(), 1, 3).expect("map");
        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        assert_eq!(a, b);
        assert_eq!(&b.read()[..], b"bcd");

        b.unmap();
        assert!(!a.is_open());
        drop(b);
        assert_eq!(a.use_count(), 1);
    }

    #[test]
    fn shared_sink_writes_and_syncs() {
        let file = file_with(b"0000");
        let sink = SharedMmapSink::open(file.path(), 0, 4).expect("map");
        sink.write()[2] = b'7';
        sink.sync().expect("sync");
        assert_eq!(std::fs::read(file.path()).expect("read"), b"0070");
    }
}
