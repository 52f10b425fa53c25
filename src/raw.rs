//! Byte-level mapping core: alignment, handle ownership and teardown.

use std::cmp::Ordering;
use std::fmt;
use std::fs::OpenOptions;
use std::hash::{Hash, Hasher};
use std::io;
use std::ptr;

use log::{debug, trace, warn};

use crate::errors::{MmapError, Result};
use crate::handle::{FileHandle, FileSlot, MapLength, MapSource, INVALID_HANDLE};
use crate::platform::{self, RawRegion};
use crate::utils::{align_down, allocation_granularity, check_window, page_size};

/// Access mode of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read-only mapping.
    Read,
    /// Shared read-write mapping; writes reach the file.
    Write,
}

/// A live OS mapping plus the file it came from.
///
/// `Drop` releases `region` before the fields drop, so the mapping (and its
/// distinct handle, if any) always goes before an internal file is closed.
struct Mapping {
    file: FileSlot,
    region: RawRegion,
    mode: AccessMode,
    aligned_offset: u64,
    // Bytes between the aligned start and the requested offset.
    delta: usize,
    mapped_len: usize,
    // Conceptual window, relative to the requested offset.
    window_offset: usize,
    window_len: usize,
}

impl Mapping {
    /// Bytes addressable past the requested offset.
    fn available(&self) -> usize {
        self.mapped_len - self.delta
    }

    fn data_start(&self) -> usize {
        self.delta + self.window_offset
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        trace!(
            "unmapping {} bytes at aligned offset {} (internal handle: {})",
            self.mapped_len,
            self.aligned_offset,
            self.file.is_internal()
        );
        // SAFETY: the region was produced by map_region with mapped_len and is dropped exactly once.
        if let Err(err) = unsafe { platform::unmap_region(&self.region, self.mapped_len) } {
            warn!("failed to release mapping: {err}");
        }
    }
}

/// A single memory mapping of a file region, addressed in bytes.
///
/// `RawMmap` is the untyped core behind [`crate::Mmap`]. It is move-only:
/// exactly one value owns a given OS mapping, and dropping it unmaps.
///
/// The caller may pass any offset. The mapping itself starts at that offset
/// rounded down to [`allocation_granularity`], and the view starts at the
/// requested byte.
///
/// # Examples
///
/// ```no_run
/// use mmap_region::{AccessMode, MapLength, RawMmap};
///
/// let mut map = RawMmap::new();
/// map.map("data.bin", 4106, 100, AccessMode::Read)?;
/// assert_eq!(map.len(), 100);
///
/// // Whole remaining file from offset 0.
/// map.map("data.bin", 0, MapLength::EntireFile, AccessMode::Read)?;
/// # Ok::<(), mmap_region::MmapError>(())
/// ```
#[derive(Default)]
pub struct RawMmap {
    mapping: Option<Mapping>,
}

// SAFETY: the mapped memory is plain shared memory; mutation of the view or
// of the window requires `&mut self`.
unsafe impl Send for RawMmap {}
// SAFETY: `&self` methods only read the mapping.
unsafe impl Sync for RawMmap {}

impl RawMmap {
    /// Create an unmapped instance.
    #[must_use]
    pub const fn new() -> Self {
        Self { mapping: None }
    }

    /// Create an instance and map `length` bytes of `source` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns the error from [`RawMmap::map`].
    pub fn open<'a>(
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
        mode: AccessMode,
    ) -> Result<Self> {
        let mut map = Self::new();
        map.map(source, offset, length, mode)?;
        Ok(map)
    }

    /// Establish a mapping of `length` bytes of `source` starting at `offset`.
    ///
    /// A path source is opened here and closed again on unmap. A handle source
    /// is never closed. `MapLength::EntireFile` maps up to the file's size at
    /// the time of this call. A request resolving to zero bytes succeeds and
    /// leaves the instance unmapped.
    ///
    /// If the instance is already mapped, the new mapping replaces the old one
    /// only once it has been established. On error nothing changes.
    ///
    /// # Errors
    ///
    /// - `MmapError::SourceResolution` if the path cannot be opened or the handle is invalid.
    /// - `MmapError::SizeQuery` if the file size cannot be read.
    /// - `MmapError::OffsetOutOfRange` if `offset` is past the end of the file.
    /// - `MmapError::WindowOutOfRange` if an exact window runs past the end of the file.
    /// - `MmapError::MapFailed` if the OS call fails.
    pub fn map<'a>(
        &mut self,
        source: impl Into<MapSource<'a>>,
        offset: u64,
        length: impl Into<MapLength>,
        mode: AccessMode,
    ) -> Result<()> {
        let source = source.into();
        let length = length.into();
        match establish(source, offset, length, mode) {
            Ok(mapping) => {
                match &mapping {
                    Some(m) => debug!(
                        "mapped {:?} offset={} len={} (aligned offset={}, mapped={}) mode={:?}",
                        source, offset, m.window_len, m.aligned_offset, m.mapped_len, mode
                    ),
                    None => debug!("{source:?} offset={offset} resolved to an empty window; left unmapped"),
                }
                self.mapping = mapping;
                Ok(())
            }
            Err(err) => {
                debug!("mapping {source:?} offset={offset} length={length:?} failed: {err}");
                Err(err)
            }
        }
    }

    /// Release the mapping and, if this instance opened the file, close it.
    ///
    /// No-op when unmapped. Teardown failures are logged, never returned.
    pub fn unmap(&mut self) {
        self.mapping = None;
    }

    /// Whether a mapping is established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Conceptual length in bytes; 0 when unmapped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.window_len)
    }

    /// Whether the conceptual window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes actually handed to the OS: the requested length plus the
    /// distance from the aligned start to the requested offset.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.mapped_len)
    }

    /// File offset of the first byte of the conceptual window.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.mapping
            .as_ref()
            .map_or(0, |m| m.aligned_offset + m.data_start() as u64)
    }

    /// File offset where the OS mapping starts; a multiple of the allocation granularity.
    #[must_use]
    pub fn aligned_offset(&self) -> u64 {
        self.mapping.as_ref().map_or(0, |m| m.aligned_offset)
    }

    /// Access mode of the current mapping, if any.
    #[must_use]
    pub fn mode(&self) -> Option<AccessMode> {
        self.mapping.as_ref().map(|m| m.mode)
    }

    /// Native handle of the mapped file, or `INVALID_HANDLE` when unmapped.
    #[must_use]
    pub fn file_handle(&self) -> FileHandle {
        self.mapping.as_ref().map_or(INVALID_HANDLE, |m| m.file.raw())
    }

    /// Native handle of the mapping object, or `INVALID_HANDLE` when unmapped.
    ///
    /// Equal to [`RawMmap::file_handle`] unless
    /// [`crate::DISTINCT_MAPPING_HANDLE`] is true.
    #[must_use]
    pub fn mapping_handle(&self) -> FileHandle {
        self.mapping
            .as_ref()
            .map_or(INVALID_HANDLE, |m| m.region.mapping_handle)
    }

    /// Whether the file handle was opened by this instance (and will be closed by it).
    #[must_use]
    pub fn is_handle_internal(&self) -> bool {
        self.mapping.as_ref().is_some_and(|m| m.file.is_internal())
    }

    /// Pointer to the first byte of the conceptual window, or null when unmapped.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.as_ref().map_or(ptr::null(), |m| {
            // SAFETY: data_start <= mapped_len, so the result stays inside the region.
            unsafe { m.region.base.add(m.data_start()).cast_const() }
        })
    }

    /// Mutable pointer to the first byte of the conceptual window, or null when unmapped.
    ///
    /// Writing through it is only valid for `AccessMode::Write` mappings.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mapping.as_ref().map_or(ptr::null_mut(), |m| {
            // SAFETY: data_start <= mapped_len, so the result stays inside the region.
            unsafe { m.region.base.add(m.data_start()) }
        })
    }

    /// The conceptual window; empty when unmapped.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            // SAFETY: the window lies inside the live mapping, which is readable in every mode.
            Some(m) => unsafe {
                std::slice::from_raw_parts(m.region.base.add(m.data_start()), m.window_len)
            },
            None => &[],
        }
    }

    /// The conceptual window, writable.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` for a read-only mapping.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &self.mapping {
            Some(m) if m.mode == AccessMode::Read => Err(MmapError::InvalidArgument(
                "mutable access on a read-only mapping".into(),
            )),
            // SAFETY: the mapping is writable and `&mut self` makes the borrow unique.
            Some(m) => Ok(unsafe {
                std::slice::from_raw_parts_mut(m.region.base.add(m.data_start()), m.window_len)
            }),
            None => Ok(&mut []),
        }
    }

    /// Change the conceptual length without remapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` when unmapped or when the window
    /// would run past the mapped region.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        let m = self.mapping_mut()?;
        check_window(m.window_offset, length, m.available())?;
        debug!("conceptual length {} -> {}", m.window_len, length);
        m.window_len = length;
        Ok(())
    }

    /// Move the conceptual start to `offset` bytes past the requested offset,
    /// without remapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::InvalidArgument` when unmapped or when the window
    /// would run past the mapped region.
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        let m = self.mapping_mut()?;
        check_window(offset, m.window_len, m.available())?;
        debug!("conceptual offset {} -> {}", m.window_offset, offset);
        m.window_offset = offset;
        Ok(())
    }

    /// Flush the pages covering the conceptual window to the file.
    ///
    /// A no-op for unmapped instances, read-only mappings and empty windows.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::FlushFailed` if the OS flush call fails.
    pub fn sync(&self) -> Result<()> {
        let Some(m) = &self.mapping else {
            return Ok(());
        };
        if m.mode == AccessMode::Read {
            return Ok(());
        }
        let Some((addr, len)) = self.page_span() else {
            return Ok(());
        };
        // SAFETY: page_span is page aligned and inside the live mapping.
        unsafe { platform::flush_region(addr, len, m.file.raw()) }.map_err(MmapError::FlushFailed)
    }

    /// Exchange the mappings held by `self` and `other`.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.mapping, &mut other.mapping);
    }

    /// Page-aligned span covering the conceptual window, or `None` if it is empty.
    pub(crate) fn page_span(&self) -> Option<(*mut u8, usize)> {
        let m = self.mapping.as_ref()?;
        if m.window_len == 0 {
            return None;
        }
        let start = m.data_start();
        #[allow(clippy::cast_possible_truncation)]
        let page_start = align_down(start as u64, page_size() as u64) as usize;
        // SAFETY: page_start <= start <= mapped_len.
        let addr = unsafe { m.region.base.add(page_start) };
        Some((addr, start + m.window_len - page_start))
    }

    fn mapping_mut(&mut self) -> Result<&mut Mapping> {
        self.mapping
            .as_mut()
            .ok_or_else(|| MmapError::InvalidArgument("no mapping established".into()))
    }

    fn identity(&self) -> (FileHandle, u64, usize) {
        (self.file_handle(), self.aligned_offset(), self.mapped_len())
    }
}

/// Open or adopt the file, validate the request and map it.
fn establish(
    source: MapSource<'_>,
    offset: u64,
    length: MapLength,
    mode: AccessMode,
) -> Result<Option<Mapping>> {
    let file = resolve(source, mode)?;
    let file_size = platform::file_size(file.raw()).map_err(MmapError::SizeQuery)?;
    if offset > file_size {
        return Err(MmapError::OffsetOutOfRange { offset, file_size });
    }
    let remaining = file_size - offset;
    let length = match length {
        MapLength::EntireFile => usize::try_from(remaining).map_err(|_| {
            MmapError::MapFailed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file too large for the address space",
            ))
        })?,
        MapLength::Exact(len) if len as u64 > remaining => {
            return Err(MmapError::WindowOutOfRange {
                offset,
                len: len as u64,
                file_size,
            });
        }
        MapLength::Exact(len) => len,
    };
    if length == 0 {
        return Ok(None);
    }

    let aligned_offset = align_down(offset, allocation_granularity() as u64);
    #[allow(clippy::cast_possible_truncation)]
    let delta = (offset - aligned_offset) as usize;
    let mapped_len = delta.checked_add(length).ok_or_else(|| {
        MmapError::MapFailed(io::Error::from(io::ErrorKind::InvalidInput))
    })?;

    // SAFETY: aligned_offset is granularity aligned and mapped_len is non-zero.
    let region = unsafe { platform::map_region(file.raw(), aligned_offset, mapped_len, mode) }
        .map_err(MmapError::MapFailed)?;
    Ok(Some(Mapping {
        file,
        region,
        mode,
        aligned_offset,
        delta,
        mapped_len,
        window_offset: 0,
        window_len: length,
    }))
}

fn resolve(source: MapSource<'_>, mode: AccessMode) -> Result<FileSlot> {
    match source {
        MapSource::Path(path) => OpenOptions::new()
            .read(true)
            .write(mode == AccessMode::Write)
            .open(path)
            .map(FileSlot::Internal)
            .map_err(MmapError::SourceResolution),
        MapSource::Handle(handle) if handle == INVALID_HANDLE => {
            Err(MmapError::SourceResolution(platform::invalid_handle_error()))
        }
        MapSource::Handle(handle) => platform::check_handle(handle)
            .map(|()| FileSlot::External(handle))
            .map_err(MmapError::SourceResolution),
    }
}

impl fmt::Debug for RawMmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMmap")
            .field("file_handle", &self.file_handle())
            .field("mode", &self.mode())
            .field("offset", &self.offset())
            .field("len", &self.len())
            .field("mapped_len", &self.mapped_len())
            .finish()
    }
}

impl PartialEq for RawMmap {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RawMmap {}

impl PartialOrd for RawMmap {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawMmap {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for RawMmap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
