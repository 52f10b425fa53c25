//! Native file handles and the sources a mapping can be created from.

use std::fs::File;
use std::path::{Path, PathBuf};

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// Native file handle type of the current platform.
        pub type FileHandle = std::os::windows::io::RawHandle;

        /// Sentinel value of an invalid handle (`INVALID_HANDLE_VALUE`).
        pub const INVALID_HANDLE: FileHandle = -1isize as FileHandle;
    } else {
        /// Native file handle type of the current platform.
        pub type FileHandle = std::os::unix::io::RawFd;

        /// Sentinel value of an invalid handle.
        pub const INVALID_HANDLE: FileHandle = -1;
    }
}

/// Number of bytes to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapLength {
    /// Map exactly this many bytes starting at the requested offset.
    Exact(usize),
    /// Map from the requested offset to the current end of the file.
    EntireFile,
}

impl From<usize> for MapLength {
    fn from(len: usize) -> Self {
        Self::Exact(len)
    }
}

/// Where a mapping gets its file from.
///
/// A path is opened by the mapping itself and closed again on unmap. A
/// handle is borrowed: it is never closed by this crate and must stay open
/// for as long as the caller wants to `sync` through the mapping.
#[derive(Debug, Clone, Copy)]
pub enum MapSource<'a> {
    /// Filesystem path of an existing file.
    Path(&'a Path),
    /// Already-open native file handle.
    Handle(FileHandle),
}

impl<'a> From<&'a Path> for MapSource<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for MapSource<'a> {
    fn from(path: &'a PathBuf) -> Self {
        Self::Path(path.as_path())
    }
}

impl<'a> From<&'a str> for MapSource<'a> {
    fn from(path: &'a str) -> Self {
        Self::Path(Path::new(path))
    }
}

impl<'a> From<&'a String> for MapSource<'a> {
    fn from(path: &'a String) -> Self {
        Self::Path(Path::new(path))
    }
}

impl<'a> From<&'a File> for MapSource<'a> {
    fn from(file: &'a File) -> Self {
        Self::Handle(raw_handle(file))
    }
}

impl From<FileHandle> for MapSource<'_> {
    fn from(handle: FileHandle) -> Self {
        Self::Handle(handle)
    }
}

/// The file a mapping was created from, tagged with who owns it.
#[derive(Debug)]
pub(crate) enum FileSlot {
    /// Opened from a path by the mapping; closed when dropped.
    Internal(File),
    /// Supplied by the caller; left open.
    External(FileHandle),
}

impl FileSlot {
    pub(crate) fn raw(&self) -> FileHandle {
        match self {
            Self::Internal(file) => raw_handle(file),
            Self::External(handle) => *handle,
        }
    }

    pub(crate) fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

#[cfg(windows)]
fn raw_handle(file: &File) -> FileHandle {
    use std::os::windows::io::AsRawHandle;
    file.as_raw_handle()
}

#[cfg(not(windows))]
fn raw_handle(file: &File) -> FileHandle {
    use std::os::unix::io::AsRawFd;
    file.as_raw_fd()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_from_strings_are_paths() {
        let owned = String::from("data.bin");
        assert!(matches!(MapSource::from("data.bin"), MapSource::Path(p) if p == Path::new("data.bin")));
        assert!(matches!(MapSource::from(&owned), MapSource::Path(_)));
        assert!(matches!(MapSource::from(INVALID_HANDLE), MapSource::Handle(h) if h == INVALID_HANDLE));
    }

    #[test]
    fn length_from_usize_is_exact() {
        assert_eq!(MapLength::from(12), MapLength::Exact(12));
        assert_ne!(MapLength::from(0), MapLength::EntireFile);
    }
}
