//! Crate-specific error types for mmap-region.

use std::io;
use thiserror::Error;

/// Result alias for mmap-region operations.
pub type Result<T> = std::result::Result<T, MmapError>;

/// Coarse category of a [`MmapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The path could not be opened or the handle is invalid.
    SourceResolution,
    /// The size of the file could not be queried.
    SizeQuery,
    /// The requested offset (or window) lies beyond the end of the file.
    OffsetOutOfRange,
    /// The OS refused to establish the mapping.
    MapFailed,
    /// The OS flush primitive failed.
    FlushFailed,
    /// A conceptual window adjustment (or typed request) was out of range.
    InvalidArgument,
    /// An access-pattern hint was rejected by the OS.
    AdviceFailed,
}

/// Error type covering every fallible mapping operation.
///
/// OS-level variants carry the underlying [`io::Error`], so the platform
/// error code is always available through [`MmapError::raw_os_error`].
#[derive(Debug, Error)]
pub enum MmapError {
    /// The path could not be opened, or the supplied handle is invalid.
    #[error("failed to resolve mapping source: {0}")]
    SourceResolution(#[source] io::Error),

    /// Querying the current size of the file failed.
    #[error("failed to query file size: {0}")]
    SizeQuery(#[source] io::Error),

    /// The requested offset exceeds the current file size.
    #[error("offset out of range: offset={offset}, file_size={file_size}")]
    OffsetOutOfRange {
        /// Requested offset in bytes.
        offset: u64,
        /// File size observed at map time.
        file_size: u64,
    },

    /// The requested window runs past the end of the file.
    #[error("window out of range: offset={offset}, len={len}, file_size={file_size}")]
    WindowOutOfRange {
        /// Requested offset in bytes.
        offset: u64,
        /// Requested length in bytes.
        len: u64,
        /// File size observed at map time.
        file_size: u64,
    },

    /// The OS mapping call rejected the request.
    ///
    /// Carries the OS error code, except when the request cannot be expressed
    /// in the address space at all (`io::ErrorKind::InvalidInput`, no code).
    #[error("failed to establish mapping: {0}")]
    MapFailed(#[source] io::Error),

    /// The OS flush call failed.
    #[error("flush failed: {0}")]
    FlushFailed(#[source] io::Error),

    /// The requested conceptual window does not fit in the mapped region.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The OS rejected an access-pattern hint.
    #[error("advice failed: {0}")]
    AdviceFailed(#[source] io::Error),
}

impl MmapError {
    /// Coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceResolution(_) => ErrorKind::SourceResolution,
            Self::SizeQuery(_) => ErrorKind::SizeQuery,
            Self::OffsetOutOfRange { .. } | Self::WindowOutOfRange { .. } => {
                ErrorKind::OffsetOutOfRange
            }
            Self::MapFailed(_) => ErrorKind::MapFailed,
            Self::FlushFailed(_) => ErrorKind::FlushFailed,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AdviceFailed(_) => ErrorKind::AdviceFailed,
        }
    }

    /// Platform error code, when the failure came from the OS.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SourceResolution(e)
            | Self::SizeQuery(e)
            | Self::MapFailed(e)
            | Self::FlushFailed(e)
            | Self::AdviceFailed(e) => e.raw_os_error(),
            Self::OffsetOutOfRange { .. }
            | Self::WindowOutOfRange { .. }
            | Self::InvalidArgument(_) => None,
        }
    }
}
