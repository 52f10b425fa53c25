//! Platform dispatch for the OS mapping primitives.
//!
//! Every backend exposes the same free functions:
//!
//! - `file_size(handle)`: current size of the file behind `handle`
//! - `map_region(handle, aligned_offset, len, mode)`: establish a mapping
//! - `unmap_region(&region, len)`: release a mapping and its handle
//! - `flush_region(addr, len, file_handle)`: flush dirty pages to the file
//! - `check_handle(handle)`: fail with the OS error unless `handle` is open
//! - `invalid_handle_error()`: the OS error reported for `INVALID_HANDLE`
//!
//! plus `DISTINCT_MAPPING_HANDLE`, which tells whether a mapping owns a kernel
//! object separate from the file handle.

use crate::handle::FileHandle;

/// An established OS mapping.
#[derive(Debug)]
pub(crate) struct RawRegion {
    /// First byte of the aligned region.
    pub(crate) base: *mut u8,
    /// Mapping object handle; aliases the file handle where
    /// `DISTINCT_MAPPING_HANDLE` is false.
    pub(crate) mapping_handle: FileHandle,
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::*;
        pub use self::windows::DISTINCT_MAPPING_HANDLE;
    } else {
        mod unix;
        pub(crate) use self::unix::*;
        pub use self::unix::DISTINCT_MAPPING_HANDLE;
    }
}
