//! `CreateFileMappingW` / `MapViewOfFile` backend.

use std::io;
use std::ptr;

use super::RawRegion;
use crate::handle::FileHandle;
use crate::raw::AccessMode;

/// Whether a mapping owns a kernel object separate from the file handle.
///
/// True here: every view needs its own file-mapping object.
pub const DISTINCT_MAPPING_HANDLE: bool = true;

type Handle = *mut core::ffi::c_void;

const PAGE_READONLY: u32 = 0x02;
const PAGE_READWRITE: u32 = 0x04;
const FILE_MAP_WRITE: u32 = 0x0002;
const FILE_MAP_READ: u32 = 0x0004;

#[allow(non_snake_case)]
extern "system" {
    fn CreateFileMappingW(
        hFile: Handle,
        lpFileMappingAttributes: *mut core::ffi::c_void,
        flProtect: u32,
        dwMaximumSizeHigh: u32,
        dwMaximumSizeLow: u32,
        lpName: *const u16,
    ) -> Handle;
    fn MapViewOfFile(
        hFileMappingObject: Handle,
        dwDesiredAccess: u32,
        dwFileOffsetHigh: u32,
        dwFileOffsetLow: u32,
        dwNumberOfBytesToMap: usize,
    ) -> *mut core::ffi::c_void;
    fn UnmapViewOfFile(lpBaseAddress: *const core::ffi::c_void) -> i32;
    fn FlushViewOfFile(lpBaseAddress: *const core::ffi::c_void, dwNumberOfBytesToFlush: usize) -> i32;
    fn FlushFileBuffers(hFile: Handle) -> i32;
    fn CloseHandle(hObject: Handle) -> i32;
    fn GetFileSizeEx(hFile: Handle, lpFileSize: *mut i64) -> i32;
    fn GetHandleInformation(hObject: Handle, lpdwFlags: *mut u32) -> i32;
}

#[allow(clippy::cast_possible_truncation)]
fn split(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

pub(crate) fn file_size(handle: FileHandle) -> io::Result<u64> {
    let mut size: i64 = 0;
    // SAFETY: GetFileSizeEx writes a single i64 and fails cleanly on a bad handle.
    if unsafe { GetFileSizeEx(handle, &mut size) } == 0 {
        return Err(io::Error::last_os_error());
    }
    u64::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::InvalidData))
}

/// Map `len` bytes of `handle` starting at `aligned_offset`.
///
/// # Safety
///
/// `aligned_offset` must be a multiple of the allocation granularity and
/// `len` must be non-zero.
pub(crate) unsafe fn map_region(
    handle: FileHandle,
    aligned_offset: u64,
    len: usize,
    mode: AccessMode,
) -> io::Result<RawRegion> {
    let (protect, access) = match mode {
        AccessMode::Read => (PAGE_READONLY, FILE_MAP_READ),
        AccessMode::Write => (PAGE_READWRITE, FILE_MAP_READ | FILE_MAP_WRITE),
    };
    let (max_hi, max_lo) = split(aligned_offset + len as u64);
    let mapping = CreateFileMappingW(handle, ptr::null_mut(), protect, max_hi, max_lo, ptr::null());
    if mapping.is_null() {
        return Err(io::Error::last_os_error());
    }
    let (off_hi, off_lo) = split(aligned_offset);
    let base = MapViewOfFile(mapping, access, off_hi, off_lo, len);
    if base.is_null() {
        let err = io::Error::last_os_error();
        CloseHandle(mapping);
        return Err(err);
    }
    Ok(RawRegion {
        base: base.cast::<u8>(),
        mapping_handle: mapping,
    })
}

/// Unmaps the view, then closes the mapping object.
///
/// # Safety
///
/// `region` must come from `map_region` and must not be used afterwards.
pub(crate) unsafe fn unmap_region(region: &RawRegion, _len: usize) -> io::Result<()> {
    let mut result = Ok(());
    if UnmapViewOfFile(region.base.cast_const().cast::<core::ffi::c_void>()) == 0 {
        result = Err(io::Error::last_os_error());
    }
    if CloseHandle(region.mapping_handle) == 0 && result.is_ok() {
        result = Err(io::Error::last_os_error());
    }
    result
}

/// Flushes the view, then the file's buffers.
///
/// # Safety
///
/// `[addr, addr + len)` must lie inside a live view.
pub(crate) unsafe fn flush_region(addr: *mut u8, len: usize, file_handle: FileHandle) -> io::Result<()> {
    if FlushViewOfFile(addr.cast_const().cast::<core::ffi::c_void>(), len) == 0 {
        return Err(io::Error::last_os_error());
    }
    if FlushFileBuffers(file_handle) == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Fails with the OS error if `handle` is not an open handle.
pub(crate) fn check_handle(handle: FileHandle) -> io::Result<()> {
    let mut flags: u32 = 0;
    // SAFETY: GetHandleInformation writes a single u32 and fails cleanly on a bad handle.
    if unsafe { GetHandleInformation(handle, &mut flags) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn invalid_handle_error() -> io::Error {
    // ERROR_INVALID_HANDLE
    io::Error::from_raw_os_error(6)
}
