//! `mmap(2)` backend.

use std::io;
use std::mem::MaybeUninit;
use std::ptr;

use super::RawRegion;
use crate::handle::FileHandle;
use crate::raw::AccessMode;

/// Whether a mapping owns a kernel object separate from the file handle.
///
/// False here: the file descriptor doubles as the mapping handle.
pub const DISTINCT_MAPPING_HANDLE: bool = false;

pub(crate) fn file_size(handle: FileHandle) -> io::Result<u64> {
    let mut stat = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: fstat only writes into the provided buffer and reports EBADF for bad descriptors.
    let rc = unsafe { libc::fstat(handle, stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstat succeeded, so the buffer is initialised.
    let stat = unsafe { stat.assume_init() };
    u64::try_from(stat.st_size).map_err(|_| io::Error::from(io::ErrorKind::InvalidData))
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
    let offset = libc::off_t::try_from(aligned_offset)
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let prot = match mode {
        AccessMode::Read => libc::PROT_READ,
        AccessMode::Write => libc::PROT_READ | libc::PROT_WRITE,
    };
    let base = libc::mmap(ptr::null_mut(), len, prot, libc::MAP_SHARED, handle, offset);
    if base == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(RawRegion {
        base: base.cast::<u8>(),
        mapping_handle: handle,
    })
}

/// # Safety
///
/// `region` must come from `map_region` with the same `len` and must not be used afterwards.
pub(crate) unsafe fn unmap_region(region: &RawRegion, len: usize) -> io::Result<()> {
    if libc::munmap(region.base.cast::<libc::c_void>(), len) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// # Safety
///
/// `addr` must be page aligned and `[addr, addr + len)` must lie inside a live mapping.
pub(crate) unsafe fn flush_region(addr: *mut u8, len: usize, _file_handle: FileHandle) -> io::Result<()> {
    if libc::msync(addr.cast::<libc::c_void>(), len, libc::MS_SYNC) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Fails with the OS error if `handle` is not an open descriptor.
pub(crate) fn check_handle(handle: FileHandle) -> io::Result<()> {
    // SAFETY: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(handle, libc::F_GETFD) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn invalid_handle_error() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}
