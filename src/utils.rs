//! Utility helpers for page size, allocation granularity and window arithmetic.

use crate::errors::{MmapError, Result};

/// Get the system page size in bytes.
#[must_use]
pub fn page_size() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "windows")] {
            windows_system_info().0
        } else {
            unix_page_size()
        }
    }
}

/// Get the alignment a mapping's file offset must honour, in bytes.
///
/// On Unix this is the page size. On Windows it is the allocation
/// granularity reported by `GetSystemInfo`, typically 64 KiB.
#[must_use]
pub fn allocation_granularity() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "windows")] {
            windows_system_info().1
        } else {
            unix_page_size()
        }
    }
}

/// Returns `(page_size, allocation_granularity)`.
#[cfg(target_os = "windows")]
fn windows_system_info() -> (usize, usize) {
    use std::mem::MaybeUninit;
    #[allow(non_snake_case)]
    #[repr(C)]
    struct SYSTEM_INFO {
        wProcessorArchitecture: u16,
        wReserved: u16,
        dwPageSize: u32,
        lpMinimumApplicationAddress: *mut core::ffi::c_void,
        lpMaximumApplicationAddress: *mut core::ffi::c_void,
        dwActiveProcessorMask: usize,
        dwNumberOfProcessors: u32,
        dwProcessorType: u32,
        dwAllocationGranularity: u32,
        wProcessorLevel: u16,
        wProcessorRevision: u16,
    }
    extern "system" {
        fn GetSystemInfo(lpSystemInfo: *mut SYSTEM_INFO);
    }
    let mut sysinfo = MaybeUninit::<SYSTEM_INFO>::uninit();
    // SAFETY: GetSystemInfo always fills the provided struct.
    unsafe {
        GetSystemInfo(sysinfo.as_mut_ptr());
        let s = sysinfo.assume_init();
        (s.dwPageSize as usize, s.dwAllocationGranularity as usize)
    }
}

#[cfg(not(target_os = "windows"))]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unix_page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE is safe to call.
    unsafe {
        let page_size = libc::sysconf(libc::_SC_PAGESIZE);
        page_size.max(0) as usize
    }
}

/// Round `value` down to the nearest multiple of `alignment`.
#[must_use]
pub fn align_down(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    if alignment.is_power_of_two() {
        value & !(alignment - 1)
    } else {
        value - value % alignment
    }
}

/// Ensure a conceptual window `[offset, offset + len)` fits in `available` bytes.
///
/// # Errors
///
/// Returns `MmapError::InvalidArgument` if the window does not fit.
pub fn check_window(offset: usize, len: usize, available: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(()),
        _ => Err(MmapError::InvalidArgument(format!(
            "window offset={offset}, len={len} exceeds {available} mapped bytes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_down_power_of_two_and_odd() {
        assert_eq!(align_down(4106, 4096), 4096);
        assert_eq!(align_down(4096, 4096), 4096);
        assert_eq!(align_down(4095, 4096), 0);
        assert_eq!(align_down(25, 10), 20);
        assert_eq!(align_down(7, 0), 7);
    }

    #[test]
    fn granularity_is_page_multiple() {
        let page = page_size();
        let gran = allocation_granularity();
        assert!(page > 0);
        assert!(gran >= page);
        assert_eq!(gran % page, 0);
    }

    #[test]
    fn window_bounds() {
        assert!(check_window(0, 100, 100).is_ok());
        assert!(check_window(10, 90, 100).is_ok());
        assert!(check_window(100, 0, 100).is_ok());
        assert!(check_window(0, 101, 100).is_err());
        assert!(check_window(usize::MAX, 2, 100).is_err());
    }
}
