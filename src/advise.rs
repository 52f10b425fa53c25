//! Memory advise operations for optimizing OS behavior.

use crate::errors::Result;
use crate::mmap::{Access, Element, Mmap};
use crate::raw::RawMmap;

/// Memory access pattern advice for the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapAdvice {
    /// Normal access pattern (default).
    Normal,
    /// Random access pattern.
    Random,
    /// Sequential access pattern.
    Sequential,
    /// Will need this range soon.
    WillNeed,
    /// Won't need this range soon.
    DontNeed,
}

impl RawMmap {
    /// Advise the OS about the expected access pattern of the conceptual window.
    ///
    /// The hint covers the pages spanning the window and may be ignored by
    /// the OS. Unmapped instances and empty windows are a no-op.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Unix**: Uses `madvise` system call
    /// - **Windows**: Uses `PrefetchVirtualMemory` for `WillNeed`, no-op for others
    ///
    /// # Errors
    ///
    /// Returns `MmapError::AdviceFailed` if the system call fails.
    pub fn advise(&self, advice: MmapAdvice) -> Result<()> {
        let Some((addr, length)) = self.page_span() else {
            return Ok(());
        };

        #[cfg(unix)]
        {
            use libc::{madvise, MADV_DONTNEED, MADV_NORMAL, MADV_RANDOM, MADV_SEQUENTIAL, MADV_WILLNEED};

            let advice_flag = match advice {
                MmapAdvice::Normal => MADV_NORMAL,
                MmapAdvice::Random => MADV_RANDOM,
                MmapAdvice::Sequential => MADV_SEQUENTIAL,
                MmapAdvice::WillNeed => MADV_WILLNEED,
                MmapAdvice::DontNeed => MADV_DONTNEED,
            };

            // SAFETY: page_span is page aligned and inside the live mapping.
            let result = unsafe { madvise(addr.cast::<libc::c_void>(), length, advice_flag) };

            if result != 0 {
                return Err(crate::errors::MmapError::AdviceFailed(std::io::Error::last_os_error()));
            }
        }

        #[cfg(windows)]
        {
            if matches!(advice, MmapAdvice::WillNeed) {
                #[allow(non_snake_case)]
                #[repr(C)]
                struct WIN32_MEMORY_RANGE_ENTRY {
                    VirtualAddress: *mut core::ffi::c_void,
                    NumberOfBytes: usize,
                }

                #[allow(non_snake_case)]
                extern "system" {
                    fn PrefetchVirtualMemory(
                        hProcess: *mut core::ffi::c_void,
                        NumberOfEntries: usize,
                        VirtualAddresses: *const WIN32_MEMORY_RANGE_ENTRY,
                        Flags: u32,
                    ) -> i32;

                    fn GetCurrentProcess() -> *mut core::ffi::c_void;
                }

                let entry = WIN32_MEMORY_RANGE_ENTRY {
                    VirtualAddress: addr.cast::<core::ffi::c_void>(),
                    NumberOfBytes: length,
                };

                // SAFETY: the entry describes pages of the live mapping.
                let result = unsafe { PrefetchVirtualMemory(GetCurrentProcess(), 1, &entry, 0) };

                if result == 0 {
                    return Err(crate::errors::MmapError::AdviceFailed(std::io::Error::last_os_error()));
                }
            }
        }

        Ok(())
    }
}

impl<A: Access, T: Element> Mmap<A, T> {
    /// Advise the OS about the expected access pattern of the view.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::AdviceFailed` if the system call fails.
    pub fn advise(&self, advice: MmapAdvice) -> Result<()> {
        self.raw().advise(advice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::MapLength;
    use crate::mmap::{MmapSink, MmapSource};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn zero_file(len: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(&vec![0u8; len]).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn test_advise_operations() {
        let file = zero_file(8192);
        let map = MmapSource::open(file.path(), 100, MapLength::EntireFile).expect("map");

        map.advise(MmapAdvice::Sequential).expect("sequential advice");
        map.advise(MmapAdvice::Random).expect("random advice");
        map.advise(MmapAdvice::Normal).expect("normal advice");
        map.advise(MmapAdvice::WillNeed).expect("will need advice");
    }

    #[test]
    fn test_advise_unmapped_and_sink() {
        MmapSource::new().advise(MmapAdvice::WillNeed).expect("unmapped no-op");

        let file = zero_file(4096);
        let sink = MmapSink::open(file.path(), 0, 4096).expect("map sink");
        sink.advise(MmapAdvice::DontNeed).expect("dont need advice");
    }
}
