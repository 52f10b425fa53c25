//! Handle ownership across map and unmap.
//!
//! Kept in its own test binary: the descriptor checks below would race with
//! other tests opening files in parallel threads.

use mmap_region::{MapLength, MmapSource, DISTINCT_MAPPING_HANDLE, INVALID_HANDLE};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

#[test]
fn path_mappings_close_their_handle_and_borrowed_handles_stay_open() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(b"ownership boundary")?;
    file.flush()?;

    // Path source: the view opens, owns and closes the handle.
    let mut owned = MmapSource::open(file.path(), 0, MapLength::EntireFile)?;
    assert!(owned.is_handle_internal());
    let fd = owned.file_handle();
    assert_ne!(fd, INVALID_HANDLE);
    if !DISTINCT_MAPPING_HANDLE {
        assert_eq!(owned.mapping_handle(), fd);
    }
    owned.unmap();
    assert_eq!(owned.file_handle(), INVALID_HANDLE);
    assert_eq!(owned.mapping_handle(), INVALID_HANDLE);
    #[cfg(unix)]
    {
        // SAFETY: F_GETFD only inspects the descriptor table.
        let rc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        assert_eq!(rc, -1, "descriptor should be closed after unmap");
    }

    // Handle source: the view borrows the handle and leaves it open.
    let mut borrowed = MmapSource::open(file.as_file(), 10, 8)?;
    assert!(!borrowed.is_handle_internal());
    assert_eq!(&borrowed[..], b"boundary");
    borrowed.unmap();
    drop(borrowed);

    let handle = file.as_file_mut();
    handle.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    handle.read_to_string(&mut contents)?;
    assert_eq!(contents, "ownership boundary");
    Ok(())
}
