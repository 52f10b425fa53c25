//! Failing map requests report a categorised error and leave the view untouched.

use mmap_region::{
    make_mmap_source, AccessMode, ErrorKind, MapLength, MmapError, MmapSource, RawMmap, INVALID_HANDLE,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn filled_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(&vec![b'M'; len]).expect("write");
    file.flush().expect("flush");
    file
}

fn assert_invalid(result: mmap_region::errors::Result<MmapSource>, kind: ErrorKind) {
    let err = result.expect_err("mapping should fail");
    assert_eq!(err.kind(), kind, "{err}");
}

#[test]
fn missing_file() {
    assert_invalid(
        make_mmap_source("garbage-that-hopefully-doesnt-exist", 0, 0),
        ErrorKind::SourceResolution,
    );
}

#[test]
fn empty_path() {
    assert_invalid(make_mmap_source("", 0, MapLength::EntireFile), ErrorKind::SourceResolution);
}

#[test]
fn invalid_handle() {
    let err = make_mmap_source(INVALID_HANDLE, 0, 0).expect_err("invalid handle");
    assert_eq!(err.kind(), ErrorKind::SourceResolution);
    assert!(err.raw_os_error().is_some());
}

#[test]
fn offset_past_end_of_file() {
    let file = filled_file(0x4000 - 250);
    let size = 0x4000 - 250;
    let err = make_mmap_source(file.path(), 100 * size as u64, size).expect_err("offset");
    assert!(matches!(
        err,
        mmap_region::MmapError::OffsetOutOfRange { file_size, .. } if file_size == size as u64
    ));
}

#[test]
fn failed_map_on_unmapped_view_stays_unmapped() {
    let mut map = MmapSource::new();
    assert!(map.map("garbage-that-hopefully-doesnt-exist", 0, 10).is_err());
    assert!(!map.is_open());
    assert!(map.is_empty());
}

#[test]
fn failed_map_on_mapped_view_keeps_everything() {
    let file = filled_file(10_000);
    let mut map = RawMmap::open(file.path(), 4106, 100, AccessMode::Read).expect("map");
    map.set_length(60).expect("shrink");
    map.set_offset(7).expect("shift");
    let snapshot = (
        map.as_ptr(),
        map.len(),
        map.mapped_len(),
        map.offset(),
        map.file_handle(),
    );

    assert!(map.map(file.path(), 20_000, 1, AccessMode::Read).is_err());
    assert!(map.map(INVALID_HANDLE, 0, 1, AccessMode::Read).is_err());
    assert!(map.map(file.path(), 9_990, 11, AccessMode::Read).is_err());

    assert_eq!(
        (
            map.as_ptr(),
            map.len(),
            map.mapped_len(),
            map.offset(),
            map.file_handle(),
        ),
        snapshot
    );
    assert_eq!(map.as_slice()[0], b'M');
}

#[cfg(unix)]
#[test]
fn closed_or_negative_descriptor() {
    use mmap_region::FileHandle;

    // Far above any descriptor this process has open.
    let handles: [FileHandle; 2] = [1_000_000, -7];
    for handle in handles {
        let err = make_mmap_source(handle, 0, 1).expect_err("bad descriptor");
        assert_eq!(err.kind(), ErrorKind::SourceResolution, "{err}");
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}

#[test]
fn window_past_end_of_file() {
    let file = filled_file(100);
    let err = make_mmap_source(file.path(), 50, 51).expect_err("past eof");
    assert_eq!(err.kind(), ErrorKind::OffsetOutOfRange);
    assert!(matches!(
        err,
        MmapError::WindowOutOfRange { offset: 50, len: 51, file_size: 100 }
    ));
}
