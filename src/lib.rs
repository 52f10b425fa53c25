//! # mmap-region: portable memory-mapped views over file regions
//!
//! This crate maps an arbitrary `(offset, length)` region of a file into
//! memory and exposes it as a slice, hiding the platform differences:
//! allocation-granularity alignment of the offset, the separate mapping object
//! Windows requires, and who is responsible for closing the file handle.
//!
//! ## Features
//!
//! - **Arbitrary offsets**: the mapping is aligned internally; the view starts at the requested byte
//! - **Handle ownership**: files opened from a path are closed on unmap; borrowed handles never are
//! - **Typed views**: read-only and read-write access as type parameters, any plain element type
//! - **Adjustable windows**: shrink or shift the visible range without remapping
//! - **Shared ownership**: reference-counted mappings via [`SharedMmap`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use mmap_region::{make_mmap_sink, make_mmap_source, MapLength};
//!
//! // Map 100 bytes starting at an unaligned offset.
//! let source = make_mmap_source("data.bin", 4106, 100)?;
//! assert_eq!(source.len(), 100);
//!
//! // Map the whole file for writing, edit it, and flush.
//! let mut sink = make_mmap_sink("data.bin", 0, MapLength::EntireFile)?;
//! sink[0] = 0xFF;
//! sink.sync()?;
//! # Ok::<(), mmap_region::MmapError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error types for all mapping operations
//! - [`utils`]: Page size, allocation granularity and alignment helpers
//! - [`handle`]: Native file handles, mapping sources and length requests
//! - [`raw`]: Untyped mapping core
//! - [`mmap`]: Typed, access-mode-checked views
//! - [`shared`]: Reference-counted views
//! - [`manager`]: Factory functions
//!
//! ## Feature Flags
//!
//! - `advise` (default): access-pattern hints via `madvise` / `PrefetchVirtualMemory`

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod errors;
pub mod utils;
pub mod handle;
mod platform;
pub mod raw;
pub mod mmap;
pub mod shared;
pub mod manager;

#[cfg(feature = "advise")]
pub mod advise;

pub use errors::{ErrorKind, MmapError};
pub use handle::{FileHandle, MapLength, MapSource, INVALID_HANDLE};
pub use platform::DISTINCT_MAPPING_HANDLE;
pub use raw::{AccessMode, RawMmap};
pub use mmap::{
    Access, Element, Mmap, MmapSink, MmapSinkOf, MmapSource, MmapSourceOf, ReadOnly, ReadWrite,
};
pub use shared::{SharedMmap, SharedMmapSink, SharedMmapSource};
pub use manager::{make_mmap, make_mmap_sink, make_mmap_source};
pub use utils::{allocation_granularity, page_size};

#[cfg(feature = "advise")]
pub use advise::MmapAdvice;
