//! Shelfcast Library
//!
//! Turns a `<root>/<author>/<title>/` directory tree into streamable books:
//! classifies book directories, resolves metadata from embedded tags and
//! OPF side-cars, extracts covers, builds the segment and chapter tables,
//! and decides which containers still need normalizing. The watcher half
//! re-triggers the scanner on filesystem changes.

#![forbid(unsafe_code)]

pub mod covers;
pub mod error;
pub mod layout;
pub mod opf;
pub mod scanner;
pub mod watcher;

pub use covers::CoverResolver;
pub use error::{LibraryError, Result};
pub use layout::{BookFolder, BookShape};
pub use opf::OpfMetadata;
pub use scanner::{ScanSummary, Scanner};
pub use watcher::{spawn_watchers, LibraryWatcher};
