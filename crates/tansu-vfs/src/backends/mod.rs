//! Reference backends.
//!
//! Backends implement [`FileSystem`](crate::fs::FileSystem) over different
//! storage types.

mod directory;
mod listing;
mod memory;

pub use directory::{DirectorySource, scan_listing};
pub use listing::{CachePolicy, ContentSource, ListingFs};
pub use memory::InMemoryFs;
