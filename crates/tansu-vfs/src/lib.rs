//! # tansu-vfs
//!
//! Backend-agnostic virtual filesystem layer.
//!
//! Key components:
//!
//! - [`FileSystem`] - POSIX-like contract every backend satisfies, in a
//!   blocking (`*_sync`) and a non-blocking (`async fn`) form, with default
//!   bodies composed from a small primitive subset
//! - [`Synchronous`] - derives the non-blocking form for blocking-only backends
//! - [`FileFlag`] - open modes and the existence decision tables
//! - [`FileIndex`] - inode tree for listing-based backends
//! - [`PreloadFile`] / [`NoSyncFile`] - buffered handles with arbitrary-offset
//!   read, write and truncate
//! - [`InMemoryFs`], [`ListingFs`] - reference backends
//!
//! ## Design Decisions
//!
//! - **Virtual paths are strings**: always absolute, always `/`-separated,
//!   independent of the host platform.
//! - **One error type**: every failure is an [`FsError`] carrying a fixed
//!   POSIX-style [`ErrorCode`] and the offending path.
//! - **Metadata is copied out**: backends hand callers value copies of
//!   [`Stats`]; the authoritative record is only mutated by its owner.

pub mod backends;
pub mod config;
pub mod error;
pub mod file;
pub mod flag;
pub mod fs;
pub mod index;
pub mod path;
pub mod stats;

pub use backends::{
    CachePolicy, ContentSource, DirectorySource, InMemoryFs, ListingFs, scan_listing,
};
pub use config::{IndexSource, ListingConfig};
pub use error::{ErrorCode, FsError, FsResult};
pub use file::{File, FileBuffer, NoSyncFile, Persist, PreloadFile};
pub use flag::{FileFlag, PathExistsAction, PathNotExistsAction};
pub use fs::{Capabilities, DiskSpace, FileSystem, Synchronous};
pub use index::{DirInode, FileIndex, Inode, NodeId};
pub use stats::{FileType, Stats};
