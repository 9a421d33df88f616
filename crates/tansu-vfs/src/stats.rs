//! File metadata.
//!
//! [`Stats`] is the cross-backend metadata surface. Backends hand callers
//! value copies; the authoritative record stays with the backend or the
//! inode index and is only mutated there.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::SystemTime;

use crate::error::FsResult;

/// Default permissions for new files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Default permissions for new directories.
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Permissions given to entries materialized from a static listing.
pub const LISTING_MODE: u32 = 0o555;

/// Size reported for directories.
pub const DIRECTORY_SIZE: u64 = 4096;

/// Preferred I/O block size.
pub const BLOCK_SIZE: u32 = 4096;

const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
const S_IFMT: u32 = 0o170000;
const PERM_MASK: u32 = 0o7777;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    /// The `S_IFMT` bits for this type.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
            FileType::Symlink => S_IFLNK,
        }
    }

    /// Decode the type from a full `st_mode` value.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & S_IFMT {
            S_IFREG => Some(FileType::File),
            S_IFDIR => Some(FileType::Directory),
            S_IFLNK => Some(FileType::Symlink),
            _ => None,
        }
    }
}

/// Metadata for one filesystem entry.
///
/// `size` is `None` until the owning backend has resolved it; once resolved
/// it stays `Some` for the life of the record.
///
/// `file_data` is a payload cache for listing-based backends. It is never
/// serialized and [`Stats::detached`] strips it before metadata leaves the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Entry type.
    pub kind: FileType,
    /// Permission bits (e.g., 0o644), without type bits.
    pub mode: u32,
    /// Size in bytes, `None` when not yet known.
    pub size: Option<u64>,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last status change time.
    pub ctime: SystemTime,
    /// Cached content, if the backend has fetched it.
    #[serde(skip)]
    pub file_data: Option<Vec<u8>>,
}

impl Stats {
    fn with_kind(kind: FileType, size: Option<u64>, mode: u32) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            mode: mode & PERM_MASK,
            size,
            uid: 0,
            gid: 0,
            nlink: if kind.is_dir() { 2 } else { 1 },
            atime: now,
            mtime: now,
            ctime: now,
            file_data: None,
        }
    }

    /// Create metadata for a regular file.
    pub fn file(size: Option<u64>, mode: u32) -> Self {
        Self::with_kind(FileType::File, size, mode)
    }

    /// Create metadata for a directory.
    pub fn directory(mode: u32) -> Self {
        Self::with_kind(FileType::Directory, Some(DIRECTORY_SIZE), mode)
    }

    /// Create metadata for a symlink.
    pub fn symlink(target_len: u64) -> Self {
        Self::with_kind(FileType::Symlink, Some(target_len), 0o777)
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    /// Full `st_mode`: type bits plus permissions.
    pub fn st_mode(&self) -> u32 {
        self.kind.mode_bits() | self.mode
    }

    /// Number of 512-byte blocks, zero while the size is unknown.
    pub fn blocks(&self) -> u64 {
        self.size.map(|s| s.div_ceil(512)).unwrap_or(0)
    }

    /// Preferred I/O block size.
    pub fn blksize(&self) -> u32 {
        BLOCK_SIZE
    }

    /// Replace the permission bits, keeping the entry type.
    pub fn chmod(&mut self, mode: u32) {
        self.mode = mode & PERM_MASK;
        self.ctime = SystemTime::now();
    }

    /// Change ownership.
    pub fn chown(&mut self, uid: u32, gid: u32) {
        self.uid = uid;
        self.gid = gid;
        self.ctime = SystemTime::now();
    }

    /// Set access and modification times.
    pub fn utimes(&mut self, atime: SystemTime, mtime: SystemTime) {
        self.atime = atime;
        self.mtime = mtime;
        self.ctime = SystemTime::now();
    }

    /// Value copy without the cached payload.
    pub fn detached(&self) -> Self {
        Self {
            file_data: None,
            ..self.clone()
        }
    }

    /// Store fetched content and the size it implies.
    pub fn set_contents(&mut self, data: Vec<u8>) {
        self.size = Some(data.len() as u64);
        self.file_data = Some(data);
    }

    /// Resolve the size, querying `fetch` only when it is still unknown.
    pub fn resolve_size(&mut self, fetch: impl FnOnce() -> FsResult<u64>) -> FsResult<u64> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let size = fetch()?;
        self.size = Some(size);
        Ok(size)
    }

    /// Async counterpart of [`Stats::resolve_size`].
    pub async fn resolve_size_async<F, Fut>(&mut self, fetch: F) -> FsResult<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FsResult<u64>>,
    {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let size = fetch().await?;
        self.size = Some(size);
        Ok(size)
    }
}
