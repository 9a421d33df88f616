//! The filesystem contract.
//!
//! [`FileSystem`] is the interface every backend satisfies. Each operation
//! comes in two forms:
//!
//! - a non-blocking `async fn` whose future resolves exactly once with the
//!   result or the error, and
//! - a blocking `*_sync` method.
//!
//! Backends implement a small primitive subset (`stat`, `open_file`,
//! `create_file`, `unlink`, `rmdir`, `mkdir`, `readdir`, and the link family
//! when [`FileSystem::supports_links`] is true). Everything else has a
//! default body composed from those primitives. Unimplemented primitives
//! answer `ENOTSUP`.
//!
//! Backends that only have blocking I/O implement the `*_sync` primitives
//! and are wrapped in [`Synchronous`], which derives the non-blocking half.

pub(crate) mod base;
mod synchronous;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::file::File;
use crate::flag::FileFlag;
use crate::path;
use crate::stats::{DEFAULT_FILE_MODE, Stats};

use base::{LinkWalk, OpenPlan};

pub use synchronous::Synchronous;

/// Static per-backend facts, queried once by composing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// No mutation is ever accepted.
    pub read_only: bool,
    /// `link`, `symlink` and `readlink` are implemented.
    pub links: bool,
    /// `chmod`, `chown` and `utimes` are implemented.
    pub props: bool,
    /// Blocking (`*_sync`) forms are implemented.
    pub synch: bool,
}

/// Space report for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiskSpace {
    /// Total bytes.
    pub total: u64,
    /// Free bytes.
    pub free: u64,
}

/// Core filesystem contract.
///
/// Paths are absolute virtual paths using `/`.
#[async_trait]
pub trait FileSystem: Send + Sync {
    // ========================================================================
    // Capabilities
    // ========================================================================

    /// Backend name.
    fn name(&self) -> &str;

    /// Returns true if this filesystem never accepts mutation.
    fn is_read_only(&self) -> bool;

    /// Returns true if the link family is implemented.
    fn supports_links(&self) -> bool {
        false
    }

    /// Returns true if chmod/chown/utimes are implemented.
    fn supports_props(&self) -> bool;

    /// Returns true if the blocking forms are implemented.
    fn supports_synch(&self) -> bool;

    /// All four capability flags.
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read_only: self.is_read_only(),
            links: self.supports_links(),
            props: self.supports_props(),
            synch: self.supports_synch(),
        }
    }

    /// Total and free space.
    fn disk_space(&self, path: &str) -> DiskSpace {
        let _ = path;
        DiskSpace::default()
    }

    // ========================================================================
    // Blocking primitives
    // ========================================================================

    /// Metadata for `path`, following links.
    fn stat_sync(&self, path: &str) -> FsResult<Stats> {
        Err(FsError::not_supported(path))
    }

    /// Metadata for `path` itself, not following a final link.
    fn lstat_sync(&self, path: &str) -> FsResult<Stats> {
        self.stat_sync(path)
    }

    /// Open an existing file.
    fn open_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Box<dyn File>> {
        let _ = flag;
        Err(FsError::not_supported(path))
    }

    /// Create a new, empty file and open it.
    fn create_file_sync(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        let _ = (flag, mode);
        Err(FsError::not_supported(path))
    }

    fn rename_sync(&self, from: &str, to: &str) -> FsResult<()> {
        let _ = to;
        Err(FsError::not_supported(from))
    }

    fn unlink_sync(&self, path: &str) -> FsResult<()> {
        Err(FsError::not_supported(path))
    }

    fn rmdir_sync(&self, path: &str) -> FsResult<()> {
        Err(FsError::not_supported(path))
    }

    fn mkdir_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        let _ = mode;
        Err(FsError::not_supported(path))
    }

    /// Names of the entries in a directory.
    fn readdir_sync(&self, path: &str) -> FsResult<Vec<String>> {
        Err(FsError::not_supported(path))
    }

    fn chmod_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        let _ = mode;
        Err(FsError::not_supported(path))
    }

    fn chown_sync(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        let _ = (uid, gid);
        Err(FsError::not_supported(path))
    }

    fn utimes_sync(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let _ = (atime, mtime);
        Err(FsError::not_supported(path))
    }

    /// Create a hard link `dst` to `src`.
    fn link_sync(&self, src: &str, dst: &str) -> FsResult<()> {
        let _ = src;
        Err(FsError::not_supported(dst))
    }

    /// Create a symlink at `dst` pointing to `src`.
    fn symlink_sync(&self, src: &str, dst: &str) -> FsResult<()> {
        let _ = src;
        Err(FsError::not_supported(dst))
    }

    fn readlink_sync(&self, path: &str) -> FsResult<String> {
        Err(FsError::not_supported(path))
    }

    // ========================================================================
    // Blocking compositions
    // ========================================================================

    /// Open `path` according to `flag`, creating it with `mode` if allowed.
    fn open_sync(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        let plan = base::plan_open(path, flag, self.stat_sync(path))?;
        tracing::debug!(path, %flag, ?plan, "open");
        match plan {
            OpenPlan::Existing { truncate } => {
                let mut fd = self.open_file_sync(path, flag)?;
                if truncate {
                    fd.truncate_sync(0)?;
                    fd.flush_sync()?;
                }
                Ok(fd)
            }
            OpenPlan::Create => {
                let parent = path::dirname(path);
                base::check_parent(&parent, self.stat_sync(&parent))?;
                self.create_file_sync(path, flag, mode)
            }
        }
    }

    fn exists_sync(&self, path: &str) -> bool {
        self.stat_sync(path).is_ok()
    }

    /// Canonical path with every symlink resolved.
    fn realpath_sync(&self, path: &str) -> FsResult<String> {
        if !self.supports_links() {
            return if self.exists_sync(path) {
                Ok(path::canonical(path))
            } else {
                Err(FsError::not_found(path))
            };
        }
        let mut walk = LinkWalk::new(path);
        while let Some(candidate) = walk.next_candidate() {
            if self.lstat_sync(&candidate)?.is_symlink() {
                let target = self.readlink_sync(&candidate)?;
                walk.follow(&candidate, &target)?;
            } else {
                walk.accept(candidate);
            }
        }
        Ok(walk.finish())
    }

    /// Resize the file at `path`.
    fn truncate_sync(&self, path: &str, len: u64) -> FsResult<()> {
        let mut fd = self.open_sync(path, FileFlag::ReadWrite, DEFAULT_FILE_MODE)?;
        let truncated = fd.truncate_sync(len);
        base::first_error(truncated, fd.close_sync())
    }

    /// Whole content of the file at `path`.
    fn read_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        base::require_readable(path, flag)?;
        let mut fd = self.open_sync(path, flag, DEFAULT_FILE_MODE)?;
        let data = read_whole_sync(fd.as_mut());
        base::first_error(data, fd.close_sync())
    }

    /// Replace the content of the file at `path`.
    fn write_file_sync(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        base::require_writeable(path, flag)?;
        let mut fd = self.open_sync(path, flag, mode)?;
        let written = fd.write_sync(data, Some(0)).map(|_| ());
        base::first_error(written, fd.close_sync())
    }

    /// Append to the file at `path`.
    fn append_file_sync(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        base::require_appendable(path, flag)?;
        let mut fd = self.open_sync(path, flag, mode)?;
        let written = fd.write_sync(data, None).map(|_| ());
        base::first_error(written, fd.close_sync())
    }

    // ========================================================================
    // Non-blocking primitives
    // ========================================================================

    async fn stat(&self, path: &str) -> FsResult<Stats> {
        Err(FsError::not_supported(path))
    }

    async fn lstat(&self, path: &str) -> FsResult<Stats> {
        self.stat(path).await
    }

    async fn open_file(&self, path: &str, flag: FileFlag) -> FsResult<Box<dyn File>> {
        let _ = flag;
        Err(FsError::not_supported(path))
    }

    async fn create_file(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        let _ = (flag, mode);
        Err(FsError::not_supported(path))
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let _ = to;
        Err(FsError::not_supported(from))
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        Err(FsError::not_supported(path))
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        Err(FsError::not_supported(path))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        let _ = mode;
        Err(FsError::not_supported(path))
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        Err(FsError::not_supported(path))
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        let _ = mode;
        Err(FsError::not_supported(path))
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        let _ = (uid, gid);
        Err(FsError::not_supported(path))
    }

    async fn utimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let _ = (atime, mtime);
        Err(FsError::not_supported(path))
    }

    async fn link(&self, src: &str, dst: &str) -> FsResult<()> {
        let _ = src;
        Err(FsError::not_supported(dst))
    }

    async fn symlink(&self, src: &str, dst: &str) -> FsResult<()> {
        let _ = src;
        Err(FsError::not_supported(dst))
    }

    async fn readlink(&self, path: &str) -> FsResult<String> {
        Err(FsError::not_supported(path))
    }

    // ========================================================================
    // Non-blocking compositions
    // ========================================================================

    async fn open(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        let plan = base::plan_open(path, flag, self.stat(path).await)?;
        tracing::debug!(path, %flag, ?plan, "open");
        match plan {
            OpenPlan::Existing { truncate } => {
                let mut fd = self.open_file(path, flag).await?;
                if truncate {
                    fd.truncate(0).await?;
                    fd.flush().await?;
                }
                Ok(fd)
            }
            OpenPlan::Create => {
                let parent = path::dirname(path);
                base::check_parent(&parent, self.stat(&parent).await)?;
                self.create_file(path, flag, mode).await
            }
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    async fn realpath(&self, path: &str) -> FsResult<String> {
        if !self.supports_links() {
            return if self.exists(path).await {
                Ok(path::canonical(path))
            } else {
                Err(FsError::not_found(path))
            };
        }
        let mut walk = LinkWalk::new(path);
        while let Some(candidate) = walk.next_candidate() {
            if self.lstat(&candidate).await?.is_symlink() {
                let target = self.readlink(&candidate).await?;
                walk.follow(&candidate, &target)?;
            } else {
                walk.accept(candidate);
            }
        }
        Ok(walk.finish())
    }

    async fn truncate(&self, path: &str, len: u64) -> FsResult<()> {
        let mut fd = self.open(path, FileFlag::ReadWrite, DEFAULT_FILE_MODE).await?;
        let truncated = fd.truncate(len).await;
        base::first_error(truncated, fd.close().await)
    }

    async fn read_file(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        base::require_readable(path, flag)?;
        let mut fd = self.open(path, flag, DEFAULT_FILE_MODE).await?;
        let data = read_whole(fd.as_mut()).await;
        base::first_error(data, fd.close().await)
    }

    async fn write_file(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        base::require_writeable(path, flag)?;
        let mut fd = self.open(path, flag, mode).await?;
        let written = fd.write(data, Some(0)).await.map(|_| ());
        base::first_error(written, fd.close().await)
    }

    async fn append_file(
        &self,
        path: &str,
        data: &[u8],
        flag: FileFlag,
        mode: u32,
    ) -> FsResult<()> {
        base::require_appendable(path, flag)?;
        let mut fd = self.open(path, flag, mode).await?;
        let written = fd.write(data, None).await.map(|_| ());
        base::first_error(written, fd.close().await)
    }
}

fn read_whole_sync(fd: &mut dyn File) -> FsResult<Vec<u8>> {
    let stats = fd.stat_sync()?;
    let mut buf = vec![0; base::content_len(fd.path(), &stats)?];
    let n = fd.read_sync(&mut buf, Some(0))?;
    buf.truncate(n);
    Ok(buf)
}

async fn read_whole(fd: &mut dyn File) -> FsResult<Vec<u8>> {
    let stats = fd.stat().await?;
    let mut buf = vec![0; base::content_len(fd.path(), &stats)?];
    let n = fd.read(&mut buf, Some(0)).await?;
    buf.truncate(n);
    Ok(buf)
}
