//! Open file handles.
//!
//! A handle is the caller's private, exclusively owned view of an open file.
//! Every operation exists in a non-blocking form (`async fn`) and a blocking
//! form (`*_sync`). The async defaults simply run the blocking form, which is
//! right for handles whose state lives in memory; handles that talk to a
//! backend override the async side.

mod preload;

use async_trait::async_trait;
use std::fmt;
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::flag::FileFlag;
use crate::stats::Stats;

pub use preload::{FileBuffer, NoSyncFile, PreloadFile};

/// Handle operations.
#[async_trait]
pub trait File: fmt::Debug + Send + Sync {
    /// Virtual path the handle was opened with.
    fn path(&self) -> &str;

    /// Mode the handle was opened with.
    fn flag(&self) -> FileFlag;

    /// Current cursor position. Append-mode handles report the size.
    fn pos(&self) -> u64;

    /// Move the cursor.
    fn seek(&mut self, pos: u64) -> FsResult<()>;

    /// Metadata snapshot.
    fn stat_sync(&self) -> FsResult<Stats>;

    /// Read into `buf` from `position`, or from the cursor when `None`.
    ///
    /// Returns the number of bytes copied, which is short at end of content.
    /// Only a cursor read advances the cursor.
    fn read_sync(&mut self, buf: &mut [u8], position: Option<u64>) -> FsResult<usize>;

    /// Write `data` at `position`, or at the cursor when `None`.
    fn write_sync(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize>;

    /// Shrink or zero-extend the content to exactly `len` bytes.
    fn truncate_sync(&mut self, len: u64) -> FsResult<()>;

    /// Push buffered changes to the backing store.
    fn flush_sync(&mut self) -> FsResult<()> {
        Err(FsError::not_supported(self.path()))
    }

    /// Flush if needed and release the handle. Closing twice is a no-op.
    fn close_sync(&mut self) -> FsResult<()>;

    fn chmod_sync(&mut self, mode: u32) -> FsResult<()> {
        let _ = mode;
        Err(FsError::not_supported(self.path()))
    }

    fn chown_sync(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        let _ = (uid, gid);
        Err(FsError::not_supported(self.path()))
    }

    fn utimes_sync(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let _ = (atime, mtime);
        Err(FsError::not_supported(self.path()))
    }

    async fn stat(&self) -> FsResult<Stats> {
        self.stat_sync()
    }

    async fn read(&mut self, buf: &mut [u8], position: Option<u64>) -> FsResult<usize> {
        self.read_sync(buf, position)
    }

    async fn write(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        self.write_sync(data, position)
    }

    async fn truncate(&mut self, len: u64) -> FsResult<()> {
        self.truncate_sync(len)
    }

    async fn flush(&mut self) -> FsResult<()> {
        self.flush_sync()
    }

    async fn close(&mut self) -> FsResult<()> {
        self.close_sync()
    }

    async fn chmod(&mut self, mode: u32) -> FsResult<()> {
        self.chmod_sync(mode)
    }

    async fn chown(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        self.chown_sync(uid, gid)
    }

    async fn utimes(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.utimes_sync(atime, mtime)
    }
}

/// Where a [`PreloadFile`] sends its content on flush.
///
/// Backends implement whichever side they support natively; the async
/// default runs the blocking form.
#[async_trait]
pub trait Persist: Send + Sync {
    /// Store `data` and `stats` for `path`, blocking.
    fn persist_sync(&self, path: &str, data: &[u8], stats: &Stats) -> FsResult<()> {
        let _ = (data, stats);
        Err(FsError::not_supported(path))
    }

    /// Store `data` and `stats` for `path`.
    async fn persist(&self, path: &str, data: &[u8], stats: &Stats) -> FsResult<()> {
        self.persist_sync(path, data, stats)
    }
}
