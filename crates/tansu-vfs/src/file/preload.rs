//! Buffered file handles.
//!
//! Both handle types load the whole file into a private buffer at open time
//! and answer reads, writes and truncation from memory.
//!
//! - [`PreloadFile`] pushes dirty content to a [`Persist`] target on flush
//!   and on close.
//! - [`NoSyncFile`] never pushes anything back. It serves read-only or
//!   already-persisted sources; writes are accepted into the buffer when the
//!   flag permits them and are lost on close.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

use super::{File, Persist};
use crate::error::{FsError, FsResult};
use crate::flag::FileFlag;
use crate::stats::Stats;

/// Shared in-memory state of a buffered handle.
#[derive(Debug)]
pub struct FileBuffer {
    path: String,
    flag: FileFlag,
    stats: Stats,
    /// `None` once the handle is closed.
    buffer: Option<Vec<u8>>,
    pos: u64,
    dirty: bool,
}

impl FileBuffer {
    /// Wrap `contents` for `path`.
    ///
    /// A known size in `stats` must match the buffer for readable flags.
    pub fn new(
        path: impl Into<String>,
        flag: FileFlag,
        mut stats: Stats,
        contents: Vec<u8>,
    ) -> FsResult<Self> {
        let path = path.into();
        let len = contents.len() as u64;
        match stats.size {
            Some(size) if size != len && flag.is_readable() => {
                return Err(FsError::invalid_argument(
                    path,
                    format!("Invalid buffer: buffer is {len} long, yet stats specify {size}."),
                ));
            }
            _ => stats.size = Some(len),
        }
        stats.file_data = None;
        Ok(Self {
            path,
            flag,
            stats,
            buffer: Some(contents),
            pos: 0,
            dirty: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flag(&self) -> FileFlag {
        self.flag
    }

    /// Metadata snapshot, including unsynced size changes.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// True if the buffer holds changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_none()
    }

    /// Current content.
    pub fn contents(&self) -> FsResult<&[u8]> {
        self.buffer
            .as_deref()
            .ok_or_else(|| FsError::bad_descriptor(&self.path))
    }

    pub fn pos(&self) -> u64 {
        if self.flag.is_appendable() {
            self.stats.size.unwrap_or(0)
        } else {
            self.pos
        }
    }

    pub fn seek(&mut self, pos: u64) -> FsResult<()> {
        self.ensure_open()?;
        self.pos = pos;
        Ok(())
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.buffer.is_none() {
            return Err(FsError::bad_descriptor(&self.path));
        }
        Ok(())
    }

    fn ensure_writeable(&self) -> FsResult<()> {
        self.ensure_open()?;
        if !self.flag.is_writeable() {
            return Err(FsError::permission_denied(
                &self.path,
                "File not opened with a writeable mode.",
            ));
        }
        Ok(())
    }

    /// Offsets and lengths are bounded by the largest possible allocation.
    fn index(&self, offset: u64) -> FsResult<usize> {
        usize::try_from(offset)
            .ok()
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| {
                FsError::invalid_argument(&self.path, format!("offset {offset} out of range"))
            })
    }

    /// Copy from the buffer into `buf`.
    pub fn read(&mut self, buf: &mut [u8], position: Option<u64>) -> FsResult<usize> {
        self.ensure_open()?;
        if !self.flag.is_readable() {
            return Err(FsError::permission_denied(
                &self.path,
                "File not opened with a readable mode.",
            ));
        }
        let start = position.unwrap_or_else(|| self.pos());
        let data = self.contents()?;
        let copied = match usize::try_from(start) {
            Ok(start) if start < data.len() => {
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                n
            }
            _ => 0,
        };
        self.stats.atime = SystemTime::now();
        if position.is_none() {
            self.pos = start + copied as u64;
        }
        Ok(copied)
    }

    /// Copy `data` into the buffer, growing it with zeroes as needed.
    pub fn write(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        self.ensure_writeable()?;
        let start = position.unwrap_or_else(|| self.pos());
        let from = self.index(start)?;
        let to = from
            .checked_add(data.len())
            .filter(|&n| n <= isize::MAX as usize)
            .ok_or_else(|| FsError::invalid_argument(&self.path, "write past addressable range"))?;

        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| FsError::bad_descriptor(&self.path))?;
        if to > buffer.len() {
            grow(&self.path, buffer, to)?;
        }
        buffer[from..to].copy_from_slice(data);
        self.stats.size = Some(buffer.len() as u64);
        self.stats.mtime = SystemTime::now();
        self.dirty = true;
        if position.is_none() {
            self.pos = start + data.len() as u64;
        }
        Ok(data.len())
    }

    /// Resize to exactly `len` bytes. The cursor is left where it was.
    pub fn truncate(&mut self, len: u64) -> FsResult<()> {
        self.ensure_writeable()?;
        let new_len = self.index(len)?;
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| FsError::bad_descriptor(&self.path))?;
        if new_len > buffer.len() {
            grow(&self.path, buffer, new_len)?;
        } else {
            buffer.truncate(new_len);
        }
        self.stats.size = Some(len);
        self.stats.mtime = SystemTime::now();
        self.dirty = true;
        Ok(())
    }

    /// Value copy of the metadata snapshot.
    pub fn stat(&self) -> FsResult<Stats> {
        self.ensure_open()?;
        Ok(self.stats.clone())
    }

    pub fn chmod(&mut self, mode: u32) -> FsResult<()> {
        self.ensure_open()?;
        self.stats.chmod(mode);
        self.dirty = true;
        Ok(())
    }

    pub fn chown(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        self.ensure_open()?;
        self.stats.chown(uid, gid);
        self.dirty = true;
        Ok(())
    }

    pub fn utimes(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.ensure_open()?;
        self.stats.utimes(atime, mtime);
        self.dirty = true;
        Ok(())
    }

    /// Record a successful flush.
    fn mark_synced(&mut self) {
        if let Some(buffer) = &self.buffer {
            self.stats.size = Some(buffer.len() as u64);
        }
        self.stats.mtime = SystemTime::now();
        self.dirty = false;
    }

    /// Drop the buffer. Returns false if it was already released.
    fn release(&mut self) -> bool {
        self.buffer.take().is_some()
    }
}

/// Zero-extend `buffer` to `len` bytes, reporting allocation failure as EIO.
fn grow(path: &str, buffer: &mut Vec<u8>, len: usize) -> FsResult<()> {
    buffer
        .try_reserve_exact(len - buffer.len())
        .map_err(|e| FsError::io(path, format!("cannot grow buffer to {len} bytes: {e}")))?;
    buffer.resize(len, 0);
    Ok(())
}

/// Buffered handle that flushes to a backend.
pub struct PreloadFile<P: ?Sized> {
    inner: FileBuffer,
    target: Arc<P>,
}

impl<P: Persist + ?Sized + 'static> PreloadFile<P> {
    pub fn new(
        target: Arc<P>,
        path: impl Into<String>,
        flag: FileFlag,
        stats: Stats,
        contents: Vec<u8>,
    ) -> FsResult<Self> {
        Ok(Self {
            inner: FileBuffer::new(path, flag, stats, contents)?,
            target,
        })
    }

    /// Buffered state.
    pub fn buffer(&self) -> &FileBuffer {
        &self.inner
    }

    fn sync_after_mutation(&mut self) -> FsResult<()> {
        if self.inner.flag.is_synchronous() {
            self.flush_sync()?;
        }
        Ok(())
    }
}

impl<P: ?Sized> std::fmt::Debug for PreloadFile<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadFile")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: Persist + ?Sized + 'static> File for PreloadFile<P> {
    fn path(&self) -> &str {
        self.inner.path()
    }

    fn flag(&self) -> FileFlag {
        self.inner.flag()
    }

    fn pos(&self) -> u64 {
        self.inner.pos()
    }

    fn seek(&mut self, pos: u64) -> FsResult<()> {
        self.inner.seek(pos)
    }

    fn stat_sync(&self) -> FsResult<Stats> {
        self.inner.stat()
    }

    fn read_sync(&mut self, buf: &mut [u8], position: Option<u64>) -> FsResult<usize> {
        self.inner.read(buf, position)
    }

    fn write_sync(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        let written = self.inner.write(data, position)?;
        self.sync_after_mutation()?;
        Ok(written)
    }

    fn truncate_sync(&mut self, len: u64) -> FsResult<()> {
        self.inner.truncate(len)?;
        self.sync_after_mutation()
    }

    fn flush_sync(&mut self) -> FsResult<()> {
        self.inner.ensure_open()?;
        if !self.inner.dirty {
            return Ok(());
        }
        let data = self.inner.contents()?;
        self.target.persist_sync(&self.inner.path, data, &self.inner.stats)?;
        tracing::trace!(path = %self.inner.path, bytes = data.len(), "flushed handle");
        self.inner.mark_synced();
        Ok(())
    }

    fn close_sync(&mut self) -> FsResult<()> {
        if self.inner.is_closed() {
            return Ok(());
        }
        if let Err(e) = self.flush_sync() {
            tracing::warn!(path = %self.inner.path, "final flush failed on close: {e}");
            return Err(e);
        }
        self.inner.release();
        Ok(())
    }

    fn chmod_sync(&mut self, mode: u32) -> FsResult<()> {
        self.inner.chmod(mode)?;
        self.flush_sync()
    }

    fn chown_sync(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        self.inner.chown(uid, gid)?;
        self.flush_sync()
    }

    fn utimes_sync(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.inner.utimes(atime, mtime)?;
        self.flush_sync()
    }

    async fn write(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        let written = self.inner.write(data, position)?;
        if self.inner.flag.is_synchronous() {
            self.flush().await?;
        }
        Ok(written)
    }

    async fn truncate(&mut self, len: u64) -> FsResult<()> {
        self.inner.truncate(len)?;
        if self.inner.flag.is_synchronous() {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> FsResult<()> {
        self.inner.ensure_open()?;
        if !self.inner.dirty {
            return Ok(());
        }
        let data = self.inner.contents()?;
        self.target
            .persist(&self.inner.path, data, &self.inner.stats)
            .await?;
        tracing::trace!(path = %self.inner.path, bytes = data.len(), "flushed handle");
        self.inner.mark_synced();
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.inner.is_closed() {
            return Ok(());
        }
        if let Err(e) = self.flush().await {
            tracing::warn!(path = %self.inner.path, "final flush failed on close: {e}");
            return Err(e);
        }
        self.inner.release();
        Ok(())
    }

    async fn chmod(&mut self, mode: u32) -> FsResult<()> {
        self.inner.chmod(mode)?;
        self.flush().await
    }

    async fn chown(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        self.inner.chown(uid, gid)?;
        self.flush().await
    }

    async fn utimes(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.inner.utimes(atime, mtime)?;
        self.flush().await
    }
}

/// Buffered handle whose flush and close never reach a backend.
#[derive(Debug)]
pub struct NoSyncFile {
    inner: FileBuffer,
}

impl NoSyncFile {
    pub fn new(
        path: impl Into<String>,
        flag: FileFlag,
        stats: Stats,
        contents: Vec<u8>,
    ) -> FsResult<Self> {
        Ok(Self {
            inner: FileBuffer::new(path, flag, stats, contents)?,
        })
    }

    /// Buffered state.
    pub fn buffer(&self) -> &FileBuffer {
        &self.inner
    }

    /// Consume the handle, returning its content unless already closed.
    pub fn into_contents(mut self) -> Option<Vec<u8>> {
        self.inner.buffer.take()
    }
}

#[async_trait]
impl File for NoSyncFile {
    fn path(&self) -> &str {
        self.inner.path()
    }

    fn flag(&self) -> FileFlag {
        self.inner.flag()
    }

    fn pos(&self) -> u64 {
        self.inner.pos()
    }

    fn seek(&mut self, pos: u64) -> FsResult<()> {
        self.inner.seek(pos)
    }

    fn stat_sync(&self) -> FsResult<Stats> {
        self.inner.stat()
    }

    fn read_sync(&mut self, buf: &mut [u8], position: Option<u64>) -> FsResult<usize> {
        self.inner.read(buf, position)
    }

    fn write_sync(&mut self, data: &[u8], position: Option<u64>) -> FsResult<usize> {
        self.inner.write(data, position)
    }

    fn truncate_sync(&mut self, len: u64) -> FsResult<()> {
        self.inner.truncate(len)
    }

    fn flush_sync(&mut self) -> FsResult<()> {
        Ok(())
    }

    fn close_sync(&mut self) -> FsResult<()> {
        self.inner.release();
        Ok(())
    }

    fn chmod_sync(&mut self, mode: u32) -> FsResult<()> {
        self.inner.chmod(mode)
    }

    fn chown_sync(&mut self, uid: u32, gid: u32) -> FsResult<()> {
        self.inner.chown(uid, gid)
    }

    fn utimes_sync(&mut self, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.inner.utimes(atime, mtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use parking_lot::Mutex;

    /// Records every persisted payload.
    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Persist for Recorder {
        fn persist_sync(&self, path: &str, data: &[u8], _stats: &Stats) -> FsResult<()> {
            self.writes.lock().push((path.to_string(), data.to_vec()));
            Ok(())
        }
    }

    fn preload(flag: FileFlag, contents: &[u8]) -> (Arc<Recorder>, PreloadFile<Recorder>) {
        let target = Arc::new(Recorder::default());
        let stats = Stats::file(Some(contents.len() as u64), 0o644);
        let file = PreloadFile::new(target.clone(), "/f", flag, stats, contents.to_vec()).unwrap();
        (target, file)
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (_, mut file) = preload(FileFlag::WriteRead, b"");
        assert_eq!(file.write_sync(b"hello", Some(0)).unwrap(), 5);
        let mut out = [0u8; 5];
        assert_eq!(file.read_sync(&mut out, Some(0)).unwrap(), 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn test_short_read_at_end() {
        let (_, mut file) = preload(FileFlag::Read, b"abc");
        let mut out = [0u8; 10];
        assert_eq!(file.read_sync(&mut out, Some(1)).unwrap(), 2);
        assert_eq!(&out[..2], b"bc");
        assert_eq!(file.read_sync(&mut out, Some(3)).unwrap(), 0);
        assert_eq!(file.read_sync(&mut out, Some(100)).unwrap(), 0);
    }

    #[test]
    fn test_cursor_moves_only_without_position() {
        let (_, mut file) = preload(FileFlag::Read, b"abcdef");
        let mut out = [0u8; 2];
        file.read_sync(&mut out, Some(3)).unwrap();
        assert_eq!(file.pos(), 0);

        file.read_sync(&mut out, None).unwrap();
        assert_eq!(&out, b"ab");
        file.read_sync(&mut out, None).unwrap();
        assert_eq!(&out, b"cd");
        assert_eq!(file.pos(), 4);

        file.seek(1).unwrap();
        file.read_sync(&mut out, None).unwrap();
        assert_eq!(&out, b"bc");
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let (_, mut file) = preload(FileFlag::ReadWrite, b"ab");
        file.write_sync(b"z", Some(5)).unwrap();
        assert_eq!(file.buffer().contents().unwrap(), b"ab\0\0\0z");
        assert_eq!(file.stat_sync().unwrap().size, Some(6));
    }

    #[test]
    fn test_truncate_shrinks_and_extends() {
        let (_, mut file) = preload(FileFlag::ReadWrite, b"hello world");
        file.seek(8).unwrap();
        file.truncate_sync(5).unwrap();
        assert_eq!(file.pos(), 8);

        let mut out = [0u8; 4];
        assert_eq!(file.read_sync(&mut out, Some(5)).unwrap(), 0);
        assert_eq!(file.read_sync(&mut out, None).unwrap(), 0);

        file.truncate_sync(7).unwrap();
        assert_eq!(file.buffer().contents().unwrap(), b"hello\0\0");
    }

    #[test]
    fn test_read_only_handle_rejects_mutation() {
        let (_, mut file) = preload(FileFlag::Read, b"abc");
        assert_eq!(file.write_sync(b"x", None).unwrap_err().code, ErrorCode::PermissionDenied);
        assert_eq!(file.truncate_sync(0).unwrap_err().code, ErrorCode::PermissionDenied);
        assert!(!file.buffer().is_dirty());
    }

    #[test]
    fn test_write_only_handle_rejects_reads() {
        let (_, mut file) = preload(FileFlag::Append, b"abc");
        let mut out = [0u8; 1];
        assert_eq!(file.read_sync(&mut out, Some(0)).unwrap_err().code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_append_writes_at_end() {
        let (target, mut file) = preload(FileFlag::AppendRead, b"abc");
        assert_eq!(file.pos(), 3);
        file.write_sync(b"de", None).unwrap();
        file.write_sync(b"f", None).unwrap();
        file.close_sync().unwrap();
        assert_eq!(target.writes.lock()[0].1, b"abcdef");
    }

    #[test]
    fn test_close_flushes_once_when_dirty() {
        let (target, mut file) = preload(FileFlag::ReadWrite, b"abc");
        file.close_sync().unwrap();
        assert!(target.writes.lock().is_empty());

        let (target, mut file) = preload(FileFlag::ReadWrite, b"abc");
        file.write_sync(b"X", Some(0)).unwrap();
        file.close_sync().unwrap();
        file.close_sync().unwrap();
        let writes = target.writes.lock();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], ("/f".to_string(), b"Xbc".to_vec()));
    }

    #[test]
    fn test_flush_clears_dirty() {
        let (target, mut file) = preload(FileFlag::ReadWrite, b"");
        file.write_sync(b"abc", None).unwrap();
        assert!(file.buffer().is_dirty());
        file.flush_sync().unwrap();
        assert!(!file.buffer().is_dirty());
        assert_eq!(file.stat_sync().unwrap().size, Some(3));
        file.flush_sync().unwrap();
        assert_eq!(target.writes.lock().len(), 1);
    }

    #[test]
    fn test_synchronous_flag_flushes_every_write() {
        let (target, mut file) = preload(FileFlag::ReadWriteSync, b"");
        file.write_sync(b"a", None).unwrap();
        file.write_sync(b"b", None).unwrap();
        assert_eq!(target.writes.lock().len(), 2);
        assert!(!file.buffer().is_dirty());
    }

    #[test]
    fn test_closed_handle_is_bad_descriptor() {
        let (_, mut file) = preload(FileFlag::ReadWrite, b"abc");
        file.close_sync().unwrap();
        let mut out = [0u8; 1];
        assert_eq!(file.read_sync(&mut out, Some(0)).unwrap_err().code, ErrorCode::BadDescriptor);
        assert_eq!(file.write_sync(b"x", None).unwrap_err().code, ErrorCode::BadDescriptor);
        assert_eq!(file.stat_sync().unwrap_err().code, ErrorCode::BadDescriptor);
    }

    #[test]
    fn test_chmod_persists_snapshot() {
        let (target, mut file) = preload(FileFlag::Read, b"abc");
        file.chmod_sync(0o600).unwrap();
        assert_eq!(file.stat_sync().unwrap().mode, 0o600);
        assert_eq!(target.writes.lock().len(), 1);
    }

    #[test]
    fn test_size_mismatch_rejected_for_readable_flags() {
        let stats = Stats::file(Some(10), 0o644);
        let err = NoSyncFile::new("/f", FileFlag::Read, stats.clone(), b"abc".to_vec()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);

        let file = NoSyncFile::new("/f", FileFlag::Write, stats, b"abc".to_vec()).unwrap();
        assert_eq!(file.stat_sync().unwrap().size, Some(3));
    }

    #[test]
    fn test_unknown_size_filled_from_buffer() {
        let file = NoSyncFile::new("/f", FileFlag::Read, Stats::file(None, 0o555), b"abcd".to_vec())
            .unwrap();
        assert_eq!(file.stat_sync().unwrap().size, Some(4));
    }

    #[test]
    fn test_no_sync_accepts_writes_but_never_persists() {
        let stats = Stats::file(Some(3), 0o644);
        let mut file = NoSyncFile::new("/f", FileFlag::ReadWrite, stats, b"abc".to_vec()).unwrap();
        file.write_sync(b"XY", Some(1)).unwrap();
        file.flush_sync().unwrap();
        assert!(file.buffer().is_dirty());
        assert_eq!(file.buffer().contents().unwrap(), b"aXY");
        file.close_sync().unwrap();
        file.close_sync().unwrap();
        assert!(file.into_contents().is_none());
    }

    #[test]
    fn test_out_of_range_offsets_are_rejected() {
        let (_, mut file) = preload(FileFlag::ReadWrite, b"abc");
        assert_eq!(file.truncate_sync(u64::MAX).unwrap_err().code, ErrorCode::InvalidArgument);
        let err = file.write_sync(b"", Some(u64::MAX)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        let err = file.write_sync(b"xy", Some(isize::MAX as u64)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(file.buffer().contents().unwrap(), b"abc");
        assert!(!file.buffer().is_dirty());
    }

    #[test]
    fn test_unallocatable_growth_is_io_error() {
        let stats = Stats::file(Some(3), 0o644);
        let mut file = NoSyncFile::new("/f", FileFlag::ReadWrite, stats, b"abc".to_vec()).unwrap();
        assert_eq!(file.truncate_sync(1 << 62).unwrap_err().code, ErrorCode::Io);
        assert_eq!(file.write_sync(b"z", Some(1 << 62)).unwrap_err().code, ErrorCode::Io);
        assert_eq!(file.stat_sync().unwrap().size, Some(3));
        assert_eq!(file.buffer().contents().unwrap(), b"abc");
    }

    #[test]
    fn test_stat_snapshot_is_a_copy() {
        let (_, file) = preload(FileFlag::Read, b"abc");
        let mut snapshot = file.stat_sync().unwrap();
        snapshot.chmod(0o000);
        assert_eq!(file.stat_sync().unwrap().mode, 0o644);
    }

    #[tokio::test]
    async fn test_async_close_flushes() {
        let (target, mut file) = preload(FileFlag::WriteRead, b"");
        file.write(b"async", None).await.unwrap();
        file.close().await.unwrap();
        assert_eq!(target.writes.lock()[0].1, b"async");
    }
}
