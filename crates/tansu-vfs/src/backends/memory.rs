//! In-memory filesystem backend.
//!
//! A writable store kept entirely in a [`FileIndex`]; file content lives in
//! each record's payload. Only the blocking forms are implemented, so wrap
//! it in [`Synchronous`](crate::fs::Synchronous) for the non-blocking half.
//! All data is lost when dropped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::file::{File, Persist, PreloadFile};
use crate::flag::FileFlag;
use crate::fs::FileSystem;
use crate::index::{FileIndex, Inode};
use crate::stats::Stats;

/// Shared state: the index, also the flush target of every open handle.
#[derive(Debug, Default)]
struct MemoryStore {
    index: RwLock<FileIndex>,
}

impl Persist for MemoryStore {
    fn persist_sync(&self, path: &str, data: &[u8], stats: &Stats) -> FsResult<()> {
        let mut index = self.index.write();
        match index.lookup_mut(path)? {
            Inode::File(record) => {
                record.set_contents(data.to_vec());
                record.mode = stats.mode;
                record.uid = stats.uid;
                record.gid = stats.gid;
                record.atime = stats.atime;
                record.mtime = stats.mtime;
                record.ctime = stats.ctime;
                Ok(())
            }
            Inode::Dir(_) => Err(FsError::is_a_directory(path)),
        }
    }
}

/// In-memory filesystem backend.
///
/// Cloning yields another view of the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFs {
    store: Arc<MemoryStore>,
}

impl InMemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filesystem over an existing index.
    ///
    /// Files without a payload read as empty.
    pub fn with_index(mut index: FileIndex) -> Self {
        index.for_each_file_mut(|stats| {
            if stats.file_data.is_none() {
                stats.set_contents(Vec::new());
            }
        });
        Self {
            store: Arc::new(MemoryStore {
                index: RwLock::new(index),
            }),
        }
    }

    fn handle(&self, path: &str, flag: FileFlag, record: &Stats) -> FsResult<Box<dyn File>> {
        let contents = record.file_data.clone().unwrap_or_default();
        let file = PreloadFile::new(self.store.clone(), path, flag, record.detached(), contents)?;
        Ok(Box::new(file))
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    fn name(&self) -> &str {
        "InMemory"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn supports_props(&self) -> bool {
        true
    }

    fn supports_synch(&self) -> bool {
        true
    }

    fn stat_sync(&self, path: &str) -> FsResult<Stats> {
        let index = self.store.index.read();
        Ok(index.lookup(path)?.stats().detached())
    }

    fn open_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Box<dyn File>> {
        let index = self.store.index.read();
        match index.lookup(path)? {
            Inode::File(record) => self.handle(path, flag, record),
            Inode::Dir(_) => Err(FsError::is_a_directory(path)),
        }
    }

    fn create_file_sync(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        let mut record = Stats::file(Some(0), mode);
        record.set_contents(Vec::new());
        self.store
            .index
            .write()
            .insert(path, Inode::File(record.clone()))?;
        tracing::debug!(path, mode, "created file");
        self.handle(path, flag, &record)
    }

    fn rename_sync(&self, from: &str, to: &str) -> FsResult<()> {
        self.store.index.write().rename(from, to)
    }

    fn unlink_sync(&self, path: &str) -> FsResult<()> {
        let mut index = self.store.index.write();
        if index.lookup(path)?.is_dir() {
            return Err(FsError::is_a_directory(path));
        }
        index.remove(path)?;
        Ok(())
    }

    fn rmdir_sync(&self, path: &str) -> FsResult<()> {
        let mut index = self.store.index.write();
        match index.lookup(path)? {
            Inode::Dir(dir) if !dir.is_empty() => return Err(FsError::not_empty(path)),
            Inode::Dir(_) => {}
            Inode::File(_) => return Err(FsError::not_a_directory(path)),
        }
        index.remove(path)?;
        Ok(())
    }

    fn mkdir_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        self.store.index.write().insert(path, Inode::directory(mode))?;
        Ok(())
    }

    fn readdir_sync(&self, path: &str) -> FsResult<Vec<String>> {
        self.store.index.read().ls(path)
    }

    fn chmod_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        self.store.index.write().lookup_mut(path)?.stats_mut().chmod(mode);
        Ok(())
    }

    fn chown_sync(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.store.index.write().lookup_mut(path)?.stats_mut().chown(uid, gid);
        Ok(())
    }

    fn utimes_sync(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.store
            .index
            .write()
            .lookup_mut(path)?
            .stats_mut()
            .utimes(atime, mtime);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::stats::DEFAULT_FILE_MODE;
    use std::time::Duration;

    #[test]
    fn test_write_and_read_file() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/hello.txt", b"Hello, World!", FileFlag::Write, DEFAULT_FILE_MODE)
            .unwrap();

        let data = fs.read_file_sync("/hello.txt", FileFlag::Read).unwrap();
        assert_eq!(data, b"Hello, World!");

        let stats = fs.stat_sync("/hello.txt").unwrap();
        assert!(stats.is_file());
        assert_eq!(stats.size, Some(13));
        assert!(stats.file_data.is_none());
    }

    #[test]
    fn test_append_file() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/log", b"one\n", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        fs.append_file_sync("/log", b"two\n", FileFlag::Append, DEFAULT_FILE_MODE).unwrap();
        assert_eq!(fs.read_file_sync("/log", FileFlag::Read).unwrap(), b"one\ntwo\n");

        let err = fs
            .append_file_sync("/log", b"x", FileFlag::Write, DEFAULT_FILE_MODE)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_mkdir_and_readdir() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/dir", 0o755).unwrap();
        fs.write_file_sync("/dir/b.txt", b"b", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        fs.write_file_sync("/dir/a.txt", b"a", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        fs.mkdir_sync("/dir/subdir", 0o755).unwrap();

        assert_eq!(fs.readdir_sync("/dir").unwrap(), vec!["b.txt", "a.txt", "subdir"]);
        assert_eq!(fs.mkdir_sync("/dir", 0o755).unwrap_err().code, ErrorCode::AlreadyExists);
        assert_eq!(fs.mkdir_sync("/x/y", 0o755).unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_rmdir_requires_empty_directory() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/dir", 0o755).unwrap();
        fs.write_file_sync("/dir/f", b"", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();

        assert_eq!(fs.rmdir_sync("/dir").unwrap_err().code, ErrorCode::NotEmpty);
        assert_eq!(fs.rmdir_sync("/dir/f").unwrap_err().code, ErrorCode::NotADirectory);
        assert_eq!(fs.unlink_sync("/dir").unwrap_err().code, ErrorCode::IsADirectory);

        fs.unlink_sync("/dir/f").unwrap();
        fs.rmdir_sync("/dir").unwrap();
        assert!(!fs.exists_sync("/dir"));
    }

    #[test]
    fn test_rename() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/old.txt", b"content", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        fs.rename_sync("/old.txt", "/new.txt").unwrap();

        assert!(!fs.exists_sync("/old.txt"));
        assert_eq!(fs.read_file_sync("/new.txt", FileFlag::Read).unwrap(), b"content");
    }

    #[test]
    fn test_truncate_by_path() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"Hello, World!", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        fs.truncate_sync("/f", 5).unwrap();
        assert_eq!(fs.read_file_sync("/f", FileFlag::Read).unwrap(), b"Hello");

        fs.truncate_sync("/f", 0).unwrap();
        assert_eq!(fs.stat_sync("/f").unwrap().size, Some(0));
        assert_eq!(fs.truncate_sync("/missing", 0).unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_open_flags_against_existing_file() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"abc", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();

        let err = fs.open_sync("/f", FileFlag::WriteExclusive, DEFAULT_FILE_MODE).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        let mut fd = fs.open_sync("/f", FileFlag::WriteRead, DEFAULT_FILE_MODE).unwrap();
        assert_eq!(fd.stat_sync().unwrap().size, Some(0));
        fd.close_sync().unwrap();
        assert_eq!(fs.stat_sync("/f").unwrap().size, Some(0));

        let err = fs.open_sync("/d", FileFlag::ReadWrite, DEFAULT_FILE_MODE).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_create_needs_directory_parent() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();

        let err = fs.open_sync("/f/child", FileFlag::Write, DEFAULT_FILE_MODE).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotADirectory);
        let err = fs.open_sync("/missing/child", FileFlag::Write, DEFAULT_FILE_MODE).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = fs.open_sync("/", FileFlag::Read, DEFAULT_FILE_MODE).unwrap_err();
        assert_eq!(err.code, ErrorCode::IsADirectory);
    }

    #[test]
    fn test_props() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"x", FileFlag::Write, 0o600).unwrap();
        assert_eq!(fs.stat_sync("/f").unwrap().mode, 0o600);

        fs.chmod_sync("/f", 0o640).unwrap();
        fs.chown_sync("/f", 1000, 100).unwrap();
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        fs.utimes_sync("/f", when, when).unwrap();

        let stats = fs.stat_sync("/f").unwrap();
        assert_eq!(stats.mode, 0o640);
        assert_eq!((stats.uid, stats.gid), (1000, 100));
        assert_eq!(stats.mtime, when);
    }

    #[test]
    fn test_handle_chmod_reaches_store() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"x", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        let mut fd = fs.open_sync("/f", FileFlag::Read, DEFAULT_FILE_MODE).unwrap();
        fd.chmod_sync(0o400).unwrap();
        fd.close_sync().unwrap();
        assert_eq!(fs.stat_sync("/f").unwrap().mode, 0o400);
    }

    #[test]
    fn test_stat_copy_does_not_alias_store() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/f", b"abc", FileFlag::Write, DEFAULT_FILE_MODE).unwrap();
        let mut copy = fs.stat_sync("/f").unwrap();
        copy.chmod(0o000);
        copy.size = Some(99);
        let stats = fs.stat_sync("/f").unwrap();
        assert_eq!(stats.mode, DEFAULT_FILE_MODE);
        assert_eq!(stats.size, Some(3));
    }

    #[test]
    fn test_with_index_seeds_empty_payloads() {
        let index = FileIndex::from_listing_str(r#"{"docs": {"a.md": null}}"#).unwrap();
        let fs = InMemoryFs::with_index(index);
        assert_eq!(fs.stat_sync("/docs/a.md").unwrap().size, Some(0));
        assert!(fs.read_file_sync("/docs/a.md", FileFlag::Read).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_half_needs_adapter() {
        let fs = InMemoryFs::new();
        assert!(fs.capabilities().synch);
        assert_eq!(fs.stat("/").await.unwrap_err().code, ErrorCode::NotSupported);

        let fs = crate::fs::Synchronous::new(fs);
        assert!(fs.stat("/").await.unwrap().is_directory());
    }
}
