//! Non-blocking forms for blocking-only backends.

use async_trait::async_trait;
use std::time::SystemTime;

use super::{DiskSpace, FileSystem};
use crate::error::FsResult;
use crate::file::File;
use crate::flag::FileFlag;
use crate::stats::Stats;

/// Wraps a backend that implements only the `*_sync` methods.
///
/// Every non-blocking operation runs the wrapped backend's blocking form and
/// resolves with its outcome, so compositions the backend overrides (a
/// custom `open_sync`, say) are honoured on both sides.
#[derive(Debug, Clone, Default)]
pub struct Synchronous<B> {
    inner: B,
}

impl<B: FileSystem> Synchronous<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[async_trait]
impl<B: FileSystem> FileSystem for Synchronous<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn supports_links(&self) -> bool {
        self.inner.supports_links()
    }

    fn supports_props(&self) -> bool {
        self.inner.supports_props()
    }

    fn supports_synch(&self) -> bool {
        true
    }

    fn disk_space(&self, path: &str) -> DiskSpace {
        self.inner.disk_space(path)
    }

    // ------------------------------------------------------------------------
    // Blocking side: straight delegation
    // ------------------------------------------------------------------------

    fn stat_sync(&self, path: &str) -> FsResult<Stats> {
        self.inner.stat_sync(path)
    }

    fn lstat_sync(&self, path: &str) -> FsResult<Stats> {
        self.inner.lstat_sync(path)
    }

    fn open_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Box<dyn File>> {
        self.inner.open_file_sync(path, flag)
    }

    fn create_file_sync(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        self.inner.create_file_sync(path, flag, mode)
    }

    fn rename_sync(&self, from: &str, to: &str) -> FsResult<()> {
        self.inner.rename_sync(from, to)
    }

    fn unlink_sync(&self, path: &str) -> FsResult<()> {
        self.inner.unlink_sync(path)
    }

    fn rmdir_sync(&self, path: &str) -> FsResult<()> {
        self.inner.rmdir_sync(path)
    }

    fn mkdir_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner.mkdir_sync(path, mode)
    }

    fn readdir_sync(&self, path: &str) -> FsResult<Vec<String>> {
        self.inner.readdir_sync(path)
    }

    fn chmod_sync(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner.chmod_sync(path, mode)
    }

    fn chown_sync(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.inner.chown_sync(path, uid, gid)
    }

    fn utimes_sync(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.inner.utimes_sync(path, atime, mtime)
    }

    fn link_sync(&self, src: &str, dst: &str) -> FsResult<()> {
        self.inner.link_sync(src, dst)
    }

    fn symlink_sync(&self, src: &str, dst: &str) -> FsResult<()> {
        self.inner.symlink_sync(src, dst)
    }

    fn readlink_sync(&self, path: &str) -> FsResult<String> {
        self.inner.readlink_sync(path)
    }

    fn open_sync(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        self.inner.open_sync(path, flag, mode)
    }

    fn exists_sync(&self, path: &str) -> bool {
        self.inner.exists_sync(path)
    }

    fn realpath_sync(&self, path: &str) -> FsResult<String> {
        self.inner.realpath_sync(path)
    }

    fn truncate_sync(&self, path: &str, len: u64) -> FsResult<()> {
        self.inner.truncate_sync(path, len)
    }

    fn read_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        self.inner.read_file_sync(path, flag)
    }

    fn write_file_sync(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        self.inner.write_file_sync(path, data, flag, mode)
    }

    fn append_file_sync(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        self.inner.append_file_sync(path, data, flag, mode)
    }

    // ------------------------------------------------------------------------
    // Non-blocking side: run the blocking form
    // ------------------------------------------------------------------------

    async fn stat(&self, path: &str) -> FsResult<Stats> {
        self.inner.stat_sync(path)
    }

    async fn lstat(&self, path: &str) -> FsResult<Stats> {
        self.inner.lstat_sync(path)
    }

    async fn open_file(&self, path: &str, flag: FileFlag) -> FsResult<Box<dyn File>> {
        self.inner.open_file_sync(path, flag)
    }

    async fn create_file(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        self.inner.create_file_sync(path, flag, mode)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        self.inner.rename_sync(from, to)
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        self.inner.unlink_sync(path)
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        self.inner.rmdir_sync(path)
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner.mkdir_sync(path, mode)
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        self.inner.readdir_sync(path)
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        self.inner.chmod_sync(path, mode)
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.inner.chown_sync(path, uid, gid)
    }

    async fn utimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.inner.utimes_sync(path, atime, mtime)
    }

    async fn link(&self, src: &str, dst: &str) -> FsResult<()> {
        self.inner.link_sync(src, dst)
    }

    async fn symlink(&self, src: &str, dst: &str) -> FsResult<()> {
        self.inner.symlink_sync(src, dst)
    }

    async fn readlink(&self, path: &str) -> FsResult<String> {
        self.inner.readlink_sync(path)
    }

    async fn open(&self, path: &str, flag: FileFlag, mode: u32) -> FsResult<Box<dyn File>> {
        self.inner.open_sync(path, flag, mode)
    }

    async fn exists(&self, path: &str) -> bool {
        self.inner.exists_sync(path)
    }

    async fn realpath(&self, path: &str) -> FsResult<String> {
        self.inner.realpath_sync(path)
    }

    async fn truncate(&self, path: &str, len: u64) -> FsResult<()> {
        self.inner.truncate_sync(path, len)
    }

    async fn read_file(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        self.inner.read_file_sync(path, flag)
    }

    async fn write_file(&self, path: &str, data: &[u8], flag: FileFlag, mode: u32) -> FsResult<()> {
        self.inner.write_file_sync(path, data, flag, mode)
    }

    async fn append_file(
        &self,
        path: &str,
        data: &[u8],
        flag: FileFlag,
        mode: u32,
    ) -> FsResult<()> {
        self.inner.append_file_sync(path, data, flag, mode)
    }
}
