//! Listing-based, read-only backend.
//!
//! The whole name tree is known up front from a nested listing (see
//! [`FileIndex::from_listing`]). File content and sizes come from a
//! [`ContentSource`] on demand:
//!
//! - sizes are resolved lazily on the first `stat` and remembered;
//! - payloads are fetched on open and memoized in the index unless the
//!   backend was built with [`CachePolicy::Bypass`].
//!
//! Handles are [`NoSyncFile`]s. Nothing a handle does is ever written back.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FsError, FsResult};
use crate::file::{File, NoSyncFile};
use crate::flag::FileFlag;
use crate::fs::FileSystem;
use crate::fs::base;
use crate::index::{FileIndex, Inode};
use crate::stats::Stats;

/// Where a listing-based backend gets file content from.
///
/// Paths are the same absolute virtual paths the index uses.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// True if the `*_sync` fetches are implemented.
    fn supports_blocking(&self) -> bool {
        false
    }

    /// Fetch the full content of `path`.
    async fn fetch(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Size of `path` in bytes. Defaults to fetching the content.
    async fn fetch_size(&self, path: &str) -> FsResult<u64> {
        Ok(self.fetch(path).await?.len() as u64)
    }

    fn fetch_sync(&self, path: &str) -> FsResult<Vec<u8>> {
        Err(FsError::not_supported(path))
    }

    fn fetch_size_sync(&self, path: &str) -> FsResult<u64> {
        Ok(self.fetch_sync(path)?.len() as u64)
    }
}

/// Whether fetched payloads are kept in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Keep every fetched payload until [`ListingFs::empty`].
    #[default]
    Memoize,
    /// Fetch on every open.
    Bypass,
}

/// Read-only backend over a static listing.
pub struct ListingFs<S> {
    name: String,
    index: RwLock<FileIndex>,
    source: S,
    cache: CachePolicy,
}

impl<S: ContentSource> ListingFs<S> {
    pub fn new(name: impl Into<String>, index: FileIndex, source: S) -> Self {
        Self {
            name: name.into(),
            index: RwLock::new(index),
            source,
            cache: CachePolicy::default(),
        }
    }

    /// Build the index from a nested listing value.
    pub fn from_listing(name: impl Into<String>, listing: &Value, source: S) -> FsResult<Self> {
        Ok(Self::new(name, FileIndex::from_listing(listing)?, source))
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Seed the payload of `path` so later opens skip the fetch.
    pub fn preload_file(&self, path: &str, data: Vec<u8>) -> FsResult<()> {
        let mut index = self.index.write();
        match index.lookup_mut(path)? {
            Inode::File(stats) => {
                stats.set_contents(data);
                Ok(())
            }
            Inode::Dir(_) => Err(FsError::is_a_directory(path)),
        }
    }

    /// Drop every cached payload. Resolved sizes are kept.
    pub fn empty(&self) {
        self.index.write().for_each_file_mut(|stats| stats.file_data = None);
        tracing::debug!(backend = %self.name, "dropped cached payloads");
    }

    /// Metadata copy without payload.
    fn snapshot(&self, path: &str) -> FsResult<Stats> {
        Ok(self.index.read().lookup(path)?.stats().detached())
    }

    /// Apply read-only open rules and return the file's metadata and any
    /// cached payload.
    fn check_open(&self, path: &str, flag: FileFlag) -> FsResult<(Stats, Option<Vec<u8>>)> {
        if flag.is_writeable() {
            return Err(FsError::permission_denied(path, "Backend is read-only."));
        }
        // Only `r` and `rs` get here, and both reuse existing content.
        match self.index.read().lookup(path)? {
            Inode::File(stats) => Ok((stats.detached(), stats.file_data.clone())),
            Inode::Dir(_) => Err(FsError::is_a_directory(path)),
        }
    }

    fn remember_size(&self, path: &str, size: u64) {
        if let Ok(Inode::File(stats)) = self.index.write().lookup_mut(path) {
            stats.size.get_or_insert(size);
        }
    }

    fn remember(&self, path: &str, data: &[u8]) {
        let mut index = self.index.write();
        if let Ok(Inode::File(stats)) = index.lookup_mut(path) {
            match self.cache {
                CachePolicy::Memoize => stats.set_contents(data.to_vec()),
                CachePolicy::Bypass => stats.size = Some(data.len() as u64),
            }
        }
    }

    async fn contents(&self, path: &str, cached: Option<Vec<u8>>) -> FsResult<Vec<u8>> {
        if let Some(data) = cached {
            return Ok(data);
        }
        let data = self.source.fetch(path).await?;
        tracing::debug!(path, bytes = data.len(), cache = ?self.cache, "fetched content");
        self.remember(path, &data);
        Ok(data)
    }

    fn contents_sync(&self, path: &str, cached: Option<Vec<u8>>) -> FsResult<Vec<u8>> {
        if let Some(data) = cached {
            return Ok(data);
        }
        let data = self.source.fetch_sync(path)?;
        tracing::debug!(path, bytes = data.len(), cache = ?self.cache, "fetched content");
        self.remember(path, &data);
        Ok(data)
    }

    fn handle(
        path: &str,
        flag: FileFlag,
        mut stats: Stats,
        data: Vec<u8>,
    ) -> FsResult<Box<dyn File>> {
        stats.size = Some(data.len() as u64);
        Ok(Box::new(NoSyncFile::new(path, flag, stats, data)?))
    }
}

impl<S> std::fmt::Debug for ListingFs<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingFs")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: ContentSource> FileSystem for ListingFs<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn supports_props(&self) -> bool {
        false
    }

    fn supports_synch(&self) -> bool {
        self.source.supports_blocking()
    }

    fn stat_sync(&self, path: &str) -> FsResult<Stats> {
        let mut stats = self.snapshot(path)?;
        if stats.is_file() && stats.size.is_none() {
            let size = stats.resolve_size(|| self.source.fetch_size_sync(path))?;
            tracing::debug!(path, size, "resolved size");
            self.remember_size(path, size);
        }
        Ok(stats)
    }

    fn readdir_sync(&self, path: &str) -> FsResult<Vec<String>> {
        self.index.read().ls(path)
    }

    fn open_sync(&self, path: &str, flag: FileFlag, _mode: u32) -> FsResult<Box<dyn File>> {
        let (stats, cached) = self.check_open(path, flag)?;
        let data = self.contents_sync(path, cached)?;
        Self::handle(path, flag, stats, data)
    }

    fn read_file_sync(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        base::require_readable(path, flag)?;
        let (_, cached) = self.check_open(path, flag)?;
        self.contents_sync(path, cached)
    }

    async fn stat(&self, path: &str) -> FsResult<Stats> {
        let mut stats = self.snapshot(path)?;
        if stats.is_file() && stats.size.is_none() {
            let size = stats
                .resolve_size_async(|| self.source.fetch_size(path))
                .await?;
            tracing::debug!(path, size, "resolved size");
            self.remember_size(path, size);
        }
        Ok(stats)
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        self.index.read().ls(path)
    }

    async fn open(&self, path: &str, flag: FileFlag, _mode: u32) -> FsResult<Box<dyn File>> {
        let (stats, cached) = self.check_open(path, flag)?;
        let data = self.contents(path, cached).await?;
        Self::handle(path, flag, stats, data)
    }

    async fn read_file(&self, path: &str, flag: FileFlag) -> FsResult<Vec<u8>> {
        base::require_readable(path, flag)?;
        let (_, cached) = self.check_open(path, flag)?;
        self.contents(path, cached).await
    }
}
