//! Configuration for listing-based backends.
//!
//! ```toml
//! name = "site"
//! cache = "memoize"   # or "bypass"
//!
//! [index]
//! scan = "public"     # or: file = "index.json", listing = '{"a.txt": null}'
//! ```
//!
//! Relative `file` and `scan` paths are resolved against the directory of
//! the config file when loaded with [`ListingConfig::load`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backends::{CachePolicy, ContentSource, ListingFs, scan_listing};
use crate::error::{FsError, FsResult};
use crate::index::FileIndex;

/// Where the name tree comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Inline JSON listing.
    Listing(String),
    /// Path to a JSON listing file.
    File(PathBuf),
    /// Local directory to scan.
    Scan(PathBuf),
}

impl IndexSource {
    fn rebase(&mut self, base: &Path) {
        match self {
            IndexSource::File(path) | IndexSource::Scan(path) if path.is_relative() => {
                *path = base.join(&*path);
            }
            _ => {}
        }
    }
}

/// A listing-based backend definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Backend name reported by `FileSystem::name`.
    pub name: String,
    /// Payload caching.
    #[serde(default)]
    pub cache: CachePolicy,
    /// Name-tree source.
    pub index: IndexSource,
}

impl ListingConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(content: &str) -> FsResult<Self> {
        toml::from_str(content)
            .map_err(|e| FsError::invalid_argument("", format!("Failed to parse config: {e}")))
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| FsError::from_io(&shown, e))?;
        let mut config: Self = toml::from_str(&content).map_err(|e| {
            FsError::invalid_argument(&shown, format!("Failed to parse config: {e}"))
        })?;
        if let Some(base) = path.parent() {
            config.index.rebase(base);
        }
        tracing::debug!(config = %shown, name = %config.name, "loaded listing config");
        Ok(config)
    }

    /// Build the inode index this config describes.
    pub fn build_index(&self) -> FsResult<FileIndex> {
        match &self.index {
            IndexSource::Listing(json) => FileIndex::from_listing_str(json),
            IndexSource::File(path) => {
                let shown = path.display().to_string();
                let json =
                    std::fs::read_to_string(path).map_err(|e| FsError::from_io(&shown, e))?;
                FileIndex::from_listing_str(&json).map_err(|e| FsError { path: shown, ..e })
            }
            IndexSource::Scan(root) => FileIndex::from_listing(&scan_listing(root)?),
        }
    }

    /// Build the backend over `source`.
    pub fn build<S: ContentSource>(&self, source: S) -> FsResult<ListingFs<S>> {
        let index = self.build_index()?;
        Ok(ListingFs::new(self.name.clone(), index, source).with_cache(self.cache))
    }
}
