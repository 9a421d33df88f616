//! Local directory as a content source.
//!
//! Serves file content from a real directory tree, with path security to
//! prevent escaping the root. Pair it with [`scan_listing`] to build a
//! [`ListingFs`](super::ListingFs) over a static directory.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::ContentSource;
use crate::error::{FsError, FsResult};
use crate::path;

/// Content source rooted at a local directory.
///
/// Virtual paths map onto `root`: with root `/srv/site`, `/css/main.css`
/// reads `/srv/site/css/main.css`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// The root is canonicalized at construction time so later prefix
    /// checks see through symlinks (e.g. macOS `/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path to a host path inside the root.
    fn resolve(&self, vpath: &str) -> FsResult<PathBuf> {
        let mut full = self.root.clone();
        for segment in path::segments(vpath) {
            match segment {
                "." => {}
                ".." => {
                    return Err(FsError::permission_denied(vpath, "path escapes the source root"));
                }
                _ => full.push(segment),
            }
        }

        // A symlink inside the tree may still point outside it.
        if full.exists() {
            let canonical = full.canonicalize().map_err(|e| FsError::from_io(vpath, e))?;
            if !canonical.starts_with(&self.root) {
                return Err(FsError::permission_denied(
                    vpath,
                    format!("{} is not under {}", canonical.display(), self.root.display()),
                ));
            }
            return Ok(canonical);
        }
        Ok(full)
    }

    fn file_len(vpath: &str, meta: &std::fs::Metadata) -> FsResult<u64> {
        if meta.is_dir() {
            return Err(FsError::is_a_directory(vpath));
        }
        Ok(meta.len())
    }
}

#[async_trait]
impl ContentSource for DirectorySource {
    fn supports_blocking(&self) -> bool {
        true
    }

    async fn fetch(&self, path: &str) -> FsResult<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn fetch_size(&self, path: &str) -> FsResult<u64> {
        let full = self.resolve(path)?;
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| FsError::from_io(path, e))?;
        Self::file_len(path, &meta)
    }

    fn fetch_sync(&self, path: &str) -> FsResult<Vec<u8>> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|e| FsError::from_io(path, e))
    }

    fn fetch_size_sync(&self, path: &str) -> FsResult<u64> {
        let full = self.resolve(path)?;
        let meta = std::fs::metadata(&full).map_err(|e| FsError::from_io(path, e))?;
        Self::file_len(path, &meta)
    }
}

/// Produce the nested listing for a local directory tree.
///
/// Directories become objects and every other entry becomes `null`. Names
/// are sorted so the listing is stable across runs. Symlinks are listed but
/// not followed.
#[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
pub fn scan_listing(root: impl AsRef<Path>) -> FsResult<Value> {
    let root = root.as_ref();
    let meta = std::fs::metadata(root).map_err(|e| io_error(root, e))?;
    if !meta.is_dir() {
        return Err(FsError::not_a_directory(root.display().to_string()));
    }
    let listing = scan_dir(root)?;
    tracing::debug!(entries = listing.len(), "scanned directory");
    Ok(Value::Object(listing))
}

fn scan_dir(dir: &Path) -> FsResult<Map<String, Value>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let file_type = entry.file_type().map_err(|e| io_error(&entry.path(), e))?;
        entries.push((entry.file_name().to_string_lossy().into_owned(), file_type.is_dir()));
    }
    entries.sort();

    let mut listing = Map::new();
    for (name, is_dir) in entries {
        let value = if is_dir {
            Value::Object(scan_dir(&dir.join(&name))?)
        } else {
            Value::Null
        };
        listing.insert(name, value);
    }
    Ok(listing)
}

fn io_error(path: &Path, err: std::io::Error) -> FsError {
    FsError::from_io(path.display().to_string(), err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DirectorySource) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("css")).unwrap();
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("index.html"), b"<html>").unwrap();
        std::fs::write(tmp.path().join("css/main.css"), b"body{}").unwrap();
        let source = DirectorySource::new(tmp.path());
        (tmp, source)
    }

    #[tokio::test]
    async fn test_fetch_and_size() {
        let (_tmp, source) = setup();
        assert_eq!(source.fetch("/index.html").await.unwrap(), b"<html>");
        assert_eq!(source.fetch_size("/css/main.css").await.unwrap(), 6);
        assert_eq!(source.fetch_sync("/css/main.css").unwrap(), b"body{}");
        assert_eq!(source.fetch_size_sync("/index.html").unwrap(), 6);
    }

    #[tokio::test]
    async fn test_fetch_errors() {
        let (_tmp, source) = setup();
        assert_eq!(source.fetch("/nope").await.unwrap_err().code, ErrorCode::NotFound);
        assert_eq!(source.fetch_size("/css").await.unwrap_err().code, ErrorCode::IsADirectory);
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (_tmp, source) = setup();
        let err = source.fetch("/../../../etc/passwd").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_blocked() {
        let (tmp, source) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), b"s").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), tmp.path().join("link")).unwrap();
        let err = source.fetch_sync("/link").unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_scan_listing() {
        let (tmp, _) = setup();
        let listing = scan_listing(tmp.path()).unwrap();
        assert_eq!(
            listing,
            json!({"css": {"main.css": null}, "empty": {}, "index.html": null})
        );

        let err = scan_listing(tmp.path().join("index.html")).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotADirectory);
        let err = scan_listing(tmp.path().join("missing")).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
