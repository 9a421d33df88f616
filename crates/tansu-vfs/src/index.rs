//! Hierarchical inode index.
//!
//! The index owns every node in an arena. Directories map child names to
//! [`NodeId`]s in insertion order; each slot keeps a non-owning link to its
//! parent so a node's path can be rebuilt without shared ownership.
//!
//! Listing-based backends build the index once from a nested listing:
//!
//! ```json
//! { "home": { "x.txt": null, "empty": {} } }
//! ```
//!
//! Objects become directories, every other value becomes a file whose size
//! is not yet known.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{FsError, FsResult};
use crate::path;
use crate::stats::{DEFAULT_DIR_MODE, LISTING_MODE, Stats};

/// Handle to a node in a [`FileIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Directory node: its own metadata plus ordered children.
#[derive(Debug, Clone)]
pub struct DirInode {
    stats: Stats,
    children: IndexMap<String, NodeId>,
}

impl DirInode {
    /// Create an empty directory with the given metadata.
    pub fn new(stats: Stats) -> Self {
        Self {
            stats,
            children: IndexMap::new(),
        }
    }

    /// Directory metadata.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Mutable directory metadata.
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Child names in insertion order.
    pub fn listing(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Look up a child by exact name.
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if the directory has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A node: a file carrying metadata, or a directory.
#[derive(Debug, Clone)]
pub enum Inode {
    File(Stats),
    Dir(DirInode),
}

impl Inode {
    /// Fresh empty directory.
    pub fn directory(mode: u32) -> Self {
        Inode::Dir(DirInode::new(Stats::directory(mode)))
    }

    /// Metadata of either node kind.
    pub fn stats(&self) -> &Stats {
        match self {
            Inode::File(stats) => stats,
            Inode::Dir(dir) => &dir.stats,
        }
    }

    /// Mutable metadata of either node kind.
    pub fn stats_mut(&mut self) -> &mut Stats {
        match self {
            Inode::File(stats) => stats,
            Inode::Dir(dir) => &mut dir.stats,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Inode::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Inode::Dir(_))
    }
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    parent: Option<NodeId>,
    inode: Inode,
}

/// Arena-backed name tree rooted at `/`.
#[derive(Debug, Clone)]
pub struct FileIndex {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FileIndex {
    /// Create an index holding only the root directory.
    pub fn new() -> Self {
        Self::with_root(Stats::directory(DEFAULT_DIR_MODE))
    }

    /// Create an index whose root carries the given metadata.
    pub fn with_root(stats: Stats) -> Self {
        Self {
            slots: vec![Some(Slot {
                name: String::new(),
                parent: None,
                inode: Inode::Dir(DirInode::new(stats)),
            })],
            free: Vec::new(),
        }
    }

    /// Build an index from a nested listing value.
    #[tracing::instrument(skip(listing), level = "debug")]
    pub fn from_listing(listing: &Value) -> FsResult<Self> {
        let Value::Object(root) = listing else {
            return Err(FsError::invalid_argument("/", "listing root must be an object"));
        };

        let mut index = Self::with_root(Stats::directory(LISTING_MODE));
        let mut queue = vec![(index.root(), root)];
        while let Some((dir, entries)) = queue.pop() {
            for (name, value) in entries {
                if name.is_empty() || name.contains('/') {
                    return Err(FsError::invalid_argument(
                        index.path_of(dir).unwrap_or_default(),
                        format!("invalid listing entry name {name:?}"),
                    ));
                }
                match value {
                    Value::Object(children) => {
                        let id = index.attach(dir, name, Inode::directory(LISTING_MODE))?;
                        queue.push((id, children));
                    }
                    _ => {
                        index.attach(dir, name, Inode::File(Stats::file(None, LISTING_MODE)))?;
                    }
                }
            }
        }
        tracing::debug!(nodes = index.len(), "built index from listing");
        Ok(index)
    }

    /// Parse a JSON listing and build an index from it.
    pub fn from_listing_str(json: &str) -> FsResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| FsError::invalid_argument("/", format!("invalid listing: {e}")))?;
        Self::from_listing(&value)
    }

    /// The root directory.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Node for an id, if it is still live.
    pub fn get(&self, id: NodeId) -> Option<&Inode> {
        self.slot(id).map(|s| &s.inode)
    }

    /// Mutable node for an id, if it is still live.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Inode> {
        self.slot_mut(id).map(|s| &mut s.inode)
    }

    /// Walk `path` from the root.
    ///
    /// Only the leading separator is skipped. A missing or empty interior
    /// segment yields `ENOENT`; descending through a file, or a trailing `/`
    /// after one, yields `ENOTDIR`.
    pub fn resolve(&self, path: &str) -> FsResult<NodeId> {
        let mut current = self.root();
        let rest = path.strip_prefix('/').unwrap_or(path);
        if rest.is_empty() {
            return Ok(current);
        }
        let mut segments = rest.split('/').peekable();
        while let Some(segment) = segments.next() {
            let dir = match self.get(current) {
                Some(Inode::Dir(dir)) => dir,
                Some(Inode::File(_)) => return Err(FsError::not_a_directory(path)),
                None => return Err(FsError::not_found(path)),
            };
            if segment.is_empty() {
                if segments.peek().is_none() {
                    break;
                }
                return Err(FsError::not_found(path));
            }
            current = dir.child(segment).ok_or_else(|| FsError::not_found(path))?;
        }
        Ok(current)
    }

    /// Resolve and borrow the node at `path`.
    pub fn lookup(&self, path: &str) -> FsResult<&Inode> {
        let id = self.resolve(path)?;
        self.get(id).ok_or_else(|| FsError::not_found(path))
    }

    /// Resolve and mutably borrow the node at `path`.
    pub fn lookup_mut(&mut self, path: &str) -> FsResult<&mut Inode> {
        let id = self.resolve(path)?;
        self.get_mut(id).ok_or_else(|| FsError::not_found(path))
    }

    /// Child names of a directory node.
    pub fn listing(&self, id: NodeId) -> FsResult<Vec<String>> {
        match self.get(id) {
            Some(Inode::Dir(dir)) => Ok(dir.listing()),
            Some(Inode::File(_)) => {
                Err(FsError::not_a_directory(self.path_of(id).unwrap_or_default()))
            }
            None => Err(FsError::not_found("")),
        }
    }

    /// Child names of the directory at `path`.
    pub fn ls(&self, path: &str) -> FsResult<Vec<String>> {
        match self.lookup(path)? {
            Inode::Dir(dir) => Ok(dir.listing()),
            Inode::File(_) => Err(FsError::not_a_directory(path)),
        }
    }

    /// Absolute path of a node, rebuilt from parent links.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.slot(id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.slot(parent)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Insert `inode` at `path`. The parent must already be a directory.
    pub fn insert(&mut self, path: &str, inode: Inode) -> FsResult<NodeId> {
        if path::is_root(path) {
            return Err(FsError::already_exists(path));
        }
        let parent_path = path::dirname(path);
        let parent = self.resolve(&parent_path)?;
        if !matches!(self.get(parent), Some(Inode::Dir(_))) {
            return Err(FsError::not_a_directory(parent_path));
        }
        self.attach(parent, path::basename(path), inode)
            .map_err(|e| FsError { path: path.to_string(), ..e })
    }

    /// Insert `inode` at `path`, creating missing parent directories.
    pub fn insert_with_parents(&mut self, path: &str, inode: Inode) -> FsResult<NodeId> {
        let mut current = self.root();
        let parts: Vec<&str> = path::segments(path).collect();
        let Some((name, parents)) = parts.split_last() else {
            return Err(FsError::already_exists(path));
        };
        for segment in parents {
            current = match self.get(current) {
                Some(Inode::Dir(dir)) => match dir.child(segment) {
                    Some(id) => id,
                    None => self.attach(current, segment, Inode::directory(DEFAULT_DIR_MODE))?,
                },
                _ => return Err(FsError::not_a_directory(path)),
            };
        }
        if !matches!(self.get(current), Some(Inode::Dir(_))) {
            return Err(FsError::not_a_directory(path));
        }
        self.attach(current, name, inode)
            .map_err(|e| FsError { path: path.to_string(), ..e })
    }

    /// Remove the node at `path` together with its subtree.
    pub fn remove(&mut self, path: &str) -> FsResult<Inode> {
        if path::is_root(path) {
            return Err(FsError::invalid_argument(path, "cannot remove the root directory"));
        }
        let id = self.resolve(path)?;
        self.detach(id);
        let mut slot = self.release(id).ok_or_else(|| FsError::not_found(path))?;
        if let Inode::Dir(dir) = &mut slot.inode {
            let mut pending: Vec<NodeId> = dir.children.drain(..).map(|(_, id)| id).collect();
            while let Some(child) = pending.pop() {
                if let Some(Slot { inode: Inode::Dir(sub), .. }) = self.release(child) {
                    pending.extend(sub.children.into_values());
                }
            }
        }
        Ok(slot.inode)
    }

    /// Move the node at `from` to `to`.
    ///
    /// An existing file at `to` is replaced by a file; an existing empty
    /// directory is replaced by a directory. All checks run before the tree
    /// is touched.
    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        if path::is_root(from) || path::is_root(to) {
            return Err(FsError::permission_denied(from, "cannot rename the root directory"));
        }
        let source = self.resolve(from)?;
        let source_is_dir = matches!(self.get(source), Some(Inode::Dir(_)));

        let to_parent_path = path::dirname(to);
        let to_parent = self.resolve(&to_parent_path)?;
        if !matches!(self.get(to_parent), Some(Inode::Dir(_))) {
            return Err(FsError::not_a_directory(to_parent_path));
        }

        // Moving a directory beneath itself would orphan the subtree.
        let mut ancestor = Some(to_parent);
        while let Some(id) = ancestor {
            if id == source {
                return Err(FsError::invalid_argument(to, "cannot move a directory into itself"));
            }
            ancestor = self.slot(id).and_then(|s| s.parent);
        }

        let name = path::basename(to).to_string();
        let existing = match self.get(to_parent) {
            Some(Inode::Dir(dir)) => dir.child(&name),
            _ => None,
        };
        if let Some(target) = existing {
            if target == source {
                return Ok(());
            }
            match (self.get(target), source_is_dir) {
                (Some(Inode::Dir(dir)), true) if !dir.is_empty() => {
                    return Err(FsError::not_empty(to));
                }
                (Some(Inode::Dir(_)), false) => return Err(FsError::is_a_directory(to)),
                (Some(Inode::File(_)), true) => return Err(FsError::not_a_directory(to)),
                _ => {}
            }
            self.remove(to)?;
        }

        self.detach(source);
        if let Some(slot) = self.slot_mut(source) {
            slot.name = name.clone();
            slot.parent = Some(to_parent);
        }
        if let Some(Inode::Dir(dir)) = self.get_mut(to_parent) {
            dir.children.insert(name, source);
        }
        Ok(())
    }

    /// Visit every file node's metadata.
    pub fn for_each_file_mut(&mut self, mut f: impl FnMut(&mut Stats)) {
        for slot in self.slots.iter_mut().flatten() {
            if let Inode::File(stats) = &mut slot.inode {
                f(stats);
            }
        }
    }

    /// Add a child under a directory node.
    fn attach(&mut self, parent: NodeId, name: &str, inode: Inode) -> FsResult<NodeId> {
        match self.get(parent) {
            Some(Inode::Dir(dir)) if dir.child(name).is_some() => {
                return Err(FsError::already_exists(name));
            }
            Some(Inode::Dir(_)) => {}
            _ => return Err(FsError::not_a_directory(name)),
        }
        let slot = Slot {
            name: name.to_string(),
            parent: Some(parent),
            inode,
        };
        let id = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                NodeId(i)
            }
            None => {
                self.slots.push(Some(slot));
                NodeId(self.slots.len() - 1)
            }
        };
        if let Some(Inode::Dir(dir)) = self.get_mut(parent) {
            dir.children.insert(name.to_string(), id);
        }
        Ok(id)
    }

    /// Unlink a node from its parent's children, keeping its slot.
    fn detach(&mut self, id: NodeId) {
        let Some(slot) = self.slot(id) else { return };
        let (Some(parent), name) = (slot.parent, slot.name.clone()) else {
            return;
        };
        if let Some(Inode::Dir(dir)) = self.get_mut(parent) {
            dir.children.shift_remove(&name);
        }
    }

    /// Free a slot for reuse.
    fn release(&mut self, id: NodeId) -> Option<Slot> {
        let slot = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(slot)
    }
}
