//! The namespace: normalized path key to node.
//!
//! Keys live in an ordered map, so everything beneath `/a` is the
//! contiguous run of keys starting with `/a/`. Directory entries also keep
//! the names of their direct children for listing and emptiness checks.
//!
//! Invariant: every key except the root has its parent key present, and
//! that parent is a directory.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::inode::Inode;
use crate::error::{VfsError, VfsResult};
use crate::path::{self, ROOT, SEPARATOR};

#[derive(Debug)]
pub(crate) struct Entry {
    pub inode: Arc<Inode>,
    /// Names of direct children. Empty for files.
    pub children: BTreeSet<String>,
}

#[derive(Debug)]
pub(crate) struct Tree {
    entries: BTreeMap<String, Entry>,
}

impl Tree {
    pub fn new(root_mode: u32) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            ROOT.to_string(),
            Entry {
                inode: Inode::directory(root_mode),
                children: BTreeSet::new(),
            },
        );
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn inode(&self, key: &str) -> Option<&Arc<Inode>> {
        self.entries.get(key).map(|entry| &entry.inode)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check that `key` could be inserted: its parent exists and is a
    /// directory.
    pub fn check_parent(&self, key: &str) -> VfsResult<()> {
        let Some(parent) = path::parent(key) else {
            return Err(VfsError::AlreadyExists);
        };
        match self.entries.get(parent) {
            Some(entry) if entry.inode.is_dir() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory),
            None => Err(VfsError::NotFound),
        }
    }

    /// Insert a node under an existing parent directory.
    ///
    /// Callers must have passed [`check_parent`](Self::check_parent).
    pub fn insert(&mut self, key: String, inode: Arc<Inode>) {
        self.attach(&key);
        self.entries.insert(
            key,
            Entry {
                inode,
                children: BTreeSet::new(),
            },
        );
    }

    /// Remove a single node, leaving any descendants alone.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.detach(key);
        Some(entry)
    }

    /// `key` (if present) followed by every key beneath it, never the
    /// root and never a sibling that only shares a string prefix.
    pub fn subtree_keys(&self, key: &str) -> Vec<String> {
        let mut keys = Vec::new();
        if key != ROOT && self.entries.contains_key(key) {
            keys.push(key.to_string());
        }

        let lower = if key == ROOT {
            ROOT.to_string()
        } else {
            format!("{key}{SEPARATOR}")
        };
        keys.extend(
            self.entries
                .range(lower.clone()..)
                .map(|(k, _)| k)
                .take_while(|k| k.starts_with(&lower))
                .filter(|k| k.as_str() != ROOT)
                .cloned(),
        );
        keys
    }

    /// Remove `key` and everything beneath it. Removing the root empties
    /// the tree but keeps the root itself. Returns the number of nodes
    /// removed.
    pub fn remove_subtree(&mut self, key: &str) -> usize {
        let keys = self.subtree_keys(key);
        if key == ROOT {
            if let Some(root) = self.entries.get_mut(ROOT) {
                root.children.clear();
            }
        } else {
            self.detach(key);
        }
        for k in &keys {
            self.entries.remove(k);
        }
        keys.len()
    }

    /// Move the node at `from`, with all its descendants, to `to`.
    ///
    /// An existing file at `to` is replaced by a file, an existing empty
    /// directory by a directory. Returns the number of nodes moved.
    pub fn rename(&mut self, from: &str, to: &str) -> VfsResult<usize> {
        if from == ROOT || to == ROOT {
            return Err(VfsError::PermissionDenied);
        }
        let source_is_dir = self.get(from).ok_or(VfsError::NotFound)?.inode.is_dir();
        if from == to {
            return Ok(0);
        }
        if path::is_within(to, from) {
            return Err(VfsError::InvalidInput);
        }
        self.check_parent(to)?;

        if let Some(target) = self.get(to) {
            match (source_is_dir, target.inode.is_dir()) {
                (false, true) => return Err(VfsError::IsADirectory),
                (true, false) => return Err(VfsError::NotADirectory),
                (true, true) if !target.children.is_empty() => {
                    return Err(VfsError::DirectoryNotEmpty);
                }
                _ => {}
            }
            self.remove(to);
        }

        let keys = self.subtree_keys(from);
        self.detach(from);
        let moved: Vec<(String, Entry)> = keys
            .iter()
            .filter_map(|key| {
                let entry = self.entries.remove(key)?;
                Some((path::rebase(key, from, to), entry))
            })
            .collect();
        let count = moved.len();
        self.entries.extend(moved);
        self.attach(to);
        Ok(count)
    }

    /// Register `key`'s name in its parent's child set.
    fn attach(&mut self, key: &str) {
        if let Some(parent) = path::parent(key).and_then(|p| self.entries.get_mut(p)) {
            parent.children.insert(path::file_name(key).to_string());
        }
    }

    /// Drop `key`'s name from its parent's child set.
    fn detach(&mut self, key: &str) {
        if let Some(parent) = path::parent(key).and_then(|p| self.entries.get_mut(p)) {
            parent.children.remove(path::file_name(key));
        }
    }
}
