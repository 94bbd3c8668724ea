//! In-memory filesystem backend.
//!
//! Used for testing and scratch space. All data is ephemeral.
//!
//! Locking is two-tier: one reader/writer lock over the namespace tree and
//! one mutex per inode for its content and metadata. The tree lock is
//! always taken first. Handles only ever take the inode lock, so closing a
//! handle never waits on namespace operations.

mod file;
mod inode;
mod tree;

pub use file::MemoryFile;

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use self::inode::Inode;
use self::tree::Tree;
use crate::error::{PathResult, VfsError, VfsResult};
use crate::ops::{VfsFile, VfsOps};
use crate::path::{self, ROOT};
use crate::types::{DirEntry, FileAttr, OpenFlags};

/// Mode given to files made by `create`.
const CREATE_MODE: u32 = 0o666;

/// In-memory filesystem backend.
///
/// Thread-safe; share it behind an `Arc`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    tree: RwLock<Tree>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::new(0o755)),
        }
    }

    /// Number of nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.tree.read().len()
    }

    /// Get the path string for error messages.
    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    /// Key for `path`, failing as `op` on a name that is not UTF-8.
    fn key(op: &'static str, path: &Path) -> PathResult<String> {
        path::key(path).map_err(|e| e.at(op, Self::path_str(path)))
    }

    fn open_inner(&self, path: &Path, flags: OpenFlags, mode: u32) -> VfsResult<MemoryFile> {
        let key = path::key(path)?;
        let inode = if flags.create {
            let mut tree = self.tree.write();
            match tree.inode(&key) {
                Some(_) if flags.exclusive => return Err(VfsError::AlreadyExists),
                Some(inode) => {
                    let inode = Arc::clone(inode);
                    Self::prepare_existing(&inode, flags)?;
                    inode
                }
                None => {
                    tree.check_parent(&key)?;
                    let inode = Inode::file(mode);
                    tree.insert(key.clone(), Arc::clone(&inode));
                    tracing::debug!(path = %key, mode = %format!("{mode:#o}"), "created file");
                    inode
                }
            }
        } else {
            let tree = self.tree.read();
            let inode = Arc::clone(tree.inode(&key).ok_or(VfsError::NotFound)?);
            Self::prepare_existing(&inode, flags)?;
            inode
        };

        tracing::trace!(path = %key, ?flags, "opened");
        Ok(MemoryFile::new(key, inode, flags))
    }

    /// Kind checks and truncation for an open of an existing node. Runs
    /// with the tree lock held, so it may take the content lock.
    fn prepare_existing(inode: &Inode, flags: OpenFlags) -> VfsResult<()> {
        if inode.is_dir() {
            if flags.mutates() {
                return Err(VfsError::IsADirectory);
            }
            return Ok(());
        }
        if flags.truncate && flags.writable() {
            let mut state = inode.lock();
            if !state.data.is_empty() {
                state.data.clear();
                state.touch();
            }
        }
        Ok(())
    }
}

impl VfsOps for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, OpenFlags::create_truncate(), CREATE_MODE)
            .map_err(|e| e.at("create", Self::path_str(path)))?;
        Ok(Box::new(file))
    }

    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, OpenFlags::READ, 0)
            .map_err(|e| e.at("open", Self::path_str(path)))?;
        Ok(Box::new(file))
    }

    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, flags, mode)
            .map_err(|e| e.at("open", Self::path_str(path)))?;
        Ok(Box::new(file))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("mkdir", path)?;
        let mut tree = self.tree.write();

        if tree.contains(&key) {
            return Err(VfsError::AlreadyExists.at("mkdir", Self::path_str(path)));
        }
        tree.check_parent(&key)
            .map_err(|e| e.at("mkdir", Self::path_str(path)))?;

        tracing::debug!(path = %key, mode = %format!("{mode:#o}"), "mkdir");
        tree.insert(key, Inode::directory(mode));
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("mkdir", path)?;
        let mut tree = self.tree.write();

        let mut current = ROOT.to_string();
        for segment in key.split(path::SEPARATOR).filter(|s| !s.is_empty()) {
            current = path::join(&current, segment);
            match tree.inode(&current) {
                Some(inode) if inode.is_dir() => {}
                Some(_) => {
                    return Err(VfsError::NotADirectory.at("mkdir", Self::path_str(path)));
                }
                None => {
                    tracing::debug!(path = %current, "mkdir");
                    tree.insert(current.clone(), Inode::directory(mode));
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> PathResult<()> {
        let key = Self::key("remove", path)?;
        let fail = |e: VfsError| e.at("remove", Self::path_str(path));

        if key == ROOT {
            return Err(fail(VfsError::PermissionDenied));
        }

        let mut tree = self.tree.write();
        let entry = tree.get(&key).ok_or_else(|| fail(VfsError::NotFound))?;
        if !entry.children.is_empty() {
            return Err(fail(VfsError::DirectoryNotEmpty));
        }
        tree.remove(&key);
        tracing::debug!(path = %key, "removed");
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), name = "memory.remove_all")]
    fn remove_all(&self, path: &Path) -> PathResult<()> {
        let key = Self::key("remove", path)?;
        let removed = self.tree.write().remove_subtree(&key);
        tracing::debug!(removed, "removed subtree");
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), name = "memory.rename")]
    fn rename(&self, from: &Path, to: &Path) -> PathResult<()> {
        let from_key = Self::key("rename", from)?;
        let to_key = Self::key("rename", to)?;

        let moved = self
            .tree
            .write()
            .rename(&from_key, &to_key)
            .map_err(|e| e.at("rename", Self::path_str(from)))?;
        tracing::debug!(moved, "renamed");
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>> {
        let key = Self::key("readdir", path)?;
        let tree = self.tree.read();

        let entry = tree
            .get(&key)
            .ok_or_else(|| VfsError::NotFound.at("readdir", Self::path_str(path)))?;
        if !entry.inode.is_dir() {
            return Err(VfsError::NotADirectory.at("readdir", Self::path_str(path)));
        }

        Ok(entry
            .children
            .iter()
            .filter_map(|name| {
                let child = tree.inode(&path::join(&key, name))?;
                Some(DirEntry::new(name.clone(), child.kind()))
            })
            .collect())
    }

    fn stat(&self, path: &Path) -> PathResult<FileAttr> {
        let key = Self::key("stat", path)?;
        let tree = self.tree.read();

        tree.inode(&key)
            .map(|inode| inode.attr(path::file_name(&key)))
            .ok_or_else(|| VfsError::NotFound.at("stat", Self::path_str(path)))
    }

    fn chmod(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("chmod", path)?;
        let tree = self.tree.read();

        let inode = tree
            .inode(&key)
            .ok_or_else(|| VfsError::NotFound.at("chmod", Self::path_str(path)))?;
        inode.set_mode(mode);
        Ok(())
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> PathResult<()> {
        let key = Self::key("chtimes", path)?;
        let tree = self.tree.read();

        let inode = tree
            .inode(&key)
            .ok_or_else(|| VfsError::NotFound.at("chtimes", Self::path_str(path)))?;
        inode.set_times(atime, mtime);
        Ok(())
    }
}
