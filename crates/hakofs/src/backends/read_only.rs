//! Read-only wrapper.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{PathResult, VfsError};
use crate::ops::{VfsFile, VfsOps};
use crate::types::{DirEntry, FileAttr, OpenFlags};

/// Passes reads through to `inner` and refuses every mutation with
/// [`VfsError::ReadOnlyFilesystem`].
#[derive(Debug, Clone)]
pub struct ReadOnlyBackend {
    inner: Arc<dyn VfsOps>,
}

impl ReadOnlyBackend {
    pub fn new(inner: Arc<dyn VfsOps>) -> Self {
        Self { inner }
    }

    fn deny<T>(op: &'static str, path: &Path) -> PathResult<T> {
        tracing::debug!(op, path = %path.display(), "refused on read-only filesystem");
        Err(VfsError::ReadOnlyFilesystem.at(op, path.display().to_string()))
    }
}

impl VfsOps for ReadOnlyBackend {
    fn name(&self) -> &str {
        "read_only"
    }

    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        Self::deny("create", path)
    }

    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        self.inner.open(path)
    }

    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        if flags.mutates() {
            return Self::deny("open", path);
        }
        self.inner.open_file(path, flags, mode)
    }

    fn mkdir(&self, path: &Path, _mode: u32) -> PathResult<()> {
        Self::deny("mkdir", path)
    }

    fn mkdir_all(&self, path: &Path, _mode: u32) -> PathResult<()> {
        Self::deny("mkdir", path)
    }

    fn remove(&self, path: &Path) -> PathResult<()> {
        Self::deny("remove", path)
    }

    fn remove_all(&self, path: &Path) -> PathResult<()> {
        Self::deny("remove", path)
    }

    fn rename(&self, from: &Path, _to: &Path) -> PathResult<()> {
        Self::deny("rename", from)
    }

    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn stat(&self, path: &Path) -> PathResult<FileAttr> {
        self.inner.stat(path)
    }

    fn chmod(&self, path: &Path, _mode: u32) -> PathResult<()> {
        Self::deny("chmod", path)
    }

    fn chtimes(&self, path: &Path, _atime: SystemTime, _mtime: SystemTime) -> PathResult<()> {
        Self::deny("chtimes", path)
    }
}
