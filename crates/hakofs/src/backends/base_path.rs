//! Base-path backend.
//!
//! Confines another backend to a subdirectory. Every caller path is
//! normalized first, so `..` cannot climb above the base, then appended
//! to the base. Errors carry the caller's path, never the real one.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{PathError, PathResult, VfsResult};
use crate::ops::{VfsFile, VfsOps};
use crate::path::{self, SEPARATOR};
use crate::types::{DirEntry, FileAttr, OpenFlags};

/// A backend rooted at `base` inside another backend.
///
/// For example, with base `/srv/data` a call on `/notes/a.txt` lands on
/// `/srv/data/notes/a.txt` of the inner backend.
#[derive(Debug, Clone)]
pub struct BasePathBackend {
    inner: Arc<dyn VfsOps>,
    base: PathBuf,
}

impl BasePathBackend {
    /// Wrap `inner` so that `/` maps to `base`.
    pub fn new(inner: Arc<dyn VfsOps>, base: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            base: base.into(),
        }
    }

    /// Get the base path.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Map a caller path onto the inner backend.
    pub fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        Ok(self.under_base(&path::key(path)?))
    }

    fn under_base(&self, key: &str) -> PathBuf {
        let relative = key.trim_start_matches(SEPARATOR);
        if relative.is_empty() {
            self.base.clone()
        } else {
            self.base.join(relative)
        }
    }

    fn key(op: &'static str, path: &Path) -> PathResult<String> {
        path::key(path).map_err(|e| e.at(op, path.display().to_string()))
    }

    fn real(&self, op: &'static str, path: &Path) -> PathResult<PathBuf> {
        Ok(self.under_base(&Self::key(op, path)?))
    }

    fn rewrap(path: &Path) -> impl FnOnce(PathError) -> PathError {
        let display = path.display().to_string();
        move |e| e.rewrap(display)
    }

    fn wrap_file(path: &Path, inner: Box<dyn VfsFile>) -> Box<dyn VfsFile> {
        Box::new(BasePathFile {
            name: path.display().to_string(),
            inner,
        })
    }
}

impl VfsOps for BasePathBackend {
    fn name(&self) -> &str {
        "base_path"
    }

    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .inner
            .create(&self.real("create", path)?)
            .map_err(Self::rewrap(path))?;
        Ok(Self::wrap_file(path, file))
    }

    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .inner
            .open(&self.real("open", path)?)
            .map_err(Self::rewrap(path))?;
        Ok(Self::wrap_file(path, file))
    }

    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .inner
            .open_file(&self.real("open", path)?, flags, mode)
            .map_err(Self::rewrap(path))?;
        Ok(Self::wrap_file(path, file))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> PathResult<()> {
        self.inner
            .mkdir(&self.real("mkdir", path)?, mode)
            .map_err(Self::rewrap(path))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> PathResult<()> {
        self.inner
            .mkdir_all(&self.real("mkdir", path)?, mode)
            .map_err(Self::rewrap(path))
    }

    fn remove(&self, path: &Path) -> PathResult<()> {
        self.inner
            .remove(&self.real("remove", path)?)
            .map_err(Self::rewrap(path))
    }

    fn remove_all(&self, path: &Path) -> PathResult<()> {
        self.inner
            .remove_all(&self.real("remove", path)?)
            .map_err(Self::rewrap(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> PathResult<()> {
        self.inner
            .rename(&self.real("rename", from)?, &self.real("rename", to)?)
            .map_err(Self::rewrap(from))
    }

    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>> {
        self.inner
            .read_dir(&self.real("readdir", path)?)
            .map_err(Self::rewrap(path))
    }

    fn stat(&self, path: &Path) -> PathResult<FileAttr> {
        let key = Self::key("stat", path)?;
        let mut attr = self
            .inner
            .stat(&self.under_base(&key))
            .map_err(Self::rewrap(path))?;
        attr.name = path::file_name(&key).to_string();
        Ok(attr)
    }

    fn chmod(&self, path: &Path, mode: u32) -> PathResult<()> {
        self.inner
            .chmod(&self.real("chmod", path)?, mode)
            .map_err(Self::rewrap(path))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> PathResult<()> {
        self.inner
            .chtimes(&self.real("chtimes", path)?, atime, mtime)
            .map_err(Self::rewrap(path))
    }
}

/// Handle from a [`BasePathBackend`], named by the caller's path.
#[derive(Debug)]
struct BasePathFile {
    name: String,
    inner: Box<dyn VfsFile>,
}

impl Read for BasePathFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BasePathFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for BasePathFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl VfsFile for BasePathFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        let mut attr = self.inner.stat()?;
        attr.name = path::file_name(&path::normalize(&self.name)).to_string();
        Ok(attr)
    }

    fn set_len(&mut self, size: u64) -> VfsResult<()> {
        self.inner.set_len(size)
    }

    fn close(&mut self) -> VfsResult<()> {
        self.inner.close()
    }
}
