//! Copy-on-write layering.
//!
//! `base` is only ever read. Paths present in `layer` shadow the same path
//! in `base`; everything else falls through. The first mutation of a base
//! file copies it up into `layer` together with its parent directories,
//! mode and times. Removing something that exists in `base` records a
//! whiteout, which hides that key and everything beneath it in `base`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::error::{PathResult, VfsError, VfsResult};
use crate::ops::{VfsFile, VfsOps};
use crate::path::{self, ROOT, SEPARATOR};
use crate::types::{DirEntry, FileAttr, OpenFlags};

const CREATE_MODE: u32 = 0o666;

/// A writable `layer` over a `base` that is never written.
///
/// Wrap `base` in a [`ReadOnlyBackend`](super::ReadOnlyBackend) to have
/// that enforced as well.
#[derive(Debug)]
pub struct CopyOnWriteBackend {
    base: Arc<dyn VfsOps>,
    layer: Arc<dyn VfsOps>,
    /// Whiteout keys; each hides its own base entry and the base subtree.
    hidden: RwLock<BTreeSet<String>>,
    /// Held across compound mutations so copy-up and whiteouts stay
    /// consistent with each other.
    writer: Mutex<()>,
}

impl CopyOnWriteBackend {
    pub fn new(base: Arc<dyn VfsOps>, layer: Arc<dyn VfsOps>) -> Self {
        Self {
            base,
            layer,
            hidden: RwLock::new(BTreeSet::new()),
            writer: Mutex::new(()),
        }
    }

    /// The read-only lower backend.
    pub fn base(&self) -> &Arc<dyn VfsOps> {
        &self.base
    }

    /// The writable upper backend.
    pub fn layer(&self) -> &Arc<dyn VfsOps> {
        &self.layer
    }

    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    fn key(op: &'static str, path: &Path) -> PathResult<String> {
        path::key(path).map_err(|e| e.at(op, Self::path_str(path)))
    }

    fn is_hidden(&self, key: &str) -> bool {
        let hidden = self.hidden.read();
        if hidden.is_empty() {
            return false;
        }
        let mut current = Some(key);
        while let Some(k) = current {
            if hidden.contains(k) {
                return true;
            }
            current = path::parent(k);
        }
        false
    }

    fn hide(&self, key: &str) {
        tracing::debug!(path = %key, "whiteout");
        self.hidden.write().insert(key.to_string());
    }

    fn layer_stat(&self, key: &str) -> VfsResult<Option<FileAttr>> {
        lookup(self.layer.as_ref(), key)
    }

    fn base_stat(&self, key: &str) -> VfsResult<Option<FileAttr>> {
        if self.is_hidden(key) {
            return Ok(None);
        }
        lookup(self.base.as_ref(), key)
    }

    /// The entry a caller sees at `key`, layer first.
    fn visible(&self, key: &str) -> VfsResult<Option<FileAttr>> {
        match self.layer_stat(key)? {
            Some(attr) => Ok(Some(attr)),
            None => self.base_stat(key),
        }
    }

    fn require_parent_dir(&self, key: &str) -> VfsResult<()> {
        let parent = path::parent(key).ok_or(VfsError::AlreadyExists)?;
        match self.visible(parent)? {
            Some(attr) if attr.is_dir() => Ok(()),
            Some(_) => Err(VfsError::NotADirectory),
            None => Err(VfsError::NotFound),
        }
    }

    /// Make `dir` and its ancestors exist in the layer, taking modes from
    /// the base.
    fn copy_up_dirs(&self, dir: &str) -> VfsResult<()> {
        let mut current = ROOT.to_string();
        for segment in dir.split(SEPARATOR).filter(|s| !s.is_empty()) {
            current = path::join(&current, segment);
            if self.layer_stat(&current)?.is_some() {
                continue;
            }
            let attr = self.base_stat(&current)?.ok_or(VfsError::NotFound)?;
            if !attr.is_dir() {
                return Err(VfsError::NotADirectory);
            }
            self.layer.mkdir(Path::new(&current), attr.perm())?;
            tracing::debug!(path = %current, "copied up directory");
        }
        Ok(())
    }

    /// Bring `key` into the layer unless it is there already.
    fn copy_up(&self, key: &str) -> VfsResult<()> {
        if self.layer_stat(key)?.is_some() {
            return Ok(());
        }
        let attr = self.base_stat(key)?.ok_or(VfsError::NotFound)?;
        if attr.is_dir() {
            return self.copy_up_dirs(key);
        }
        if let Some(parent) = path::parent(key) {
            self.copy_up_dirs(parent)?;
        }

        let p = Path::new(key);
        let data = self.base.read_file(p)?;
        self.layer.write_file(p, &data, attr.perm())?;
        self.layer.chtimes(p, attr.atime, attr.mtime)?;
        tracing::debug!(path = %key, size = data.len(), "copied up file");
        Ok(())
    }

    fn open_key(&self, key: &str, flags: OpenFlags, mode: u32) -> VfsResult<Box<dyn VfsFile>> {
        let p = Path::new(key);
        if !flags.mutates() {
            if self.layer_stat(key)?.is_some() {
                return Ok(self.layer.open_file(p, flags, mode)?);
            }
            if self.base_stat(key)?.is_some() {
                return Ok(self.base.open_file(p, flags, mode)?);
            }
            return Err(VfsError::NotFound);
        }

        let _writer = self.writer.lock();
        if self.layer_stat(key)?.is_none() {
            match self.base_stat(key)? {
                Some(_) if flags.create && flags.exclusive => return Err(VfsError::AlreadyExists),
                Some(attr) if attr.is_dir() => return Err(VfsError::IsADirectory),
                Some(_) => self.copy_up(key)?,
                None if !flags.create => return Err(VfsError::NotFound),
                None => {
                    self.require_parent_dir(key)?;
                    if let Some(parent) = path::parent(key) {
                        self.copy_up_dirs(parent)?;
                    }
                }
            }
        }
        Ok(self.layer.open_file(p, flags, mode)?)
    }

    fn open_inner(
        &self,
        op: &'static str,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        let key = Self::key(op, path)?;
        self.open_key(&key, flags, mode)
            .map_err(|e| e.at(op, Self::path_str(path)))
    }

    fn mkdir_key(&self, key: &str, mode: u32) -> VfsResult<()> {
        if self.visible(key)?.is_some() {
            return Err(VfsError::AlreadyExists);
        }
        self.require_parent_dir(key)?;
        if let Some(parent) = path::parent(key) {
            self.copy_up_dirs(parent)?;
        }
        self.layer.mkdir(Path::new(key), mode)?;
        Ok(())
    }

    fn mkdir_all_key(&self, key: &str, mode: u32) -> VfsResult<()> {
        let mut current = ROOT.to_string();
        for segment in key.split(SEPARATOR).filter(|s| !s.is_empty()) {
            current = path::join(&current, segment);
            match self.visible(&current)? {
                Some(attr) if attr.is_dir() => {}
                Some(_) => return Err(VfsError::NotADirectory),
                None => self.mkdir_key(&current, mode)?,
            }
        }
        Ok(())
    }

    fn remove_key(&self, key: &str) -> VfsResult<()> {
        if key == ROOT {
            return Err(VfsError::PermissionDenied);
        }
        let attr = self.visible(key)?.ok_or(VfsError::NotFound)?;
        if attr.is_dir() && !self.read_dir_key(key)?.is_empty() {
            return Err(VfsError::DirectoryNotEmpty);
        }
        if self.layer_stat(key)?.is_some() {
            self.layer.remove(Path::new(key))?;
        }
        if self.base_stat(key)?.is_some() {
            self.hide(key);
        }
        Ok(())
    }

    fn remove_all_key(&self, key: &str) -> VfsResult<()> {
        if self.layer_stat(key)?.is_some() {
            self.layer.remove_all(Path::new(key))?;
        }
        if self.base_stat(key)?.is_some() {
            self.hide(key);
        }
        Ok(())
    }

    fn rename_keys(&self, from: &str, to: &str) -> VfsResult<()> {
        if from == ROOT || to == ROOT {
            return Err(VfsError::PermissionDenied);
        }
        let src = self.visible(from)?.ok_or(VfsError::NotFound)?;
        if from == to {
            return Ok(());
        }
        if path::is_within(to, from) {
            return Err(VfsError::InvalidInput);
        }
        self.require_parent_dir(to)?;
        if let Some(dst) = self.visible(to)? {
            match (src.is_dir(), dst.is_dir()) {
                (false, true) => return Err(VfsError::IsADirectory),
                (true, false) => return Err(VfsError::NotADirectory),
                (true, true) if !self.read_dir_key(to)?.is_empty() => {
                    return Err(VfsError::DirectoryNotEmpty);
                }
                _ => {}
            }
        }

        // Base directories cannot move without copying their whole subtree.
        let from_base = self.base_stat(from)?.is_some();
        if from_base && src.is_dir() {
            return Err(VfsError::PermissionDenied);
        }

        self.copy_up(from)?;
        if let Some(parent) = path::parent(to) {
            self.copy_up_dirs(parent)?;
        }
        if self.base_stat(to)?.is_some() {
            self.hide(to);
        }
        self.layer.rename(Path::new(from), Path::new(to))?;
        if from_base {
            self.hide(from);
        }
        Ok(())
    }

    /// Union of both listings; the layer wins on a name clash and hidden
    /// base entries are left out.
    fn read_dir_key(&self, key: &str) -> VfsResult<Vec<DirEntry>> {
        let attr = self.visible(key)?.ok_or(VfsError::NotFound)?;
        if !attr.is_dir() {
            return Err(VfsError::NotADirectory);
        }

        let p = Path::new(key);
        let mut merged = BTreeMap::new();
        if self.base_stat(key)?.is_some_and(|a| a.is_dir()) {
            for entry in self.base.read_dir(p)? {
                if !self.is_hidden(&path::join(key, &entry.name)) {
                    merged.insert(entry.name.clone(), entry);
                }
            }
        }
        if self.layer_stat(key)?.is_some_and(|a| a.is_dir()) {
            for entry in self.layer.read_dir(p)? {
                merged.insert(entry.name.clone(), entry);
            }
        }
        Ok(merged.into_values().collect())
    }
}

fn lookup(fs: &dyn VfsOps, key: &str) -> VfsResult<Option<FileAttr>> {
    match fs.stat(Path::new(key)) {
        Ok(attr) => Ok(Some(attr)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl VfsOps for CopyOnWriteBackend {
    fn name(&self) -> &str {
        "copy_on_write"
    }

    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        self.open_inner("create", path, OpenFlags::create_truncate(), CREATE_MODE)
    }

    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        self.open_inner("open", path, OpenFlags::READ, 0)
    }

    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        self.open_inner("open", path, flags, mode)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("mkdir", path)?;
        let _writer = self.writer.lock();
        self.mkdir_key(&key, mode)
            .map_err(|e| e.at("mkdir", Self::path_str(path)))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("mkdir", path)?;
        let _writer = self.writer.lock();
        self.mkdir_all_key(&key, mode)
            .map_err(|e| e.at("mkdir", Self::path_str(path)))
    }

    fn remove(&self, path: &Path) -> PathResult<()> {
        let key = Self::key("remove", path)?;
        let _writer = self.writer.lock();
        self.remove_key(&key)
            .map_err(|e| e.at("remove", Self::path_str(path)))
    }

    #[tracing::instrument(level = "debug", skip(self), name = "cow.remove_all")]
    fn remove_all(&self, path: &Path) -> PathResult<()> {
        let key = Self::key("remove", path)?;
        let _writer = self.writer.lock();
        self.remove_all_key(&key)
            .map_err(|e| e.at("remove", Self::path_str(path)))
    }

    #[tracing::instrument(level = "debug", skip(self), name = "cow.rename")]
    fn rename(&self, from: &Path, to: &Path) -> PathResult<()> {
        let from_key = Self::key("rename", from)?;
        let to_key = Self::key("rename", to)?;
        let _writer = self.writer.lock();
        self.rename_keys(&from_key, &to_key)
            .map_err(|e| e.at("rename", Self::path_str(from)))
    }

    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>> {
        let key = Self::key("readdir", path)?;
        self.read_dir_key(&key)
            .map_err(|e| e.at("readdir", Self::path_str(path)))
    }

    fn stat(&self, path: &Path) -> PathResult<FileAttr> {
        let key = Self::key("stat", path)?;
        self.visible(&key)
            .and_then(|attr| attr.ok_or(VfsError::NotFound))
            .map_err(|e| e.at("stat", Self::path_str(path)))
    }

    fn chmod(&self, path: &Path, mode: u32) -> PathResult<()> {
        let key = Self::key("chmod", path)?;
        let _writer = self.writer.lock();
        self.copy_up(&key)
            .and_then(|()| {
                self.layer
                    .chmod(Path::new(&key), mode)
                    .map_err(VfsError::from)
            })
            .map_err(|e| e.at("chmod", Self::path_str(path)))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> PathResult<()> {
        let key = Self::key("chtimes", path)?;
        let _writer = self.writer.lock();
        self.copy_up(&key)
            .and_then(|()| {
                self.layer
                    .chtimes(Path::new(&key), atime, mtime)
                    .map_err(VfsError::from)
            })
            .map_err(|e| e.at("chtimes", Self::path_str(path)))
    }
}
