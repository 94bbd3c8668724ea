//! File and directory nodes.
//!
//! An [`Inode`] is shared between the namespace tree and every open handle
//! through an `Arc`. Its content and metadata sit behind one mutex, which
//! is independent of the tree lock.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::{VfsError, VfsResult};
use crate::types::{FileAttr, FileType, MODE_DIR};

/// Mutable part of an inode, guarded by the content lock.
#[derive(Debug)]
pub(crate) struct InodeState {
    /// File bytes. Always empty for directories.
    pub data: Vec<u8>,
    /// Permission bits, plus `MODE_DIR` on directories.
    pub mode: u32,
    pub mtime: SystemTime,
    pub atime: SystemTime,
}

impl InodeState {
    /// Record a modification: now, but strictly after the previous mtime.
    pub fn touch(&mut self) {
        let now = SystemTime::now();
        self.mtime = if now > self.mtime {
            now
        } else {
            self.mtime + Duration::from_nanos(1)
        };
    }

    /// Grow with zeros or shrink to `size` bytes. Fails instead of
    /// aborting when the buffer cannot be allocated.
    pub fn resize(&mut self, size: usize) -> VfsResult<()> {
        if let Some(extra) = size.checked_sub(self.data.len()) {
            self.data
                .try_reserve(extra)
                .map_err(|_| VfsError::FileTooLarge)?;
        }
        self.data.resize(size, 0);
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Inode {
    kind: FileType,
    state: Mutex<InodeState>,
}

impl Inode {
    /// A new empty regular file. `MODE_DIR` is stripped from `mode`.
    pub fn file(mode: u32) -> Arc<Self> {
        Self::new(FileType::File, mode & !MODE_DIR)
    }

    /// A new directory. `MODE_DIR` is always set.
    pub fn directory(mode: u32) -> Arc<Self> {
        Self::new(FileType::Directory, mode | MODE_DIR)
    }

    fn new(kind: FileType, mode: u32) -> Arc<Self> {
        let now = SystemTime::now();
        Arc::new(Self {
            kind,
            state: Mutex::new(InodeState {
                data: Vec::new(),
                mode,
                mtime: now,
                atime: now,
            }),
        })
    }

    pub fn kind(&self) -> FileType {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Take the content lock.
    pub fn lock(&self) -> MutexGuard<'_, InodeState> {
        self.state.lock()
    }

    /// Replace the permission bits, keeping the type flag consistent.
    pub fn set_mode(&self, mode: u32) {
        let mode = match self.kind {
            FileType::Directory => mode | MODE_DIR,
            FileType::File => mode & !MODE_DIR,
        };
        self.lock().mode = mode;
    }

    pub fn set_times(&self, atime: SystemTime, mtime: SystemTime) {
        let mut state = self.lock();
        state.atime = atime;
        state.mtime = mtime;
    }

    /// Project into the public metadata shape.
    pub fn attr(&self, name: &str) -> FileAttr {
        let state = self.lock();
        FileAttr {
            name: name.to_string(),
            size: match self.kind {
                FileType::Directory => 0,
                FileType::File => state.data.len() as u64,
            },
            kind: self.kind,
            mode: state.mode,
            mtime: state.mtime,
            atime: state.atime,
        }
    }
}
