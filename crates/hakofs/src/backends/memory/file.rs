//! Open handles on in-memory files.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use super::inode::Inode;
use crate::error::{VfsError, VfsResult};
use crate::ops::VfsFile;
use crate::path;
use crate::types::{FileAttr, OpenFlags};

/// A handle on an in-memory file.
///
/// The cursor, flags and closed state belong to this handle alone; only
/// the inode content is shared with other handles on the same file.
#[derive(Debug)]
pub struct MemoryFile {
    name: String,
    inode: Arc<Inode>,
    offset: u64,
    flags: OpenFlags,
    closed: bool,
    /// Set by any content change; close turns it into an mtime update.
    dirty: bool,
}

impl MemoryFile {
    pub(crate) fn new(name: String, inode: Arc<Inode>, flags: OpenFlags) -> Self {
        Self {
            name,
            inode,
            offset: 0,
            flags,
            closed: false,
            dirty: false,
        }
    }

    fn check_open(&self) -> VfsResult<()> {
        if self.closed {
            Err(VfsError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> VfsResult<()> {
        self.check_open()?;
        if !self.flags.writable() {
            return Err(VfsError::ReadOnly);
        }
        if self.inode.is_dir() {
            return Err(VfsError::IsADirectory);
        }
        Ok(())
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_open()?;
        if self.inode.is_dir() {
            return Err(VfsError::IsADirectory);
        }
        if !self.flags.readable() {
            return Err(VfsError::WriteOnly);
        }

        let state = self.inode.lock();
        let len = state.data.len() as u64;
        if self.offset > len {
            return Err(VfsError::UnexpectedEof);
        }
        // offset <= len, so it fits in usize
        let start = self.offset as usize;
        let n = buf.len().min(state.data.len() - start);
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        drop(state);

        self.offset += n as u64;
        Ok(n)
    }

    fn write_inner(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.check_writable()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.inode.lock();
        if self.flags.append {
            self.offset = state.data.len() as u64;
        }
        let start = usize::try_from(self.offset).map_err(|_| VfsError::InvalidInput)?;
        let end = start.checked_add(buf.len()).ok_or(VfsError::InvalidInput)?;
        if end > state.data.len() {
            state.resize(end)?;
        }
        state.data[start..end].copy_from_slice(buf);
        drop(state);

        self.offset = end as u64;
        self.dirty = true;
        Ok(buf.len())
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.check_open()?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.offset.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = self.inode.lock().data.len() as u64;
                len.checked_add_signed(delta)
            }
        };
        self.offset = target.ok_or(VfsError::InvalidInput)?;
        Ok(self.offset)
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_inner(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.check_open()?)
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_inner(pos)?)
    }
}

impl VfsFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        self.check_open()?;
        Ok(self.inode.attr(path::file_name(&self.name)))
    }

    fn set_len(&mut self, size: u64) -> VfsResult<()> {
        self.check_writable()?;
        let size = usize::try_from(size).map_err(|_| VfsError::InvalidInput)?;
        self.inode.lock().resize(size)?;
        self.dirty = true;
        Ok(())
    }

    fn close(&mut self) -> VfsResult<()> {
        self.check_open()?;
        self.closed = true;
        if self.dirty {
            self.inode.lock().touch();
            self.dirty = false;
        }
        tracing::trace!(name = %self.name, "closed");
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}
