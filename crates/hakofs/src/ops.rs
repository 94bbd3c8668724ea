//! VFS operations traits.
//!
//! [`VfsOps`] is the namespace side: everything addressed by path.
//! [`VfsFile`] is an open handle with its own cursor.

use std::fmt::Debug;
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{PathResult, VfsResult};
use crate::types::{DirEntry, FileAttr, OpenFlags};
use crate::walk::Visit;

/// An open file.
///
/// Reads and writes go through the std I/O traits and move this handle's
/// cursor only. Dropping an open handle closes it.
pub trait VfsFile: Read + Write + Seek + Send + Debug {
    /// The path this handle was opened with.
    fn name(&self) -> &str;

    /// Metadata of the underlying file.
    fn stat(&self) -> VfsResult<FileAttr>;

    /// Truncate or zero-extend the file to `size` bytes.
    fn set_len(&mut self, size: u64) -> VfsResult<()>;

    /// Close the handle. Any further I/O or a second close fails.
    fn close(&mut self) -> VfsResult<()>;
}

/// Core VFS operations trait.
///
/// Every method wraps failures in a single-level
/// [`PathError`](crate::PathError) naming the operation and the path.
pub trait VfsOps: Send + Sync + Debug {
    /// Short backend name, for diagnostics.
    fn name(&self) -> &str;

    // ========================================================================
    // Handles
    // ========================================================================

    /// Create or truncate a file and open it read-write.
    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>>;

    /// Open an existing file read-only.
    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>>;

    /// Open with explicit flags. `mode` only applies to newly created files.
    fn open_file(&self, path: &Path, flags: OpenFlags, mode: u32)
    -> PathResult<Box<dyn VfsFile>>;

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create a single directory. The parent must exist.
    fn mkdir(&self, path: &Path, mode: u32) -> PathResult<()>;

    /// Create a directory and any missing ancestors.
    fn mkdir_all(&self, path: &Path, mode: u32) -> PathResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &Path) -> PathResult<()>;

    /// Remove a path and everything beneath it. Missing paths are fine.
    fn remove_all(&self, path: &Path) -> PathResult<()>;

    /// Rename a file or directory, moving any descendants with it.
    fn rename(&self, from: &Path, to: &Path) -> PathResult<()>;

    /// List a directory, sorted by name.
    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get file attributes.
    fn stat(&self, path: &Path) -> PathResult<FileAttr>;

    /// Set permission bits.
    fn chmod(&self, path: &Path, mode: u32) -> PathResult<()>;

    /// Set access and modification times.
    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> PathResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    /// Visit `root` and everything beneath it, depth-first in lexical
    /// order. See [`walk`](crate::walk::walk).
    fn walk(&self, root: &Path, visit: &mut Visit<'_>) -> PathResult<()> {
        crate::walk::walk(self, root, visit)
    }

    /// Read entire file contents.
    fn read_file(&self, path: &Path) -> PathResult<Vec<u8>> {
        let display = path.display().to_string();
        let mut file = self.open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| crate::PathError::new("read", display.as_str(), e))?;
        file.close().map_err(|e| e.at("close", display))?;
        Ok(data)
    }

    /// Write entire file contents, creating or truncating it.
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> PathResult<()> {
        let display = path.display().to_string();
        let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        let mut file = self.open_file(path, flags, mode)?;
        file.write_all(data)
            .map_err(|e| crate::PathError::new("write", display.as_str(), e))?;
        file.close().map_err(|e| e.at("close", display))?;
        Ok(())
    }
}
