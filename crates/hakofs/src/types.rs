//! Core VFS types.
//!
//! These are shared by every backend so callers can swap one for another
//! without touching the code that inspects metadata.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};
use std::time::SystemTime;

/// Directory flag in a mode word (same bit as `S_IFDIR`).
pub const MODE_DIR: u32 = 0o040000;

/// Permission bits, including setuid/setgid/sticky.
pub const MODE_PERM: u32 = 0o7777;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Base name (`/` for the root).
    pub name: String,
    /// Size in bytes, 0 for directories.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Permission bits, plus [`MODE_DIR`] for directories.
    pub mode: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last access time.
    pub atime: SystemTime,
}

impl FileAttr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Permission bits without the type flag.
    pub fn perm(&self) -> u32 {
        self.mode & MODE_PERM
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Open file flags.
///
/// Compose with `|` the way `O_*` flags are or-ed together. With neither
/// `READ` nor `WRITE` set the handle is read-only, as `O_RDONLY` is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl OpenFlags {
    /// Read access.
    pub const READ: Self = Self {
        read: true,
        ..Self::NONE
    };

    /// Write access only.
    pub const WRITE: Self = Self {
        write: true,
        ..Self::NONE
    };

    /// Read and write access.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        ..Self::NONE
    };

    /// Create if missing.
    pub const CREATE: Self = Self {
        create: true,
        ..Self::NONE
    };

    /// Writes always go to the end.
    pub const APPEND: Self = Self {
        append: true,
        ..Self::NONE
    };

    /// Truncate existing content (needs write access).
    pub const TRUNCATE: Self = Self {
        truncate: true,
        ..Self::NONE
    };

    /// With `CREATE`: fail if the path exists.
    pub const EXCLUSIVE: Self = Self {
        exclusive: true,
        ..Self::NONE
    };

    const NONE: Self = Self {
        read: false,
        write: false,
        append: false,
        create: false,
        truncate: false,
        exclusive: false,
    };

    /// Flags used by `create`: read-write, create, truncate.
    pub fn create_truncate() -> Self {
        Self::READ_WRITE | Self::CREATE | Self::TRUNCATE
    }

    /// Whether reads are allowed through the handle.
    pub fn readable(&self) -> bool {
        self.read || !self.writable()
    }

    /// Whether writes are allowed through the handle. Append implies write.
    pub fn writable(&self) -> bool {
        self.write || self.append
    }

    /// Whether this open may change the namespace or content.
    pub fn mutates(&self) -> bool {
        self.writable() || self.create || self.truncate
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
            append: self.append || rhs.append,
            create: self.create || rhs.create,
            truncate: self.truncate || rhs.truncate,
            exclusive: self.exclusive || rhs.exclusive,
        }
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
    }

    #[test]
    fn test_dir_entry() {
        let file = DirEntry::file("test.txt");
        assert_eq!(file.name, "test.txt");
        assert!(file.kind.is_file());

        let dir = DirEntry::directory("subdir");
        assert!(dir.kind.is_dir());
    }

    #[test]
    fn test_open_flags() {
        let read = OpenFlags::READ;
        assert!(read.readable());
        assert!(!read.writable());

        // O_CREATE alone is O_RDONLY | O_CREATE.
        let create = OpenFlags::CREATE;
        assert!(create.readable());
        assert!(!create.writable());
        assert!(create.mutates());

        let wo = OpenFlags::WRITE | OpenFlags::APPEND;
        assert!(!wo.readable());
        assert!(wo.writable());
        assert!(wo.append);

        let mut flags = OpenFlags::create_truncate();
        flags |= OpenFlags::EXCLUSIVE;
        assert!(flags.read && flags.write && flags.create && flags.truncate && flags.exclusive);
    }

    #[test]
    fn test_perm() {
        let attr = FileAttr {
            name: "d".into(),
            size: 0,
            kind: FileType::Directory,
            mode: 0o755 | MODE_DIR,
            mtime: SystemTime::UNIX_EPOCH,
            atime: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(attr.perm(), 0o755);
        assert!(attr.is_dir());
    }
}
