//! # hakofs
//!
//! An in-memory filesystem behind a pluggable, path-based VFS interface.
//!
//! - [`VfsOps`] - Namespace operations every backend implements
//! - [`VfsFile`] - Open handle speaking `std::io::{Read, Write, Seek}`
//! - [`MemoryBackend`] - Concurrent in-memory tree (testing, scratch space)
//! - [`OsBackend`] - Host filesystem pass-through (unix)
//! - [`BasePathBackend`] / [`ReadOnlyBackend`] - Wrappers over any backend
//! - [`CopyOnWriteBackend`] - Writable layer over a base that is never written
//! - [`FsConfig`] - Build one of the above from TOML
//! - [`walk`] - Depth-first traversal over any backend
//!
//! ```
//! use std::io::{Read, Write};
//! use std::path::Path;
//! use hakofs::{MemoryBackend, VfsOps};
//!
//! let fs = MemoryBackend::new();
//! fs.mkdir_all(Path::new("/notes"), 0o755)?;
//!
//! let mut f = fs.create(Path::new("/notes/today.txt"))?;
//! f.write_all(b"hello")?;
//! f.close()?;
//!
//! let mut text = String::new();
//! fs.open(Path::new("/notes/today.txt"))?.read_to_string(&mut text)?;
//! assert_eq!(text, "hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Paths
//!
//! Every path is normalized before lookup: relative paths are taken from
//! `/`, `.` and repeated separators vanish, and `..` never climbs above the
//! root. `""`, `"."`, `"./"` and `"/"` all name the root.

pub mod backends;
pub mod config;
mod error;
mod ops;
pub mod path;
mod types;
pub mod walk;

pub use backends::{
    BasePathBackend, CopyOnWriteBackend, MemoryBackend, MemoryFile, ReadOnlyBackend,
};
#[cfg(unix)]
pub use backends::{OsBackend, OsFile};
pub use config::{BackendKind, ConfigError, FsConfig};
pub use error::{PathError, PathResult, VfsError, VfsResult};
pub use ops::{VfsFile, VfsOps};
pub use types::{DirEntry, FileAttr, FileType, MODE_DIR, MODE_PERM, OpenFlags};
