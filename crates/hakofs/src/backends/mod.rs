//! VFS backends.
//!
//! Backends implement [`VfsOps`](crate::VfsOps) for different storage
//! types. The wrappers take any other backend behind an `Arc`.

mod base_path;
mod copy_on_write;
mod memory;
#[cfg(unix)]
mod os;
mod read_only;

pub use base_path::BasePathBackend;
pub use copy_on_write::CopyOnWriteBackend;
pub use memory::{MemoryBackend, MemoryFile};
#[cfg(unix)]
pub use os::{OsBackend, OsFile};
pub use read_only::ReadOnlyBackend;
