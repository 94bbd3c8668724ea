//! VFS error types.
//!
//! Two layers: [`VfsError`] says *what* went wrong, [`PathError`] says which
//! operation on which path hit it. Namespace calls return [`PathError`];
//! handle I/O returns plain [`io::Error`]s built from a [`VfsError`].

use std::io;
use thiserror::Error;

/// Underlying cause of a filesystem failure.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("file does not exist")]
    NotFound,

    /// Path already exists.
    #[error("file already exists")]
    AlreadyExists,

    /// Expected a directory.
    #[error("not a directory")]
    NotADirectory,

    /// Expected a file.
    #[error("is a directory")]
    IsADirectory,

    /// Directory not empty.
    #[error("directory not empty")]
    DirectoryNotEmpty,

    /// Read cursor sits past the end of the content.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Handle was already closed.
    #[error("file already closed")]
    Closed,

    /// Write through a handle (or filesystem) without write access.
    #[error("file not opened for writing")]
    ReadOnly,

    /// Read through a handle without read access.
    #[error("file not opened for reading")]
    WriteOnly,

    /// Mutation attempted on a read-only filesystem.
    #[error("read-only file system")]
    ReadOnlyFilesystem,

    /// Content would not fit in memory.
    #[error("file too large")]
    FileTooLarge,

    /// Permission denied.
    #[error("permission denied")]
    PermissionDenied,

    /// Invalid argument.
    #[error("invalid argument")]
    InvalidInput,

    /// I/O error from the host filesystem.
    #[error("{0}")]
    Io(io::Error),
}

impl VfsError {
    /// The closest [`io::ErrorKind`] for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            VfsError::NotFound => io::ErrorKind::NotFound,
            VfsError::AlreadyExists => io::ErrorKind::AlreadyExists,
            VfsError::NotADirectory => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory => io::ErrorKind::IsADirectory,
            VfsError::DirectoryNotEmpty => io::ErrorKind::DirectoryNotEmpty,
            VfsError::UnexpectedEof => io::ErrorKind::UnexpectedEof,
            VfsError::Closed => io::ErrorKind::Other,
            VfsError::ReadOnly | VfsError::WriteOnly => io::ErrorKind::PermissionDenied,
            VfsError::ReadOnlyFilesystem => io::ErrorKind::ReadOnlyFilesystem,
            VfsError::FileTooLarge => io::ErrorKind::FileTooLarge,
            VfsError::PermissionDenied => io::ErrorKind::PermissionDenied,
            VfsError::InvalidInput => io::ErrorKind::InvalidInput,
            VfsError::Io(e) => e.kind(),
        }
    }

    /// Attach the failing operation and path.
    pub fn at(self, op: &'static str, path: impl Into<String>) -> PathError {
        PathError::new(op, path, self)
    }
}

/// Unwraps errors that already went through this module so a cause is never
/// itself a [`PathError`].
impl From<io::Error> for VfsError {
    fn from(e: io::Error) -> Self {
        let ours = e
            .get_ref()
            .is_some_and(|inner| inner.is::<PathError>() || inner.is::<VfsError>());
        if !ours {
            return VfsError::Io(e);
        }

        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<PathError>()) {
            Some(Ok(wrapped)) => {
                let wrapped = *wrapped;
                wrapped.source
            }
            Some(Err(inner)) => match inner.downcast::<VfsError>() {
                Ok(cause) => *cause,
                Err(inner) => VfsError::Io(io::Error::new(kind, inner)),
            },
            None => VfsError::Io(io::Error::from(kind)),
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
///
/// The original value stays reachable through [`io::Error::get_ref`].
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// A failed namespace operation: `{op} {path}: {source}`.
#[derive(Debug, Error)]
#[error("{op} {path}: {source}")]
pub struct PathError {
    /// Operation name, e.g. `"open"` or `"rename"`.
    pub op: &'static str,
    /// Path as the caller passed it.
    pub path: String,
    /// What went wrong. Never another `PathError`.
    pub source: VfsError,
}

impl PathError {
    /// Build a path error, flattening a cause that was itself path-wrapped.
    pub fn new(op: &'static str, path: impl Into<String>, source: impl Into<VfsError>) -> Self {
        Self {
            op,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Swap in the caller's path on an error from a delegate backend.
    pub fn rewrap(self, path: impl Into<String>) -> Self {
        Self {
            op: self.op,
            path: path.into(),
            source: self.source,
        }
    }

    /// The closest [`io::ErrorKind`] for the cause.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    /// Returns true if the cause is [`VfsError::NotFound`] or an I/O error
    /// of that kind.
    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }
}

/// Drops the op and path of a delegate's error so the caller can attach
/// its own.
impl From<PathError> for VfsError {
    fn from(e: PathError) -> Self {
        e.source
    }
}

impl From<PathError> for io::Error {
    fn from(e: PathError) -> Self {
        io::Error::new(e.kind(), e)
    }
}

/// Result of a handle-level or internal operation.
pub type VfsResult<T> = Result<T, VfsError>;

/// Result of a namespace-level operation.
pub type PathResult<T> = Result<T, PathError>;
