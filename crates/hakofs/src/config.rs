//! Filesystem configuration.
//!
//! ```toml
//! backend = "base_path"
//! root = "/srv/data"
//! read_only = true
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::{BasePathBackend, MemoryBackend, ReadOnlyBackend};
use crate::ops::VfsOps;

/// Which storage a configured filesystem sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Ephemeral in-memory tree.
    #[default]
    Memory,
    /// The host filesystem, paths used as given.
    Os,
    /// The host filesystem confined to `root`.
    BasePath,
}

/// Errors from loading or building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("backend {0:?} requires a root")]
    MissingRoot(BackendKind),

    #[error("backend {0:?} does not take a root")]
    UnexpectedRoot(BackendKind),

    #[error("backend {0:?} is not supported on this platform")]
    Unsupported(BackendKind),

    #[error("root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Declarative description of a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub backend: BackendKind,
    /// Host directory for `base_path`.
    pub root: Option<PathBuf>,
    /// Wrap the result in a [`ReadOnlyBackend`].
    pub read_only: bool,
}

impl FsConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Construct the configured backend.
    pub fn build(&self) -> Result<Arc<dyn VfsOps>, ConfigError> {
        let fs: Arc<dyn VfsOps> = match (self.backend, &self.root) {
            (BackendKind::BasePath, None) => return Err(ConfigError::MissingRoot(self.backend)),
            (kind @ (BackendKind::Memory | BackendKind::Os), Some(_)) => {
                return Err(ConfigError::UnexpectedRoot(kind));
            }
            (BackendKind::Memory, None) => Arc::new(MemoryBackend::new()),
            (BackendKind::Os, None) => Self::os_backend(self.backend)?,
            (BackendKind::BasePath, Some(root)) => {
                // must exist; symlinks in it resolve once, here
                let root = dunce::canonicalize(root).map_err(|source| ConfigError::Root {
                    path: root.clone(),
                    source,
                })?;
                Arc::new(BasePathBackend::new(Self::os_backend(self.backend)?, root))
            }
        };

        tracing::debug!(backend = ?self.backend, read_only = self.read_only, "built filesystem");
        if self.read_only {
            Ok(Arc::new(ReadOnlyBackend::new(fs)))
        } else {
            Ok(fs)
        }
    }

    #[cfg(unix)]
    fn os_backend(_kind: BackendKind) -> Result<Arc<dyn VfsOps>, ConfigError> {
        Ok(Arc::new(crate::backends::OsBackend::new()))
    }

    #[cfg(not(unix))]
    fn os_backend(kind: BackendKind) -> Result<Arc<dyn VfsOps>, ConfigError> {
        Err(ConfigError::Unsupported(kind))
    }
}
