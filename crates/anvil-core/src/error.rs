//! Error types for anvil-core.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for anvil-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving a compile request.
///
/// Each variant carries the payload the caller needs to report it; toolchain
/// diagnostics are kept verbatim.
#[derive(Debug, Error)]
pub enum Error {
    /// A required request field was missing or empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// The toolchain failed to install a library.
    #[error("failed to install library '{library}': {details}")]
    LibraryInstall { library: String, details: String },

    /// The compiler exited unsuccessfully (or could not be run at all).
    #[error("compilation failed: {details}")]
    Compilation { details: String },

    /// The compiler succeeded but left no recognizable artifact behind.
    #[error("no binary produced in {}", build_dir.display())]
    ArtifactNotProduced { build_dir: PathBuf },

    /// Filesystem error while preparing or reading a workspace.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else that should never reach the caller as a toolchain failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an IO error with the path it happened at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
