//! Per-request build workspaces.
//!
//! Every request gets its own pair of directories under the workspace root,
//! correlated by a random request identifier:
//!
//! ```text
//! <root>/
//! ├── sketch_<id>/
//! │   └── sketch_<id>.ino   # the request's source
//! └── build/
//!     └── <id>/             # toolchain output
//! ```
//!
//! The sketch file stem must match its directory name, the toolchain refuses
//! to build it otherwise.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Extension of the single source file written into each workspace.
pub const SOURCE_EXTENSION: &str = "ino";

/// Name of the directory under the root that holds per-request build output.
pub const BUILD_SUBDIR: &str = "build";

/// An isolated, ephemeral directory tree owned by exactly one request.
///
/// Call [`Workspace::release`] when the request is done. If the handle is
/// dropped without being released (a panic, or the request future being
/// cancelled) the directories are removed on drop: on the runtime's blocking
/// pool when a runtime is available, inline otherwise.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    sketch_dir: PathBuf,
    build_dir: PathBuf,
    released: bool,
}

impl Workspace {
    /// Allocate a fresh workspace under `root`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if either directory cannot be created. Anything
    /// already created is removed before returning.
    pub async fn allocate(root: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let workspace = Self {
            id,
            sketch_dir: root.join(format!("sketch_{id}")),
            build_dir: root.join(BUILD_SUBDIR).join(id.to_string()),
            released: false,
        };

        fs::create_dir_all(&workspace.sketch_dir)
            .await
            .map_err(|e| Error::io(&workspace.sketch_dir, e))?;
        if let Err(e) = fs::create_dir_all(&workspace.build_dir).await {
            let err = Error::io(&workspace.build_dir, e);
            workspace.release().await;
            return Err(err);
        }

        tracing::debug!(workspace = %id, "Allocated workspace under {}", root.display());
        Ok(workspace)
    }

    /// Unique identifier shared by both directories.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Directory holding the sketch source.
    pub fn sketch_dir(&self) -> &Path {
        &self.sketch_dir
    }

    /// Directory the toolchain writes its output into.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Path of the sketch source file.
    pub fn source_path(&self) -> PathBuf {
        self.sketch_dir.join(format!("sketch_{}.{}", self.id, SOURCE_EXTENSION))
    }

    /// Write the request's source text as the workspace's only source file.
    pub async fn write_source(&self, source: &str) -> Result<PathBuf> {
        let path = self.source_path();
        fs::write(&path, source)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Remove both directories.
    ///
    /// Never fails: deletion errors are logged and swallowed.
    pub async fn release(mut self) {
        self.released = true;
        for dir in [&self.sketch_dir, &self.build_dir] {
            match fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    workspace = %self.id,
                    "Failed to remove {}: {}",
                    dir.display(),
                    e
                ),
            }
        }
        tracing::debug!(workspace = %self.id, "Released workspace");
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let id = self.id;
        let dirs = [
            std::mem::take(&mut self.sketch_dir),
            std::mem::take(&mut self.build_dir),
        ];
        let remove = move || {
            for dir in &dirs {
                match std::fs::remove_dir_all(dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!(
                        workspace = %id,
                        "Failed to remove {} on drop: {}",
                        dir.display(),
                        e
                    ),
                }
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(remove);
            }
            Err(_) => remove(),
        }
    }
}
