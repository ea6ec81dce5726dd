//! Locating the binary artifact in a build output tree.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Error, Result};

/// File name suffixes recognized as flashable binaries.
pub const ARTIFACT_SUFFIXES: &[&str] = &[".bin", ".hex"];

/// Whether `name` looks like a binary artifact.
pub fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Find the first artifact under `build_dir`.
///
/// Walks the tree depth-first and returns the first regular file whose name
/// ends with one of [`ARTIFACT_SUFFIXES`]. Files in a directory are checked
/// before its subdirectories are descended into. When several candidates
/// exist, which one wins depends on traversal order; no ranking is applied.
///
/// Returns `Ok(None)` if the directory is missing or holds no artifact.
pub async fn locate(build_dir: &Path) -> Result<Option<PathBuf>> {
    let mut stack = vec![build_dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(&dir, e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            // Follows symlinks; dangling links are skipped.
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() && is_artifact_name(&entry.file_name().to_string_lossy()) {
                return Ok(Some(path));
            }
        }
    }

    Ok(None)
}
