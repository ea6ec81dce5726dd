//! Library provisioning ahead of a build.
//!
//! Libraries are installed into the toolchain's library directory, which is
//! shared by every request in the process (and by anything else using the
//! same toolchain configuration). Installs are serialized behind one
//! process-wide lock so two requests asking for the same library never run
//! the installer against it at the same time. Other processes sharing the
//! directory are not covered by the lock.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::toolchain::Toolchain;

/// Installs requested libraries one at a time, in request order.
#[derive(Debug, Clone)]
pub struct LibraryInstaller {
    toolchain: Toolchain,
    lock: Arc<Mutex<()>>,
}

impl LibraryInstaller {
    /// Create an installer. Clones share the same lock.
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Install every library in `libraries`, stopping at the first failure.
    ///
    /// An empty list does nothing and never touches the toolchain.
    ///
    /// # Errors
    /// Returns [`crate::Error::LibraryInstall`] for the first library that
    /// failed; later libraries are not attempted.
    pub async fn install_all(&self, libraries: &[String]) -> Result<()> {
        if libraries.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        for library in libraries {
            tracing::info!("Installing library '{}'", library);
            self.toolchain.install_library(library).await?;
        }
        Ok(())
    }
}
