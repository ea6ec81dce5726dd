//! Per-request compile pipeline.
//!
//! ```text
//! Validated ─► WorkspaceAllocated ─► SourceWritten ─► LibrariesInstalled
//!     ─► Compiled ─► ArtifactLocated ─► ArtifactRead ─► (released) ─► Encoded
//! ```
//!
//! Any failure short-circuits to the caller. Once a workspace exists it is
//! released on every path, after the artifact has been read into memory.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::artifact;
use crate::error::{Error, Result};
use crate::libraries::LibraryInstaller;
use crate::toolchain::{Toolchain, ToolchainConfig};
use crate::types::{CompileRequest, CompiledArtifact};
use crate::workspace::Workspace;

/// Configuration for the compile pipeline.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory under which per-request workspaces are created.
    pub workspace_root: PathBuf,

    /// How to run the external toolchain.
    pub toolchain: ToolchainConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            toolchain: ToolchainConfig::default(),
        }
    }
}

/// Pipeline stage reached by a request, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Source and board are present; nothing exists on disk yet.
    Validated,
    /// Both workspace directories exist.
    WorkspaceAllocated,
    /// The sketch file has been written.
    SourceWritten,
    /// Every requested library is installed.
    LibrariesInstalled,
    /// The toolchain exited successfully.
    Compiled,
    /// A `.bin` or `.hex` file was found in the build directory.
    ArtifactLocated,
    /// The artifact is in memory; the workspace can go.
    ArtifactRead,
    /// The artifact has been encoded for transport. Reached by the HTTP layer,
    /// after the workspace has been released.
    Encoded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validated => "validated",
            Stage::WorkspaceAllocated => "workspace-allocated",
            Stage::SourceWritten => "source-written",
            Stage::LibrariesInstalled => "libraries-installed",
            Stage::Compiled => "compiled",
            Stage::ArtifactLocated => "artifact-located",
            Stage::ArtifactRead => "artifact-read",
            Stage::Encoded => "encoded",
        };
        f.write_str(name)
    }
}

/// Turns compile requests into artifacts.
///
/// Cheap to clone; clones share the library install lock. Requests handled
/// concurrently never share a workspace.
#[derive(Debug, Clone)]
pub struct Compiler {
    workspace_root: PathBuf,
    toolchain: Toolchain,
    installer: LibraryInstaller,
}

impl Compiler {
    /// Create a compiler from its configuration.
    pub fn new(config: CompilerConfig) -> Self {
        let toolchain = Toolchain::new(config.toolchain);
        Self {
            workspace_root: config.workspace_root,
            installer: LibraryInstaller::new(toolchain.clone()),
            toolchain,
        }
    }

    /// The toolchain this compiler drives.
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Root directory for workspaces.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Run one request through the whole pipeline.
    ///
    /// Validation happens before anything touches the filesystem.
    ///
    /// # Errors
    /// - [`Error::Validation`] if source or board is empty
    /// - [`Error::LibraryInstall`] if a requested library fails to install
    /// - [`Error::Compilation`] if the toolchain fails
    /// - [`Error::ArtifactNotProduced`] if the build left no artifact
    /// - [`Error::Io`] for workspace filesystem failures
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompiledArtifact> {
        request.validate()?;
        tracing::debug!(board = %request.board, stage = %Stage::Validated, "Stage reached");

        let workspace = Workspace::allocate(&self.workspace_root).await?;
        let id = workspace.id();
        tracing::info!(workspace = %id, board = %request.board, "Compile request started");

        let result = self.build_in(&workspace, request).await;
        workspace.release().await;

        match &result {
            Ok(artifact) => tracing::info!(
                workspace = %id,
                "Produced {} ({} bytes)",
                artifact.filename,
                artifact.bytes.len()
            ),
            Err(e) => tracing::warn!(workspace = %id, "Compile request failed: {}", e),
        }

        result
    }

    async fn build_in(
        &self,
        workspace: &Workspace,
        request: &CompileRequest,
    ) -> Result<CompiledArtifact> {
        let id = workspace.id();
        let trace = |stage: Stage| tracing::debug!(workspace = %id, %stage, "Stage reached");
        trace(Stage::WorkspaceAllocated);

        workspace.write_source(&request.source).await?;
        trace(Stage::SourceWritten);

        self.installer.install_all(&request.libraries).await?;
        trace(Stage::LibrariesInstalled);

        self.toolchain
            .compile(workspace.sketch_dir(), &request.board, workspace.build_dir())
            .await?;
        trace(Stage::Compiled);

        let path = artifact::locate(workspace.build_dir())
            .await?
            .ok_or_else(|| Error::ArtifactNotProduced {
                build_dir: workspace.build_dir().to_path_buf(),
            })?;
        trace(Stage::ArtifactLocated);

        let bytes = fs::read(&path).await.map_err(|e| Error::io(&path, e))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Internal(format!("artifact path has no file name: {}", path.display()))
            })?;
        trace(Stage::ArtifactRead);

        Ok(CompiledArtifact { filename, bytes })
    }
}
