//! Core build orchestration for the Anvil sketch compilation service.
//!
//! This crate provides:
//! - Per-request workspaces that are always reclaimed
//! - Library provisioning through the toolchain
//! - Toolchain invocation with bounded output capture
//! - Artifact lookup in the build output tree
//! - The [`Compiler`] pipeline composing all of the above
//!
//! # Architecture
//!
//! ```text
//! CompileRequest
//!     │
//!     ├── validate
//!     ├── Workspace::allocate ──► sketch_<id>/sketch_<id>.ino, build/<id>/
//!     ├── LibraryInstaller ──► `arduino-cli lib install <name>` (serialized)
//!     ├── Toolchain::compile ──► `arduino-cli compile --fqbn <board> ...`
//!     ├── artifact::locate ──► first *.bin / *.hex
//!     └── Workspace::release
//!     │
//!     ▼
//! CompiledArtifact
//! ```

pub mod artifact;
pub mod error;
pub mod libraries;
pub mod orchestrator;
pub mod toolchain;
pub mod types;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use libraries::LibraryInstaller;
pub use orchestrator::{Compiler, CompilerConfig, Stage};
pub use toolchain::{CommandOutput, Toolchain, ToolchainConfig};
pub use types::{CompileRequest, CompiledArtifact};
pub use workspace::Workspace;
