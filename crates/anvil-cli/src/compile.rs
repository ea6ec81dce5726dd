//! Compile command implementation for Anvil CLI.
//!
//! Runs a single sketch through the same pipeline the server uses and writes
//! the artifact to disk.

use std::path::{Path, PathBuf};

use anvil_core::{CompileRequest, Compiler};
use anvil_server::ServerConfig;

/// Compile `sketch` for `board` and write the artifact.
///
/// Without `output`, the artifact is written to the current directory under
/// the name the toolchain gave it.
pub async fn execute(
    sketch: &str,
    board: &str,
    libraries: Vec<String>,
    output: Option<&str>,
) -> anyhow::Result<()> {
    let path = Path::new(sketch);
    if !path.exists() {
        anyhow::bail!("Sketch not found: {}", sketch);
    }

    let source = tokio::fs::read_to_string(path).await?;
    let config = ServerConfig::from_env()?;
    let compiler = Compiler::new(config.compiler);

    let request = CompileRequest::new(source, board).with_libraries(libraries);
    let artifact = compiler.compile(&request).await?;

    let output_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&artifact.filename));
    tokio::fs::write(&output_path, &artifact.bytes).await?;

    println!(
        "Wrote {} ({} bytes)",
        output_path.display(),
        artifact.bytes.len()
    );

    Ok(())
}
