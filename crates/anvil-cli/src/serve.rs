//! Serve command implementation for Anvil CLI.
//!
//! Starts the HTTP compile server.

use anvil_server::ServerConfig;

/// Start the compile server.
///
/// Configuration comes from the environment; `host` and `port` override it.
pub async fn execute(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    println!("\nAnvil - Sketch Compilation Server");
    println!("{}", "─".repeat(50));
    println!("  ◆ Server:    http://{}:{}", config.host, config.port);
    println!(
        "  ◆ Toolchain: {}",
        config.compiler.toolchain.program.display()
    );
    println!(
        "  ◆ Workspace: {}",
        config.compiler.workspace_root.display()
    );
    println!(
        "  ◆ Auth:      {}",
        if config.api_key.is_some() {
            "x-api-key required"
        } else {
            "disabled"
        }
    );
    println!("{}", "─".repeat(50));
    println!("Press Ctrl+C to stop");
    println!();

    anvil_server::serve(config).await?;

    Ok(())
}
