//! Anvil CLI - compile Arduino sketches over HTTP or locally.

mod compile;
mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anvil")]
#[command(about = "Compile Arduino sketches with an external toolchain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP compile server
    Serve {
        /// Address to bind to (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compile one sketch locally
    Compile {
        /// Path to the sketch source
        sketch: String,

        /// Fully qualified board name (e.g. arduino:avr:uno)
        #[arg(short, long)]
        board: String,

        /// Library to install before compiling (repeatable)
        #[arg(short, long = "library")]
        libraries: Vec<String>,

        /// Output path for the artifact
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            serve::execute(host, port).await?;
        }

        Commands::Compile {
            sketch,
            board,
            libraries,
            output,
        } => {
            compile::execute(&sketch, &board, libraries, output.as_deref()).await?;
        }
    }

    Ok(())
}
