//! Anvil compile server.
//!
//! Exposes the compile pipeline from `anvil-core` over HTTP.
//!
//! # Routes
//!
//! - `GET /` - liveness text
//! - `GET /health` - JSON health check
//! - `POST /compile` - compile a sketch, returning the base64-encoded artifact

pub mod config;
pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anvil_core::Compiler;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use routes::{AppState, CompileBody, CompileResponse, create_router};

/// Build the shared application state from configuration.
pub fn app_state(config: &ServerConfig) -> Arc<AppState> {
    Arc::new(AppState {
        compiler: Compiler::new(config.compiler.clone()),
        api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        body_limit: config.body_limit,
    })
}

/// Start the server and run until Ctrl+C.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let state = app_state(&config);

    if let Some(version) = state.compiler.toolchain().version().await {
        tracing::info!(
            "Using {} ({})",
            state.compiler.toolchain().program().display(),
            version
        );
    } else {
        tracing::warn!(
            "Toolchain {} did not report a version; compiles will fail until it is available",
            state.compiler.toolchain().program().display()
        );
    }

    if state.api_key.is_none() {
        tracing::warn!("API_KEY is not set; /compile accepts unauthenticated requests");
    }

    tokio::fs::create_dir_all(state.compiler.workspace_root()).await?;

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::Address(format!("{}:{}", config.host, config.port)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Handle Ctrl+C for graceful shutdown
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
