/// MCP Server Entry Point
///
/// Reads configuration from the environment (see `core::config`), builds the
/// tool dispatcher and starts the selected transports. Logs go to stderr so
/// STDIO mode keeps stdout for JSON-RPC only.

mod core;
mod tools;

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::config::{ServerConfig, TransportMode};
use crate::core::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let dispatcher = tools::initialize_tools(&config).context("failed to build tool registry")?;
    let state = Arc::new(AppState::new(&config, dispatcher));

    match config.transport {
        TransportMode::Stdio => server::run_server_stdio(state).await?,
        TransportMode::Http => server::run_server_http(&config, state).await?,
        TransportMode::Both => {
            // STDIO runs in the background; the HTTP server owns the process lifetime
            let stdio_state = Arc::clone(&state);
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_state).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(&config, state).await;
            stdio_handle.abort();
            http_result?;
        }
    }

    info!("server stopped");
    Ok(())
}
