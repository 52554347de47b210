/// MCP Server Entry Point
///
/// Loads configuration (see `core::config` for the YAML layout and the
/// environment variables), builds the operation registry and invoker once,
/// then serves MCP over STDIO, HTTP, or both.

mod core;
mod resources;
mod tools;

use std::sync::Arc;
use tracing::{error, info};

use crate::core::config::{ConfigError, ServerConfig, TransportMode};
use crate::core::{logging, server};
use crate::tools::{Invoker, Registry, registry};

fn build_server(config: &ServerConfig) -> Result<Arc<server::McpServer>, ConfigError> {
    let registry = Arc::new(Registry::from_config(&config.upstream)?);
    let invoker = Arc::new(Invoker::new(registry, &config.upstream)?);
    Ok(Arc::new(server::McpServer::new(
        config.server.name.clone(),
        config.server.version.clone(),
        invoker,
    )))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    logging::init_tracing();

    let config = match ServerConfig::from_env(&registry::operation_names()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let mcp = match build_server(&config) {
        Ok(mcp) => mcp,
        Err(e) => {
            error!(error = %e, "failed to build operation registry");
            std::process::exit(1);
        }
    };

    info!(
        base_url = %config.upstream.base_url,
        timeout_secs = config.upstream.timeout_secs,
        transport = ?config.server.transport,
        "configuration loaded"
    );

    match config.server.transport {
        TransportMode::Stdio => server::run_server_stdio(mcp).await,
        TransportMode::Http => server::run_server_http(mcp, &config.server).await,
        TransportMode::Both => {
            // STDIO in the background so MCP Inspector can attach while HTTP serves
            let stdio_mcp = mcp.clone();
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_mcp).await {
                    error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(mcp, &config.server).await;

            // If HTTP server exits, abort STDIO task
            stdio_handle.abort();
            http_result
        }
    }
}
