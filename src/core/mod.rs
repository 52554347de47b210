/// Core Server Framework Module
///
/// This module contains the server plumbing around the tools:
/// - server.rs: MCP protocol handling with HTTP and STDIO transports
/// - config.rs: YAML + environment configuration
/// - logging.rs: tracing subscriber setup

pub mod config;
pub mod logging;
pub mod server;
