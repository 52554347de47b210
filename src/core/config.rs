/// Server Configuration
///
/// Configuration is read from an optional YAML file and then overridden by
/// environment variables, so container deployments can run with env only.
///
/// YAML layout:
/// ```yaml
/// server:
///   name: lists-mcp-bridge
///   transport: both
///   port: 8000
/// upstream:
///   base_url: https://roascraft.onrender.com
///   timeout_secs: 30
///   operations:
///     get_all_user_lists: http://localhost:3000
/// ```
///
/// Environment Variables:
/// - MCP_CONFIG: path of the YAML file (default: "mcp.yaml", optional)
/// - SERVER_NAME, SERVER_VERSION
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both"
/// - HOST, PORT, WORKER_THREADS
/// - UPSTREAM_BASE_URL, UPSTREAM_TIMEOUT_SECS, UPSTREAM_CONNECT_TIMEOUT_SECS
/// - UPSTREAM_BASE_URL_<OPERATION>: per-operation root, e.g.
///   UPSTREAM_BASE_URL_GET_ALL_USER_LISTS

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "mcp.yaml";
pub const DEFAULT_BASE_URL: &str = "https://roascraft.onrender.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Which transports the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Line-delimited JSON-RPC on stdin/stdout (MCP Inspector, local clients)
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
    /// Both at once; STDIO runs in a background task
    Both,
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::invalid(format!(
                "invalid transport mode '{other}', must be 'stdio', 'http', or 'both'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Reported in MCP initialize responses
    pub name: String,
    pub version: String,
    pub transport: TransportMode,
    /// Bind address for HTTP mode
    pub host: String,
    pub port: u16,
    /// Actix worker threads; `None` picks CPU count capped at 16
    pub workers: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: "lists-mcp-bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            transport: TransportMode::Both,
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
        }
    }
}

impl ServerSection {
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().min(16))
            .max(1)
    }
}

/// Where and how upstream operations are called.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Root used by every upstream operation without an override
    pub base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Operation name -> root override
    pub operations: BTreeMap<String, String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            operations: BTreeMap::new(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Root bound to `operation`: its override if any, else the default root.
    pub fn root_for(&self, operation: &str) -> &str {
        self.operations
            .get(operation)
            .map(String::as_str)
            .unwrap_or(&self.base_url)
    }
}

impl ServerConfig {
    /// Load from the process environment: YAML file named by `MCP_CONFIG`
    /// (if any), then environment overrides, then validation.
    pub fn from_env(operation_names: &[&str]) -> Result<Self, ConfigError> {
        let explicit = std::env::var("MCP_CONFIG").ok().map(PathBuf::from);
        let mut config = Self::load(explicit.as_deref())?;
        config.apply_env(|key| std::env::var(key).ok(), operation_names)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the YAML file at `path`. With no explicit path, `mcp.yaml` in the
    /// working directory is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Apply environment overrides. `lookup` abstracts `std::env::var` so the
    /// override rules can be exercised without touching the process env.
    pub fn apply_env<F>(&mut self, lookup: F, operation_names: &[&str]) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SERVER_NAME") {
            self.server.name = v;
        }
        if let Some(v) = lookup("SERVER_VERSION") {
            self.server.version = v;
        }
        if let Some(v) = lookup("MCP_TRANSPORT_MODE") {
            self.server.transport = v.parse()?;
        }
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("WORKER_THREADS") {
            self.server.workers = Some(parse_var("WORKER_THREADS", &v)?);
        }
        if let Some(v) = lookup("UPSTREAM_BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Some(v) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_var("UPSTREAM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("UPSTREAM_CONNECT_TIMEOUT_SECS") {
            self.upstream.connect_timeout_secs = parse_var("UPSTREAM_CONNECT_TIMEOUT_SECS", &v)?;
        }
        for name in operation_names {
            let key = format!("UPSTREAM_BASE_URL_{}", name.to_ascii_uppercase());
            if let Some(v) = lookup(&key) {
                self.upstream.operations.insert((*name).to_string(), v);
            }
        }
        Ok(())
    }

    /// Checks that do not need the operation catalogue. URL and override
    /// validation happens when the registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::invalid("upstream.timeout_secs must be greater than 0"));
        }
        if self.upstream.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "upstream.connect_timeout_secs must be greater than 0",
            ));
        }
        if self.server.workers == Some(0) {
            return Err(ConfigError::invalid("server.workers must be greater than 0"));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::invalid(format!("{key}='{raw}': {e}")))
}
