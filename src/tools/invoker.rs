/// Tool Dispatch
///
/// `Invoker` executes one tool call end-to-end: resolve the operation,
/// validate its arguments, then either compute locally or issue exactly one
/// upstream GET and relay the JSON body unchanged.
///
/// The HTTP client is shared and pooled, but it carries no default headers.
/// The caller's key is attached to its own request only, so connection reuse
/// never carries one caller's credential into another caller's call.

use reqwest::Client;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::args::Arguments;
use super::calc;
use super::error::ToolError;
use super::registry::{Binding, LocalOp, Registry, UpstreamBinding};
use crate::core::config::{ConfigError, UpstreamConfig};

/// Header carrying the caller's key on every upstream request.
pub const API_KEY_HEADER: &str = "x-api-key";

pub struct Invoker {
    registry: Arc<Registry>,
    client: Client,
}

impl Invoker {
    pub fn new(registry: Arc<Registry>, config: &UpstreamConfig) -> Result<Self, ConfigError> {
        Self::with_timeouts(registry, config.timeout(), config.connect_timeout())
    }

    /// Build with explicit bounds. `timeout` covers the whole exchange,
    /// including reading the response body.
    ///
    /// Redirects are not followed: a 3xx is reported as an upstream error, so
    /// the key never travels to a host named by a `Location` header.
    pub fn with_timeouts(
        registry: Arc<Registry>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { registry, client })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Execute operation `name` with raw JSON `arguments`.
    ///
    /// # Errors
    ///
    /// - `UnknownOperation` / `InvalidArguments` before any network I/O
    /// - `Upstream` for a non-2xx response (status and raw body kept)
    /// - `Transport` when the upstream cannot be reached in time
    /// - `Decode` when a 2xx body is not JSON
    #[tracing::instrument(name = "tool_call", skip_all, fields(operation = %name))]
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let operation = self.registry.resolve(name)?;
        let args = Arguments::parse(operation.args(), arguments)?;

        match operation.binding() {
            Binding::Local(LocalOp::Add) => calc::add(&args),
            Binding::Upstream(binding) => self.call_upstream(binding, &args).await,
        }
    }

    async fn call_upstream(
        &self,
        binding: &UpstreamBinding,
        args: &Arguments,
    ) -> Result<Value, ToolError> {
        let key = args
            .api_key()
            .ok_or_else(|| ToolError::invalid("missing required argument: api_key"))?;
        let mut key_header = HeaderValue::from_str(key.expose()).map_err(|_| {
            ToolError::invalid("argument 'api_key' contains characters not allowed in a header")
        })?;
        key_header.set_sensitive(true);

        let url = binding.url_for(args)?;
        let started = Instant::now();

        let response = self
            .client
            .request(binding.method.clone(), url)
            .header(API_KEY_HEADER, key_header)
            .send()
            .await
            .map_err(|e| {
                warn!(path = binding.path_template(), error = %e, "upstream request failed");
                ToolError::from(e)
            })?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(
            path = binding.path_template(),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = body.len(),
            "upstream responded"
        );

        if !status.is_success() {
            warn!(
                path = binding.path_template(),
                status = status.as_u16(),
                "upstream returned an error status"
            );
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|e| ToolError::Decode(e.to_string()))
    }
}
