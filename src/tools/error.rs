/// Tool Invocation Errors
///
/// Every failure a tool call can produce. Nothing here is retried or masked:
/// the MCP layer turns each variant into a structured error for the client.

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// The operation name is not in the registry.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A required argument is missing or has the wrong type.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Upstream answered with a non-2xx status. `body` is the raw response text.
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream could not be reached (connect, DNS, timeout).
    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// A 2xx response whose body is not valid JSON.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Stable machine-readable discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperation(_) => "unknown_operation",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport { .. } => "transport_error",
            Self::Decode(_) => "decode_error",
        }
    }

    /// Structured description sent back to MCP clients alongside the text message.
    pub fn to_json(&self) -> Value {
        let mut detail = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        match self {
            Self::Upstream { status, body } => {
                detail["status"] = json!(status);
                detail["body"] = json!(body);
            }
            Self::Transport { timed_out, .. } => {
                detail["timedOut"] = json!(timed_out);
            }
            _ => {}
        }
        json!({ "error": detail })
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_carries_status_and_raw_body() {
        let err = ToolError::Upstream {
            status: 404,
            body: r#"{"error":"not found"}"#.to_string(),
        };
        let v = err.to_json();
        assert_eq!(v["error"]["kind"], "upstream_error");
        assert_eq!(v["error"]["status"], 404);
        assert_eq!(v["error"]["body"], r#"{"error":"not found"}"#);
    }

    #[test]
    fn kinds_are_distinct_per_variant() {
        let kinds = [
            ToolError::UnknownOperation("x".into()).kind(),
            ToolError::invalid("x").kind(),
            ToolError::Upstream { status: 500, body: String::new() }.kind(),
            ToolError::Transport { message: "x".into(), timed_out: true }.kind(),
            ToolError::Decode("x".into()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn transport_error_reports_timeout_flag() {
        let v = ToolError::Transport { message: "operation timed out".into(), timed_out: true }
            .to_json();
        assert_eq!(v["error"]["timedOut"], true);
        assert!(v["error"].get("status").is_none());
    }
}
