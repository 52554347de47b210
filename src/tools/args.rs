/// Typed Tool Arguments
///
/// Raw JSON arguments from `tools/call` are checked against an operation's
/// argument list before anything else happens. A call only reaches the
/// network with every required argument present and correctly typed.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use super::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// JSON integer (no strings, no floats)
    Integer,
    /// Non-empty string sent as the `x-api-key` header
    ApiKey,
}

impl ArgKind {
    pub fn json_type(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::ApiKey => "string",
        }
    }
}

#[derive(Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub description: &'static str,
}

/// Caller-supplied upstream credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Validated arguments for one invocation.
#[derive(Debug, Default)]
pub struct Arguments {
    integers: HashMap<&'static str, i64>,
    api_key: Option<ApiKey>,
}

impl Arguments {
    /// Validate `raw` against `specs`. `null` is treated as an empty object;
    /// arguments not named in `specs` are ignored.
    pub fn parse(specs: &[ArgSpec], raw: Value) -> Result<Self, ToolError> {
        let object = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::invalid(format!(
                    "arguments must be a JSON object, got {}",
                    json_type_name(&other)
                )));
            }
        };

        let mut args = Self::default();
        for spec in specs {
            let value = object
                .get(spec.name)
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    ToolError::invalid(format!("missing required argument: {}", spec.name))
                })?;

            match spec.kind {
                ArgKind::Integer => {
                    let n = value.as_i64().ok_or_else(|| {
                        ToolError::invalid(format!(
                            "argument '{}' must be an integer, got {}",
                            spec.name,
                            json_type_name(value)
                        ))
                    })?;
                    args.integers.insert(spec.name, n);
                }
                ArgKind::ApiKey => {
                    // The value itself must never end up in an error message.
                    let key = value.as_str().ok_or_else(|| {
                        ToolError::invalid(format!("argument '{}' must be a string", spec.name))
                    })?;
                    if key.is_empty() {
                        return Err(ToolError::invalid(format!(
                            "argument '{}' must not be empty",
                            spec.name
                        )));
                    }
                    args.api_key = Some(ApiKey(key.to_string()));
                }
            }
        }
        Ok(args)
    }

    pub fn integer(&self, name: &str) -> Result<i64, ToolError> {
        self.integers
            .get(name)
            .copied()
            .ok_or_else(|| ToolError::invalid(format!("missing required argument: {name}")))
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
