/// Resources Module
///
/// Read-only MCP resources: a static configuration document and a greeting
/// templated on a caller-supplied name.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const CONFIG_URI: &str = "resource://config";
pub const GREETING_SCHEME: &str = "greetings://";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: &'static str,
    pub text: String,
}

pub fn list() -> Vec<ResourceDescriptor> {
    vec![ResourceDescriptor {
        uri: CONFIG_URI,
        name: "config",
        description: "Provides the application's configuration.",
        mime_type: "application/json",
    }]
}

pub fn templates() -> Vec<ResourceTemplate> {
    vec![ResourceTemplate {
        uri_template: "greetings://{name}",
        name: "personalized_greeting",
        description: "Generates a personalized greeting for the given name.",
        mime_type: "text/plain",
    }]
}

/// Resolve `uri` against the static resource and the greeting template.
pub fn read(uri: &str) -> Result<ResourceContents, ResourceError> {
    if uri == CONFIG_URI {
        return Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: "application/json",
            text: json!({ "version": "1.0", "author": "MyTeam" }).to_string(),
        });
    }

    match uri.strip_prefix(GREETING_SCHEME) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: "text/plain",
            text: format!("Hello, {name}! Welcome to the MCP server."),
        }),
        _ => Err(ResourceError::NotFound(uri.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn config_resource_is_fixed_json() {
        let contents = read(CONFIG_URI).unwrap();
        let parsed: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(parsed, json!({"version": "1.0", "author": "MyTeam"}));
        assert_eq!(contents.mime_type, "application/json");
    }

    #[test]
    fn greeting_is_templated_on_the_name() {
        let contents = read("greetings://Ada").unwrap();
        assert_eq!(contents.text, "Hello, Ada! Welcome to the MCP server.");
        assert_eq!(contents.uri, "greetings://Ada");
    }

    #[test]
    fn unknown_and_malformed_uris_are_not_found() {
        for uri in ["resource://secrets", "greetings://", "greetings://a/b", ""] {
            assert!(matches!(read(uri), Err(ResourceError::NotFound(_))), "{uri}");
        }
    }

    #[test]
    fn descriptors_serialize_in_camel_case() {
        let v = serde_json::to_value(templates()).unwrap();
        assert_eq!(v[0]["uriTemplate"], "greetings://{name}");
        let v = serde_json::to_value(list()).unwrap();
        assert_eq!(v[0]["mimeType"], "application/json");
    }
}
