/// Operation Registry
///
/// The static catalogue of operations and their upstream binding. The
/// catalogue itself is compile-time data; `Registry::from_config` binds each
/// upstream operation to its configured root once at startup, after which the
/// registry is read-only and shared by every invocation.

use reqwest::Method;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::warn;
use url::Url;

use super::args::{ArgKind, ArgSpec, Arguments};
use super::error::ToolError;
use crate::core::config::{ConfigError, UpstreamConfig};

const LIST_ID: ArgSpec = ArgSpec {
    name: "list_id",
    kind: ArgKind::Integer,
    description: "The ID of the list.",
};

const API_KEY: ArgSpec = ArgSpec {
    name: "api_key",
    kind: ArgKind::ApiKey,
    description: "Your API key for authentication.",
};

/// Operations computed in-process without any upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOp {
    Add,
}

#[derive(Debug)]
pub enum Route {
    Local(LocalOp),
    /// GET against the operation's root; `{name}` segments are integer arguments.
    Upstream { path: &'static str },
}

#[derive(Debug)]
pub struct OperationDef {
    pub name: &'static str,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
    pub route: Route,
}

pub static CATALOGUE: &[OperationDef] = &[
    OperationDef {
        name: "add",
        description: "Adds two integer numbers together.",
        args: &[
            ArgSpec { name: "a", kind: ArgKind::Integer, description: "First addend." },
            ArgSpec { name: "b", kind: ArgKind::Integer, description: "Second addend." },
        ],
        route: Route::Local(LocalOp::Add),
    },
    OperationDef {
        name: "get_all_user_lists",
        description: "Fetches all user lists. Returns the lists with details like id, name, \
                      totalContacts and fileUrl.",
        args: &[API_KEY],
        route: Route::Upstream { path: "/api/lists" },
    },
    OperationDef {
        name: "get_user_list_by_id",
        description: "Fetches a specific user list by its list ID.",
        args: &[LIST_ID, API_KEY],
        route: Route::Upstream { path: "/lists/{list_id}" },
    },
    OperationDef {
        name: "get_contacts_for_list",
        description: "Fetches all contacts for a specific list by its list ID.",
        args: &[LIST_ID, API_KEY],
        route: Route::Upstream { path: "/lists/{list_id}/contacts" },
    },
    OperationDef {
        name: "get_sample_list_csv",
        description: "Fetches a sample CSV structure showing the format for uploading a user list.",
        args: &[API_KEY],
        route: Route::Upstream { path: "/lists/template/sample" },
    },
    OperationDef {
        name: "get_credits_for_list_enrichment",
        description: "Fetches the number of credits required to enrich a specific user list.",
        args: &[LIST_ID, API_KEY],
        route: Route::Upstream { path: "/lists/{list_id}/credits" },
    },
    OperationDef {
        name: "get_available_filters_for_list",
        description: "Fetches the available filters for a specific user list that can be \
                      applied while creating an audience.",
        args: &[LIST_ID, API_KEY],
        route: Route::Upstream { path: "/lists/{list_id}/filters" },
    },
];

/// Names of every catalogued operation, in declaration order.
pub fn operation_names() -> Vec<&'static str> {
    CATALOGUE.iter().map(|def| def.name).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

fn parse_template(template: &'static str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Literal(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed '{{' in path template '{template}'"))?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(format!("malformed placeholder in path template '{template}'"));
        }
        segments.push(Segment::Param(name));
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(format!("unmatched '}}' in path template '{template}'"));
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn parse_root(operation: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::invalid(format!("invalid upstream root '{raw}' for '{operation}': {e}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(format!(
            "upstream root '{raw}' for '{operation}' must use http or https"
        )));
    }
    if url.host_str().is_none() || url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::invalid(format!(
            "upstream root '{raw}' for '{operation}' must be a plain base URL"
        )));
    }
    Ok(url)
}

/// How a resolved upstream operation is reached.
#[derive(Debug)]
pub struct UpstreamBinding {
    pub method: Method,
    pub root: Url,
    template: &'static str,
    segments: Vec<Segment>,
}

impl UpstreamBinding {
    pub fn path_template(&self) -> &'static str {
        self.template
    }

    /// Full request URL with path parameters substituted from `args`.
    pub fn url_for(&self, args: &Arguments) -> Result<Url, ToolError> {
        let mut path = String::with_capacity(self.template.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => path.push_str(s),
                Segment::Param(name) => path.push_str(&args.integer(name)?.to_string()),
            }
        }
        let joined = format!("{}{}", self.root.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ToolError::invalid(format!("invalid upstream URL: {e}")))
    }
}

#[derive(Debug)]
pub enum Binding {
    Local(LocalOp),
    Upstream(UpstreamBinding),
}

/// One catalogued operation bound to where it executes.
#[derive(Debug)]
pub struct Operation {
    def: &'static OperationDef,
    binding: Binding,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn description(&self) -> &'static str {
        self.def.description
    }

    pub fn args(&self) -> &'static [ArgSpec] {
        self.def.args
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// JSON Schema advertised in `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for arg in self.def.args {
            properties.insert(
                arg.name.to_string(),
                json!({
                    "type": arg.kind.json_type(),
                    "description": arg.description,
                }),
            );
        }
        let required: Vec<&str> = self.def.args.iter().map(|a| a.name).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Immutable operation lookup table.
#[derive(Debug)]
pub struct Registry {
    operations: Vec<Operation>,
}

impl Registry {
    /// Bind the built-in catalogue to the configured upstream roots.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        Self::build(CATALOGUE, config)
    }

    /// Bind an arbitrary catalogue.
    ///
    /// # Errors
    ///
    /// Fails on duplicate operation names, an invalid root, a root override
    /// that names no upstream operation, or a path placeholder that is not an
    /// integer argument of its operation.
    pub fn build(
        catalogue: &'static [OperationDef],
        config: &UpstreamConfig,
    ) -> Result<Self, ConfigError> {
        let default_root = parse_root("<default>", &config.base_url)?;

        for name in config.operations.keys() {
            let known = catalogue
                .iter()
                .any(|def| def.name == name.as_str() && matches!(def.route, Route::Upstream { .. }));
            if !known {
                return Err(ConfigError::invalid(format!(
                    "upstream override for unknown operation '{name}'"
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut operations = Vec::with_capacity(catalogue.len());
        for def in catalogue {
            if !seen.insert(def.name) {
                return Err(ConfigError::invalid(format!("duplicate operation '{}'", def.name)));
            }

            let binding = match def.route {
                Route::Local(op) => Binding::Local(op),
                Route::Upstream { path } => {
                    let segments = parse_template(path).map_err(ConfigError::Invalid)?;
                    for segment in &segments {
                        if let Segment::Param(param) = segment {
                            let is_integer_arg = def
                                .args
                                .iter()
                                .any(|a| a.name == *param && a.kind == ArgKind::Integer);
                            if !is_integer_arg {
                                return Err(ConfigError::invalid(format!(
                                    "placeholder '{{{param}}}' in '{}' is not an integer argument",
                                    def.name
                                )));
                            }
                        }
                    }

                    let root = parse_root(def.name, config.root_for(def.name))?;
                    if root != default_root {
                        warn!(
                            operation = def.name,
                            root = %root,
                            default_root = %default_root,
                            "operation bound to a different upstream root than the default"
                        );
                    }

                    Binding::Upstream(UpstreamBinding {
                        method: Method::GET,
                        root,
                        template: path,
                        segments,
                    })
                }
            };
            operations.push(Operation { def, binding });
        }

        Ok(Self { operations })
    }

    /// Look up an operation by name.
    pub fn resolve(&self, name: &str) -> Result<&Operation, ToolError> {
        self.operations
            .iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| ToolError::UnknownOperation(name.to_string()))
    }

    /// All operations in catalogue order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }
}
