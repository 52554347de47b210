/// MCP Server Implementation
///
/// This module contains the MCP protocol layer:
/// - JSON-RPC 2.0 request/response structures
/// - `McpServer`, the method router shared by both transports
/// - HTTP transport with Actix Web
/// - STDIO transport for line-based communication
///
/// Tool calls are delegated to the `Invoker`; this layer only maps its
/// results and errors onto MCP wire shapes.

use actix_web::{
    App, HttpResponse, HttpServer, Result,
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::core::config::ServerSection;
use crate::resources;
use crate::tools::{Invoker, ToolError};

/// MCP protocol revision reported in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// JSON-RPC 2.0 error codes
const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
// MCP: resource not found
const RESOURCE_NOT_FOUND: i32 = -32002;

/// Requests a STDIO session handles at once. Further lines wait unread.
const STDIO_MAX_IN_FLIGHT: usize = 64;

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is None for notifications, which never get a response, and
/// `Some(None)` when the member is present but null.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    jsonrpc: String,
    #[serde(default, deserialize_with = "present_id")]
    id: Option<Option<Value>>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<Option<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl MCPResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition as listed by `tools/list`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MCPTool {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Protocol state shared by every transport and worker.
///
/// Holds no per-call state; concurrent requests only share the read-only
/// registry, the pooled HTTP client and the request counter.
pub struct McpServer {
    server_name: String,
    server_version: String,
    invoker: Arc<Invoker>,
    requests_total: AtomicU64,
}

impl McpServer {
    pub fn new(server_name: String, server_version: String, invoker: Arc<Invoker>) -> Self {
        Self {
            server_name,
            server_version,
            invoker,
            requests_total: AtomicU64::new(0),
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Parse one raw JSON-RPC message and handle it.
    ///
    /// Returns None for notifications.
    pub async fn handle_raw(&self, raw: &[u8]) -> Option<MCPResponse> {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparseable JSON-RPC message");
                return Some(MCPResponse::error(
                    Some(Value::Null),
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<MCPRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(MCPResponse::error(
                Some(id.unwrap_or(Value::Null)),
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
            )),
        }
    }

    /// Route one request to its method handler.
    pub async fn handle(&self, request: MCPRequest) -> Option<MCPResponse> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let id = match request.id {
            None => {
                debug!(method = %request.method, "notification received");
                return None;
            }
            Some(None) => {
                return Some(MCPResponse::error(
                    Some(Value::Null),
                    INVALID_REQUEST,
                    "Invalid request: id must not be null",
                ));
            }
            Some(id) => id,
        };

        if request.jsonrpc != "2.0" {
            return Some(MCPResponse::error(
                id,
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => MCPResponse::success(id, self.initialize_result()),
            "ping" => MCPResponse::success(id, json!({})),
            "tools/list" => MCPResponse::success(id, json!({ "tools": self.tools() })),
            "tools/call" => self.call_tool(id, request.params).await,
            "resources/list" => {
                MCPResponse::success(id, json!({ "resources": resources::list() }))
            }
            "resources/templates/list" => MCPResponse::success(
                id,
                json!({ "resourceTemplates": resources::templates() }),
            ),
            "resources/read" => read_resource(id, request.params),
            other => MCPResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            }
        })
    }

    fn tools(&self) -> Vec<MCPTool> {
        self.invoker
            .registry()
            .operations()
            .map(|op| MCPTool {
                name: op.name(),
                description: op.description(),
                input_schema: op.input_schema(),
            })
            .collect()
    }

    async fn call_tool(&self, id: Option<Value>, params: Option<Value>) -> MCPResponse {
        let Some(mut params) = params else {
            return MCPResponse::error(id, INVALID_PARAMS, "Invalid params");
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str).map(str::to_string)
        else {
            return MCPResponse::error(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };
        let arguments = params
            .get_mut("arguments")
            .map(Value::take)
            .unwrap_or(Value::Null);

        match self.invoker.invoke(&tool_name, arguments).await {
            Ok(result) => MCPResponse::success(id, tool_success(result)),
            Err(ToolError::UnknownOperation(name)) => {
                MCPResponse::error(id, METHOD_NOT_FOUND, format!("Unknown tool: {name}"))
            }
            Err(e) => {
                warn!(tool = %tool_name, kind = e.kind(), "tool call failed");
                MCPResponse::success(id, tool_failure(&e))
            }
        }
    }
}

/// Successful tool result. Objects are also exposed as `structuredContent`.
fn tool_success(result: Value) -> Value {
    let mut body = json!({
        "content": [
            {
                "type": "text",
                "text": result.to_string()
            }
        ],
        "isError": false
    });
    if result.is_object() {
        body["structuredContent"] = result;
    }
    body
}

fn tool_failure(err: &ToolError) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": format!("Error: {err}")
            }
        ],
        "structuredContent": err.to_json(),
        "isError": true
    })
}

fn read_resource(id: Option<Value>, params: Option<Value>) -> MCPResponse {
    let Some(uri) = params
        .as_ref()
        .and_then(|p| p.get("uri"))
        .and_then(Value::as_str)
    else {
        return MCPResponse::error(id, INVALID_PARAMS, "Invalid params: missing uri");
    };

    match resources::read(uri) {
        Ok(contents) => MCPResponse::success(id, json!({ "contents": [contents] })),
        Err(e) => MCPResponse::error(id, RESOURCE_NOT_FOUND, e.to_string()),
    }
}

/// Health check endpoint handler.
async fn health(server: web::Data<McpServer>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": server.server_name
    })))
}

/// Metrics endpoint handler: total JSON-RPC messages handled since start.
async fn metrics_handler(server: web::Data<McpServer>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "requests_total": server.requests_total(),
        "status": "ok"
    })))
}

/// MCP JSON-RPC handler. The raw body is parsed here rather than by an
/// extractor so malformed input gets a JSON-RPC parse error, not a 400.
async fn mcp_handler(server: web::Data<McpServer>, body: web::Bytes) -> HttpResponse {
    match server.handle_raw(&body).await {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Accepted().finish(),
    }
}

/// Route table for the HTTP transport.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// The server is configured with:
/// - Worker threads: from config, else CPU count (max 16)
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(server: Arc<McpServer>, section: &ServerSection) -> std::io::Result<()> {
    let bind_addr = format!("{}:{}", section.host, section.port);
    let workers = section.worker_count();
    let server = web::Data::from(server);

    info!(
        name = %section.name,
        version = %section.version,
        bind = %bind_addr,
        workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(server.clone())
            // Enable compression for JSON responses (gzip/brotli)
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %D = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
pub async fn run_server_stdio(server: Arc<McpServer>) -> std::io::Result<()> {
    info!("MCP server starting (STDIO mode)");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve line-delimited JSON-RPC from `input` to `output`.
///
/// Each request line is handled on its own task, so a slow upstream call does
/// not hold up the rest; responses are written by a single writer task in
/// completion order. At most `STDIO_MAX_IN_FLIGHT` requests run at once and
/// the response queue is bounded, so a stalled stdout stops input from being
/// read. Returns once input hits EOF and every in-flight request has been
/// answered.
pub async fn serve_lines<R, W>(server: Arc<McpServer>, input: R, output: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    serve_lines_bounded(server, input, output, STDIO_MAX_IN_FLIGHT).await
}

async fn serve_lines_bounded<R, W>(
    server: Arc<McpServer>,
    input: R,
    output: W,
    max_in_flight: usize,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::with_capacity(8192, input).lines();
    let permits = Arc::new(Semaphore::new(max_in_flight));
    let (tx, mut rx) = mpsc::channel::<MCPResponse>(max_in_flight);

    let writer = tokio::spawn(async move {
        let mut output = BufWriter::with_capacity(8192, output);
        while let Some(response) = rx.recv().await {
            let line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "failed to serialize response");
                    continue;
                }
            };
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            // Flush per response; clients wait on each reply
            output.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let server = server.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_raw(line.as_bytes()).await {
                // The writer only goes away if stdout failed
                let _ = tx.send(response).await;
            }
            drop(permit);
        });
    }

    drop(tx);
    writer.await.map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::invoker::tests::{MockUpstream, invoker_for};
    use actix_web::{http::StatusCode as ActixStatus, test};
    use axum::http::StatusCode;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    fn mcp_server(base_url: &str) -> McpServer {
        let invoker = invoker_for(base_url, Duration::from_secs(5));
        McpServer::new("test-server".into(), "9.9.9".into(), Arc::new(invoker))
    }

    async fn call(server: &McpServer, request: Value) -> Value {
        let raw = serde_json::to_vec(&request).unwrap();
        let response = server.handle_raw(&raw).await.expect("request has an id");
        serde_json::to_value(response).unwrap()
    }

    fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[tokio::test]
    async fn initialize_reports_server_info_and_capabilities() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], "test-server");
        assert_eq!(resp["result"]["serverInfo"]["version"], "9.9.9");
        assert!(resp["result"]["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn tools_list_uses_camel_case_schema_field() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let tools = resp["result"]["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 7);
        let by_id = tools
            .iter()
            .find(|t| t["name"] == "get_user_list_by_id")
            .expect("listed");
        assert_eq!(by_id["inputSchema"]["required"], json!(["list_id", "api_key"]));
        assert!(by_id.get("input_schema").is_none());
    }

    #[tokio::test]
    async fn add_result_is_text_content() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(&server, tool_call(3, "add", json!({"a": 2, "b": 3}))).await;
        assert_eq!(resp["result"]["isError"], false);
        assert_eq!(resp["result"]["content"][0]["text"], "5");
        assert!(resp["result"].get("structuredContent").is_none());
    }

    #[tokio::test]
    async fn upstream_object_is_returned_as_structured_content() {
        let upstream =
            MockUpstream::start(StatusCode::OK, r#"{"lists":[{"id":1,"name":"A"}]}"#).await;
        let server = mcp_server(&upstream.base_url);

        let resp = call(&server, tool_call(4, "get_all_user_lists", json!({"api_key": "k"}))).await;
        let expected = json!({"lists": [{"id": 1, "name": "A"}]});
        assert_eq!(resp["result"]["structuredContent"], expected);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), expected);
    }

    #[tokio::test]
    async fn upstream_failure_is_an_error_result_with_details() {
        let upstream =
            MockUpstream::start(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#).await;
        let server = mcp_server(&upstream.base_url);

        let resp = call(
            &server,
            tool_call(5, "get_user_list_by_id", json!({"list_id": 999, "api_key": "k"})),
        )
        .await;
        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], true);
        let detail = &resp["result"]["structuredContent"]["error"];
        assert_eq!(detail["kind"], "upstream_error");
        assert_eq!(detail["status"], 404);
        assert_eq!(detail["body"], r#"{"error":"not found"}"#);
        assert!(resp["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: "));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_jsonrpc_error() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(&server, tool_call(6, "nope", json!({}))).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(resp["error"]["message"], "Unknown tool: nope");
    }

    #[tokio::test]
    async fn missing_arguments_are_an_error_result() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(&server, tool_call(7, "get_user_list_by_id", json!({"api_key": "k"}))).await;
        assert_eq!(resp["result"]["isError"], true);
        assert_eq!(
            resp["result"]["structuredContent"]["error"]["kind"],
            "invalid_arguments"
        );
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_params() {
        let server = mcp_server("http://127.0.0.1:1");
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 8, "method": "tools/call", "params": {}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call"})).await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn resources_are_listed_and_readable() {
        let server = mcp_server("http://127.0.0.1:1");

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"})).await;
        assert_eq!(resp["result"]["resources"][0]["uri"], "resource://config");

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "resources/templates/list"}),
        )
        .await;
        assert_eq!(
            resp["result"]["resourceTemplates"][0]["uriTemplate"],
            "greetings://{name}"
        );

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read",
                   "params": {"uri": "greetings://Ada"}}),
        )
        .await;
        assert_eq!(
            resp["result"]["contents"][0]["text"],
            "Hello, Ada! Welcome to the MCP server."
        );

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read",
                   "params": {"uri": "resource://missing"}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = mcp_server("http://127.0.0.1:1");

        let resp = server.handle_raw(b"{not json").await.expect("parse errors are answered");
        let resp = serde_json::to_value(resp).unwrap();
        assert_eq!(resp["error"]["code"], PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 10})).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
        assert_eq!(resp["id"], 10);

        let resp = call(&server, json!({"jsonrpc": "1.0", "id": 11, "method": "ping"})).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 12, "method": "sampling/create"})).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 13, "method": "ping"})).await;
        assert_eq!(resp["result"], json!({}));
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = mcp_server("http://127.0.0.1:1");
        let raw = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_raw(raw).await.is_none());
        assert_eq!(server.requests_total(), 1);
    }

    #[tokio::test]
    async fn null_id_is_answered_as_invalid_request() {
        let server = mcp_server("http://127.0.0.1:1");
        let response = server
            .handle_raw(br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("null id is answered");
        let resp = serde_json::to_value(response).unwrap();
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
        assert_eq!(resp["id"], Value::Null);
        assert!(resp.get("result").is_none());
    }

    #[tokio::test]
    async fn stdio_caps_requests_in_flight() {
        let upstream = MockUpstream::start_with_delay(
            StatusCode::OK,
            "{}",
            Duration::from_millis(100),
        )
        .await;
        let server = Arc::new(mcp_server(&upstream.base_url));

        let input = (1..=12)
            .map(|id| {
                tool_call(id, "get_user_list_by_id", json!({"list_id": id, "api_key": "k"}))
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n");

        let (writer, mut reader) = tokio::io::duplex(1 << 20);
        serve_lines_bounded(server, input.as_bytes(), writer, 3)
            .await
            .expect("serve");

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        assert_eq!(output.lines().count(), 12);
        assert_eq!(upstream.requests().len(), 12);
        assert!(upstream.peak_in_flight() <= 3, "peak {}", upstream.peak_in_flight());
    }

    #[tokio::test]
    async fn stdio_answers_every_request_line() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"credits":12}"#).await;
        let server = Arc::new(mcp_server(&upstream.base_url));

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}).to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            String::new(),
            tool_call(2, "get_credits_for_list_enrichment", json!({"list_id": 4, "api_key": "k"}))
                .to_string(),
            tool_call(3, "add", json!({"a": 40, "b": 2})).to_string(),
        ]
        .join("\n");

        let (writer, mut reader) = tokio::io::duplex(1 << 20);
        serve_lines(server, input.as_bytes(), writer).await.expect("serve");

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        let responses: HashMap<u64, Value> = output
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap())
            .map(|v| (v["id"].as_u64().unwrap(), v))
            .collect();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[&1]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(responses[&2]["result"]["structuredContent"], json!({"credits": 12}));
        assert_eq!(responses[&3]["result"]["content"][0]["text"], "42");
        assert_eq!(upstream.requests()[0].path, "/lists/4/credits");
    }

    #[actix_rt::test]
    async fn http_transport_routes_jsonrpc() {
        let server = web::Data::new(mcp_server("http://127.0.0.1:1"));
        let app = test::init_service(App::new().app_data(server.clone()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/mcp")
            .insert_header(("content-type", "application/json"))
            .set_payload(tool_call(1, "add", json!({"a": 2, "b": 3})).to_string())
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["result"]["content"][0]["text"], "5");

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload("{broken")
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["error"]["code"], PARSE_ERROR);

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), ActixStatus::ACCEPTED);
    }

    #[actix_rt::test]
    async fn http_health_and_metrics() {
        let server = web::Data::new(mcp_server("http://127.0.0.1:1"));
        let app = test::init_service(App::new().app_data(server.clone()).configure(routes)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "ok");
        assert_eq!(resp["service"], "test-server");

        let req = test::TestRequest::post()
            .uri("/mcp")
            .set_payload(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .to_request();
        let _ = test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["requests_total"], 1);
    }
}
