//! MCP Server implementation

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, RwLock};

use crate::mcp::protocol::{
    error_codes, JsonRpcRequest, JsonRpcResponse, McpToolCall, McpToolDefinition, McpToolResult,
};
use crate::mcp::transport::{parse_message, read_line, write_message};
use crate::{Error, Result};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Trait for MCP tools
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (must be unique)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: Value) -> Result<McpToolResult>;
}

/// MCP Server that manages tools and handles requests
pub struct McpServer {
    tools: RwLock<BTreeMap<String, Arc<dyn McpTool>>>,
    server_name: String,
    server_version: String,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            server_name: name.into(),
            server_version: version.into(),
        }
    }

    /// Register a tool, replacing any tool of the same name
    pub async fn register_tool(&self, tool: Arc<dyn McpTool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn tool(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Definitions of every registered tool, sorted by name
    pub async fn definitions(&self) -> Vec<McpToolDefinition> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| McpToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Handle an incoming JSON-RPC message. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "Ignoring MCP notification");
            return None;
        }
        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => self.handle_list_tools(id).await,
            "tools/call" => self.handle_call_tool(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.server_name,
                    "version": self.server_version
                }
            }),
        )
    }

    async fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tool_defs = self.definitions().await;
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_defs }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                "Missing params for tools/call",
            );
        };

        let call: McpToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tool call params: {}", e),
                );
            }
        };

        let Some(tool) = self.tool(&call.name).await else {
            return JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown tool: {}", call.name),
            );
        };

        tracing::info!(tool = %call.name, "MCP tool call");
        let result = tool
            .execute(call.arguments)
            .await
            .unwrap_or_else(|e| McpToolResult::error(e.to_string()));
        match serde_json::to_value(result) {
            Ok(v) => JsonRpcResponse::success(id, v),
            Err(e) => JsonRpcResponse::error(
                id,
                error_codes::INTERNAL_ERROR,
                format!("Failed to serialize tool result: {}", e),
            ),
        }
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Each request runs on its own task, so responses may be written out of
    /// order. Returns once every in-flight request has been answered.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                write_message(&mut writer, &response).await?;
            }
            Ok::<(), Error>(())
        });

        while let Some(line) = read_line(&mut reader).await? {
            let request = match parse_message(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Malformed MCP message: {}", e);
                    if tx.send(JsonRpcResponse::parse_error(&e)).is_err() {
                        break;
                    }
                    continue;
                }
            };

            let server = Arc::clone(&self);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_request(request).await {
                    if tx.send(response).is_err() {
                        tracing::debug!("MCP output closed before response was sent");
                    }
                }
            });
        }

        tracing::debug!("MCP input closed, draining in-flight requests");
        drop(tx);
        writer_task
            .await
            .map_err(|e| Error::Tool(format!("MCP writer task failed: {}", e)))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct EchoTool;

    #[async_trait]
    impl McpTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" }
                },
                "required": ["message"]
            })
        }

        async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
            if let Some(delay) = arguments.get("delay_ms").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let message = arguments
                .get("message")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::Tool("message is required".to_string()))?;
            Ok(McpToolResult::text(message))
        }
    }

    async fn echo_server() -> Arc<McpServer> {
        let server = McpServer::new("test", "1.0.0");
        server.register_tool(Arc::new(EchoTool)).await;
        Arc::new(server)
    }

    #[tokio::test]
    async fn test_server_initialize() {
        let server = McpServer::new("test", "1.0.0");
        let req = JsonRpcRequest::new("initialize").with_id(1);
        let result = server.handle_request(req).await.unwrap().result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "test");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = echo_server().await;
        let req = JsonRpcRequest::new("notifications/initialized");
        assert!(server.handle_request(req).await.is_none());
    }

    #[tokio::test]
    async fn test_server_list_tools() {
        let server = echo_server().await;
        let req = JsonRpcRequest::new("tools/list").with_id(1);
        let result = server.handle_request(req).await.unwrap().result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn test_server_call_tool() {
        let server = echo_server().await;
        let req = JsonRpcRequest::new("tools/call")
            .with_id(1)
            .with_params(serde_json::json!({
                "name": "echo",
                "arguments": { "message": "hello" }
            }));
        let result = server.handle_request(req).await.unwrap().result.unwrap();
        assert_eq!(result["content"][0]["text"], "hello");
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let server = echo_server().await;
        let req = JsonRpcRequest::new("tools/call")
            .with_id(1)
            .with_params(serde_json::json!({ "name": "echo", "arguments": {} }));
        let result = server.handle_request(req).await.unwrap().result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("message is required"));
    }

    #[tokio::test]
    async fn test_server_unknown_method() {
        let server = McpServer::new("test", "1.0.0");
        let req = JsonRpcRequest::new("unknown/method").with_id(1);
        let resp = server.handle_request(req).await.unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_unknown_tool() {
        let server = McpServer::new("test", "1.0.0");
        let req = JsonRpcRequest::new("tools/call")
            .with_id(1)
            .with_params(serde_json::json!({
                "name": "nonexistent",
                "arguments": {}
            }));
        let resp = server.handle_request(req).await.unwrap();
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_serve_answers_concurrently() {
        let server = echo_server().await;
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"message":"slow","delay_ms":300}}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"echo","arguments":{"message":"fast"}}}"#,
            "{broken",
        ]
        .join("\n");

        let (client, server_end) = tokio::io::duplex(64 * 1024);
        server
            .serve(tokio::io::BufReader::new(input.as_bytes()), server_end)
            .await
            .unwrap();

        let mut output = tokio::io::BufReader::new(client);
        let mut responses = Vec::new();
        while let Some(line) = read_line(&mut output).await.unwrap() {
            responses.push(serde_json::from_str::<Value>(&line).unwrap());
        }

        assert_eq!(responses.len(), 3);
        let ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
        assert!(ids.contains(&Value::Null));
        // the slow call was issued first but finishes last
        assert_eq!(responses.last().unwrap()["id"], 1);
        let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], error_codes::PARSE_ERROR);
    }
}
