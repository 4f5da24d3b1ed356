//! MCP JSON-RPC protocol types

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// JSON-RPC request or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Messages without an id expect no reply
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Reply to a line that was not valid JSON-RPC; the id is `null`
    pub fn parse_error(message: impl std::fmt::Display) -> Self {
        Self::error(
            Some(Value::Null),
            error_codes::PARSE_ERROR,
            format!("Parse error: {}", message),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Entry in a `tools/list` reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `tools/call` params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `tools/call` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<McpContent>>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl McpToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(vec![McpContent::Text {
                text: content.into(),
            }]),
            is_error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(message)
        }
    }

    /// Pretty-printed JSON as a single text block
    pub fn json<T: Serialize>(value: &T) -> crate::Result<Self> {
        Ok(Self::text(serde_json::to_string_pretty(value)?))
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// All text blocks joined by newlines
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .flatten()
            .map(|c| match c {
                McpContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    Text { text: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_has_no_id() {
        let note: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(note.is_notification());
        let call = JsonRpcRequest::new("tools/list").with_id(7);
        assert!(!call.is_notification());
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_missing_jsonrpc_field_defaults() {
        let req: JsonRpcRequest = serde_json::from_str(r#"{"id":1,"method":"ping"}"#).unwrap();
        assert_eq!(req.jsonrpc, JSONRPC_VERSION);
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let json = serde_json::to_value(JsonRpcResponse::parse_error("eof")).unwrap();
        assert!(json["id"].is_null());
        assert!(json.as_object().unwrap().contains_key("id"));
        assert_eq!(json["error"]["code"], error_codes::PARSE_ERROR);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_tool_result_wire_format() {
        let ok = serde_json::to_value(McpToolResult::text("output")).unwrap();
        assert_eq!(ok["content"][0]["type"], "text");
        assert_eq!(ok["content"][0]["text"], "output");
        assert!(ok.get("isError").is_none());

        let failed = McpToolResult::error("failed");
        assert!(failed.is_error());
        assert_eq!(serde_json::to_value(&failed).unwrap()["isError"], true);
    }

    #[test]
    fn test_json_result_round_trips_through_text() {
        let result = McpToolResult::json(&serde_json::json!({"status": "success"})).unwrap();
        let body: Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(body["status"], "success");
    }

    #[test]
    fn test_tool_call_arguments_default() {
        let call: McpToolCall = serde_json::from_str(r#"{"name":"nmap_scan"}"#).unwrap();
        assert!(call.arguments.is_null());
    }
}
