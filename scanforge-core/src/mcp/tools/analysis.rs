//! MCP wrappers for offline helpers that never launch a process

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScanError;
use crate::mcp::{McpTool, McpToolResult};
use crate::pillage::pillage;
use crate::tools::hashcat::identify_hash;
use crate::Result;

/// Suggests hashcat modes for a hash
pub struct McpIdentifyHashTool;

#[derive(Debug, Deserialize)]
struct IdentifyHashArgs {
    #[serde(default)]
    hash: String,
}

#[async_trait]
impl McpTool for McpIdentifyHashTool {
    fn name(&self) -> &str {
        "hashcat_identify"
    }

    fn description(&self) -> &str {
        "Guess the hash type of a hash string from its length and prefix, returning candidate hashcat modes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "hash": {
                    "type": "string",
                    "description": "The hash to identify (e.g. \"5f4dcc3b5aa765d61d8327deb882cf99\")"
                }
            },
            "required": ["hash"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let args: IdentifyHashArgs = serde_json::from_value(arguments)?;
        if args.hash.trim().is_empty() {
            return Err(ScanError::missing_input("No hash specified for identification.").into());
        }
        let candidates = identify_hash(&args.hash);
        McpToolResult::json(&serde_json::json!({
            "hash": args.hash.trim(),
            "candidates": candidates,
        }))
    }
}

/// Pulls addresses, versions, contacts and secrets out of text
pub struct McpPillageTool;

#[derive(Debug, Deserialize)]
struct PillageArgs {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl McpTool for McpPillageTool {
    fn name(&self) -> &str {
        "pillage_text"
    }

    fn description(&self) -> &str {
        "Extract IP addresses, software versions, e-mail addresses, phone numbers, URLs and credentials from tool output or any other text."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to analyse, such as a banner or raw scan output"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let args: PillageArgs = serde_json::from_value(arguments)?;
        McpToolResult::json(&pillage(&args.text))
    }
}
