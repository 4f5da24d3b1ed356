//! MCP wrapper exposing one scan variant of a wrapped tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::invocation::ScanEngine;
use crate::mcp::{McpTool, McpToolResult};
use crate::tools::{ScanTool, VariantInfo};
use crate::Result;

/// `{tool}_{variant}`, e.g. `gobuster_dir`
pub struct McpScanTool {
    name: String,
    description: String,
    tool: Arc<dyn ScanTool>,
    variant: VariantInfo,
    engine: ScanEngine,
}

impl McpScanTool {
    pub fn new(tool: Arc<dyn ScanTool>, variant: VariantInfo, engine: ScanEngine) -> Self {
        Self {
            name: format!("{}_{}", tool.name(), variant.name),
            description: format!("{} ({})", variant.description, tool.description()),
            tool,
            variant,
            engine,
        }
    }

    /// One MCP tool per variant of every tool
    pub fn all(tools: &[Arc<dyn ScanTool>], engine: &ScanEngine) -> Vec<Self> {
        tools
            .iter()
            .flat_map(|tool| {
                tool.variants()
                    .into_iter()
                    .map(|variant| Self::new(Arc::clone(tool), variant, engine.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl McpTool for McpScanTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.variant.input_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let result = self
            .tool
            .run_json(&self.engine, self.variant.name, arguments)
            .await;
        let mut reply = McpToolResult::json(&result)?;
        if result.is_error() {
            reply.is_error = Some(true);
        }
        Ok(reply)
    }
}
