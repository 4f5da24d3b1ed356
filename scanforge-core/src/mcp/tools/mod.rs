//! MCP tool wrappers for scanforge

mod analysis;
mod platforms;
mod scan;

pub use analysis::{McpIdentifyHashTool, McpPillageTool};
pub use platforms::{BugcrowdAction, HackerOneAction, McpBugcrowdTool, McpHackerOneTool};
pub use scan::McpScanTool;

use std::sync::Arc;

use crate::config::{Capabilities, ScanforgeConfig};
use crate::invocation::ScanEngine;
use crate::mcp::McpServer;
use crate::platforms::{BugcrowdClient, HackerOneClient};
use crate::tools::ToolRegistry;

/// Register every scan variant, the offline helpers and whichever platform
/// tools `capabilities` allows. Returns the number of tools registered.
pub async fn register_builtin(
    server: &McpServer,
    registry: &ToolRegistry,
    engine: &ScanEngine,
    config: &ScanforgeConfig,
    capabilities: Capabilities,
) -> usize {
    let mut count = 0;
    for tool in McpScanTool::all(registry.all(), engine) {
        server.register_tool(Arc::new(tool)).await;
        count += 1;
    }

    server.register_tool(Arc::new(McpIdentifyHashTool)).await;
    server.register_tool(Arc::new(McpPillageTool)).await;
    count += 2;

    if capabilities.hackerone {
        if let Some(client) = HackerOneClient::from_config(&config.platforms.hackerone) {
            let client = Arc::new(client);
            for action in HackerOneAction::ALL {
                server
                    .register_tool(Arc::new(McpHackerOneTool::new(Arc::clone(&client), action)))
                    .await;
                count += 1;
            }
        }
    } else {
        tracing::info!("HackerOne credentials not configured, platform tools disabled");
    }

    if capabilities.bugcrowd {
        if let Some(client) = BugcrowdClient::from_config(&config.platforms.bugcrowd) {
            let client = Arc::new(client);
            for action in BugcrowdAction::ALL {
                server
                    .register_tool(Arc::new(McpBugcrowdTool::new(Arc::clone(&client), action)))
                    .await;
                count += 1;
            }
        }
    } else {
        tracing::info!("Bugcrowd credentials not configured, platform tools disabled");
    }

    count
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn registered(toml: &str) -> Vec<String> {
        let config = ScanforgeConfig::parse(toml).unwrap();
        let capabilities = Capabilities::from_config(&config);
        let engine = ScanEngine::new(Arc::new(config.clone()));
        let server = McpServer::new("scanforge", "test");
        let count = register_builtin(
            &server,
            &ToolRegistry::builtin(),
            &engine,
            &config,
            capabilities,
        )
        .await;
        let names: Vec<String> = server.definitions().await.into_iter().map(|d| d.name).collect();
        assert_eq!(names.len(), count);
        names
    }

    #[tokio::test]
    async fn test_platform_tools_absent_without_credentials() {
        let names = registered("").await;
        assert!(names.iter().any(|n| n == "nmap_scan"));
        assert!(names.iter().any(|n| n == "hashcat_identify"));
        assert!(names.iter().any(|n| n == "pillage_text"));
        assert!(!names.iter().any(|n| n.starts_with("hackerone_")));
        assert!(!names.iter().any(|n| n.starts_with("bugcrowd_")));
    }

    #[tokio::test]
    async fn test_platform_tools_follow_capabilities() {
        let names = registered(
            r#"
[platforms.bugcrowd]
api_token = "tok"
"#,
        )
        .await;
        assert_eq!(names.iter().filter(|n| n.starts_with("bugcrowd_")).count(), 4);
        assert!(!names.iter().any(|n| n.starts_with("hackerone_")));
    }
}
