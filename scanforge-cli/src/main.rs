mod args;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scanforge_core::config::{Capabilities, ScanforgeConfig};
use scanforge_core::invocation::ScanEngine;
use scanforge_core::mcp::{tools::register_builtin, McpServer};
use scanforge_core::tools::ToolRegistry;
use tracing_subscriber::EnvFilter;

use args::{Args, Command};

fn load_config(args: &Args) -> Result<ScanforgeConfig> {
    let mut config = match &args.config {
        Some(path) => ScanforgeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScanforgeConfig::load_default(),
    };
    config.resolve_env();
    Ok(config)
}

async fn build_server(config: ScanforgeConfig) -> Arc<McpServer> {
    let capabilities = Capabilities::from_config(&config);
    let registry = ToolRegistry::builtin();
    let server = McpServer::new("scanforge", env!("CARGO_PKG_VERSION"));
    let engine = ScanEngine::new(Arc::new(config));
    let count = register_builtin(&server, &registry, &engine, engine.config(), capabilities).await;
    tracing::info!(count, ?capabilities, "Registered MCP tools");
    Arc::new(server)
}

async fn serve(config: ScanforgeConfig) -> Result<()> {
    let server = build_server(config).await;
    tracing::info!("scanforge MCP server listening on stdio");
    server
        .serve(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}

async fn call(config: ScanforgeConfig, name: &str, arguments: &str) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("Arguments must be valid JSON")?;
    let server = build_server(config).await;
    let Some(tool) = server.tool(name).await else {
        bail!("Unknown tool: {} (run `scanforge tools` for the list)", name);
    };

    let result = tool.execute(arguments).await?;
    println!("{}", result.text_content());
    if result.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

async fn list_tools(config: ScanforgeConfig, json: bool) -> Result<()> {
    let availability = ToolRegistry::builtin().availability(&config);
    let server = build_server(config).await;
    let definitions = server.definitions().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for tool in &availability {
        let location = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not found".to_string());
        println!("{:<14} {:<14} {}", tool.name, tool.binary, location);
    }
    println!();
    for definition in &definitions {
        println!("{}", definition.name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries MCP traffic and results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    match &args.command {
        Command::Serve => serve(config).await,
        Command::Call { tool, arguments } => call(config, tool, arguments).await,
        Command::Tools { json } => list_tools(config, *json).await,
    }
}
