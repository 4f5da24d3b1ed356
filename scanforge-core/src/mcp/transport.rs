//! MCP stdio transport layer

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::Result;

/// Next non-blank line, or `None` at EOF.
/// MCP uses newline-delimited JSON
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

/// Decode one JSON-RPC message
pub fn parse_message(line: &str) -> Result<JsonRpcRequest> {
    Ok(serde_json::from_str(line)?)
}

/// Write a JSON-RPC response followed by a newline
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut json = serde_json::to_vec(response)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}
