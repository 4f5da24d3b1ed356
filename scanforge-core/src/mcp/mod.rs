//! MCP (Model Context Protocol) server implementation
//!
//! Exposes every scan variant, plus the offline and platform helpers, to
//! agents over newline-delimited JSON-RPC on stdio.

mod protocol;
mod server;
pub mod tools;
mod transport;

pub use protocol::*;
pub use server::*;
pub use transport::*;
