//! Error types for scanforge-core

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using scanforge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for scanforge
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(scanforge::config))]
    Config(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(scanforge::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(scanforge::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(scanforge::toml))]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(scanforge::http))]
    Http(#[from] reqwest::Error),

    #[error("Tool error: {0}")]
    #[diagnostic(code(scanforge::tool))]
    Tool(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scan(#[from] ScanError),
}

/// Failure taxonomy for a single invocation.
///
/// None of these are fatal to the host process; the pipeline turns every
/// variant into a [`ScanResult`](crate::records::ScanResult) with
/// `status == error`.
#[derive(Debug, Error, Diagnostic)]
pub enum ScanError {
    #[error("{0}")]
    #[diagnostic(code(scanforge::missing_input))]
    MissingInput(String),

    #[error("{0}")]
    #[diagnostic(code(scanforge::invalid_input))]
    InvalidInput(String),

    #[error(
        "{tool} command not found ({binary}). Please ensure {tool} is installed and in your system PATH."
    )]
    #[diagnostic(code(scanforge::tool_not_found))]
    ToolNotFound { tool: String, binary: String },

    #[error("{tool} timed out after {} seconds", .after.as_secs())]
    #[diagnostic(code(scanforge::timeout))]
    Timeout { tool: String, after: Duration },

    #[error("Failed to parse {tool} output: {message}")]
    #[diagnostic(code(scanforge::parse))]
    Parse { tool: String, message: String },

    #[error("Error: {status} - {body}")]
    #[diagnostic(code(scanforge::upstream))]
    Upstream { status: u16, body: String },

    #[error("Scratch artifact {path}: {source}")]
    #[diagnostic(code(scanforge::artifact))]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {tool}: {source}")]
    #[diagnostic(code(scanforge::io))]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub fn missing_input(message: impl Into<String>) -> Self {
        Self::MissingInput(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
