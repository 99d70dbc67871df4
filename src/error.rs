//! Error taxonomy for the tool acquisition pipeline.
//!
//! Per-server and per-source failures are caught where they happen, logged,
//! and turned into "contribute nothing". Only [`FmError::MissingRequest`] and
//! errors from a built session are meant to reach the user.

use std::path::PathBuf;

/// Errors raised by config readers, the launcher, the enumerator and tools.
#[derive(Debug, thiserror::Error)]
pub enum FmError {
    /// A configuration file exists but could not be decoded.
    #[error("invalid configuration file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The server subprocess could not be started.
    #[error("failed to start MCP server '{server}': {source}")]
    Launch {
        server: String,
        #[source]
        source: std::io::Error,
    },

    /// The MCP handshake or transport failed.
    #[error("failed to connect to MCP server '{server}': {message}")]
    Connect { server: String, message: String },

    /// The server rejected or failed `tools/list`.
    #[error("tools/list failed for MCP server '{server}': {message}")]
    List { server: String, message: String },

    /// A tool invocation failed before a result could be produced.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Single-shot mode was started without a request.
    #[error(
        "Request is required in non-interactive mode. Use --interactive flag for interactive mode."
    )]
    MissingRequest,

    /// LLM settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Settings(String),
}

impl FmError {
    pub(crate) fn tool(tool: impl Into<String>, message: impl ToString) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.to_string(),
        }
    }
}

pub type FmResult<T> = Result<T, FmError>;
