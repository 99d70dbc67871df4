//! Model Context Protocol (MCP) tool acquisition.
//!
//! Servers are discovered from two configuration sources, spawned as
//! subprocesses speaking MCP over stdio, and their tools are adapted for the
//! language model.
//!
//! # Configuration
//!
//! Claude Desktop (`claude_desktop_config.json`):
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "time": {
//!       "command": "npx",
//!       "args": ["-y", "@mcpcentral/mcp-time"]
//!     }
//!   }
//! }
//! ```
//!
//! VS Code (`settings.json`, `//` comment lines allowed):
//!
//! ```json
//! {
//!   "mcp": {
//!     "servers": {
//!       "git": { "command": "uvx", "args": ["mcp-server-git"] }
//!     }
//!   }
//! }
//! ```
//!
//! # Tool Naming
//!
//! Tools keep their server-side names. When two servers expose the same
//! name, the first one loaded wins (Claude config before VS Code config).

pub mod adapter;
pub mod config;
pub mod enumerate;
pub mod launcher;
pub mod registry;
pub mod tool;
