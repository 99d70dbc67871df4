//! FM CLI
//!
//! A command-line front end for a language model that acquires tools from
//! locally configured Model Context Protocol servers.
//!
//! # Architecture
//!
//! - **Tool acquisition**: read Claude Desktop and VS Code configs, spawn each
//!   server over stdio, list its tools and adapt them for the model
//! - **LLM driver**: streaming Chat Completions client (`OpenAI`-compatible)
//! - **Session**: transcript plus tool loop, single-shot or interactive
//!
//! # Modules
//!
//! - [`mcp`]: config readers, launcher, enumerator, adapter and aggregator
//! - [`llm`]: LLM driver trait and implementation
//! - [`normalized`]: Unified streaming event model
//! - [`session`]: Session driver and interactive shell
//! - [`config`]: Command-line flags and LLM settings

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]

pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod normalized;
pub mod session;

#[cfg(test)]
mod test_support;
