use crate::error::{FmError, FmResult};
use crate::llm::{GenerationOptions, LlmSettings};
use crate::mcp::{
    adapter::SchemaNaming,
    config::ConfigPaths,
    registry::{AllowList, LoadOptions},
};
use clap::Parser;
use config::{Config, Environment};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant.";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// A command-line interface for language models with MCP support
#[derive(Parser, Debug)]
#[command(name = "fm", version = "1.0.0", long_about = None)]
pub struct Cli {
    /// Specify system instructions for the model
    #[arg(long, default_value = DEFAULT_SYSTEM_INSTRUCTIONS)]
    pub system_instructions: String,

    /// Set model temperature (0.0-1.0, default: 0.7)
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f64,

    /// Maximum response tokens
    #[arg(long)]
    pub maximum_response_tokens: Option<u32>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Run in interactive mode
    #[arg(short, long)]
    pub interactive: bool,

    /// Comma-separated list of tool names to enable; an empty string disables all tools
    #[arg(long)]
    pub tools: Option<String>,

    /// Name tool parameters after the input schema's properties
    #[arg(long)]
    pub schema_properties: bool,

    /// Seconds allowed for each MCP server to start and list its tools
    #[arg(long, value_name = "SECS")]
    pub server_timeout: Option<u64>,

    /// Claude Desktop config file to read instead of the platform default
    #[arg(long, value_name = "PATH")]
    pub claude_config: Option<PathBuf>,

    /// VS Code settings file to read instead of the platform defaults (repeatable)
    #[arg(long, value_name = "PATH")]
    pub vscode_config: Vec<PathBuf>,

    /// The request to send to the model
    pub request: Option<String>,
}

impl Cli {
    pub fn allow_list(&self) -> AllowList {
        AllowList::parse(self.tools.as_deref())
    }

    pub fn config_paths(&self) -> ConfigPaths {
        ConfigPaths::discover()
            .with_overrides(self.claude_config.clone(), self.vscode_config.clone())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            allow_list: self.allow_list(),
            naming: if self.schema_properties {
                SchemaNaming::Properties
            } else {
                SchemaNaming::Placeholder
            },
            server_timeout: self.server_timeout.map(Duration::from_secs),
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.maximum_response_tokens,
        }
    }

    /// The request for single-shot mode.
    pub fn single_request(&self) -> FmResult<&str> {
        self.request
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or(FmError::MissingRequest)
    }
}

/// Load LLM settings from defaults and `LLM_*` environment variables.
pub fn load_llm_settings() -> FmResult<LlmSettings> {
    let settings = build_llm_settings().map_err(|e| FmError::Settings(e.to_string()))?;

    if settings.base_url.trim().is_empty() {
        return Err(FmError::Settings("LLM_BASE_URL cannot be empty".to_string()));
    }
    if settings.model.trim().is_empty() {
        return Err(FmError::Settings("LLM_MODEL cannot be empty".to_string()));
    }

    Ok(LlmSettings {
        api_key: settings.api_key.filter(|k| !k.trim().is_empty()),
        ..settings
    })
}

fn build_llm_settings() -> Result<LlmSettings, config::ConfigError> {
    let cfg = Config::builder()
        .set_default("base_url", DEFAULT_BASE_URL)?
        .set_default("model", DEFAULT_MODEL)?
        // E.g. LLM_BASE_URL, LLM_MODEL, LLM_API_KEY
        .add_source(Environment::with_prefix("LLM"))
        .build()?;
    cfg.try_deserialize()
}
