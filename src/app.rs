//! Wires the CLI to tool loading, the LLM driver and the session.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;

use crate::config::{Cli, load_llm_settings};
use crate::llm::ChatCompletionsDriver;
use crate::mcp::registry::ToolService;
use crate::session::{Session, run_interactive};

/// Run one invocation of the CLI.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let request = if cli.interactive {
        None
    } else {
        Some(cli.single_request()?.to_string())
    };
    let settings = load_llm_settings()?;

    tracing::info!(
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configured"
    );

    let toolset = ToolService::new(cli.config_paths(), cli.load_options())
        .load_tools()
        .await;
    tracing::debug!(tools = ?toolset.names(), "Loaded tools");

    let driver = Arc::new(ChatCompletionsDriver::new(settings));
    let mut session = Session::build(
        driver,
        toolset.tools().to_vec(),
        &cli.system_instructions,
        cli.generation_options(),
    );

    let result = match request {
        None => run_interactive(&mut session, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
            .context("interactive session I/O failed"),
        Some(request) => match session.respond(&request).await {
            Ok(response) => {
                println!("{response}");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing request");
                Err(e)
            }
        },
    };

    drop(session);
    toolset.shutdown().await;
    result
}
