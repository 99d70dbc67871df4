//! `fm`: ask a language model a question, with tools from your MCP servers.

use clap::Parser;
use dotenvy::dotenv;
use mimalloc::MiMalloc;

use fm_cli::{app, config::Cli, logging};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    logging::init(cli.debug);

    app::run(cli).await
}
