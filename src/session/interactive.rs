//! Line-oriented interactive shell around a [`Responder`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::Responder;

/// Inputs that end the interactive loop, compared case-insensitively.
pub const EXIT_COMMANDS: [&str; 4] = ["quit", "exit", "bye", "q"];

pub fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|command| command.eq_ignore_ascii_case(input))
}

/// Run the read-respond loop until an exit command or end of input.
///
/// Per-turn failures are logged and reported on `output`; the loop keeps
/// going. Only I/O errors on `input` or `output` end it early.
pub async fn run_interactive<S, R, W>(
    session: &mut S,
    mut input: R,
    mut output: W,
) -> std::io::Result<()>
where
    S: Responder + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(
            "🤖 Interactive Foundation Model CLI\n\
             Type your messages and press Enter. Use 'quit' or 'exit' to stop.\n\
             ---\n"
                .as_bytes(),
        )
        .await?;

    match session.respond("").await {
        Ok(greeting) if !greeting.is_empty() => {
            output
                .write_all(format!("Assistant: {greeting}\n").as_bytes())
                .await?;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to get initial response"),
    }

    let mut raw = Vec::new();
    loop {
        output.write_all(b"\n> ").await?;
        output.flush().await?;

        raw.clear();
        if input.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        // Invalid UTF-8 is replaced rather than ending the session.
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();

        if is_exit_command(line) {
            output.write_all("👋 Goodbye!\n".as_bytes()).await?;
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.respond(line).await {
            Ok(reply) => {
                output
                    .write_all(format!("Assistant: {reply}\n").as_bytes())
                    .await?;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing interactive input");
                output
                    .write_all(
                        "❌ Sorry, I encountered an error processing your request.\n".as_bytes(),
                    )
                    .await?;
            }
        }
    }

    output.flush().await
}
