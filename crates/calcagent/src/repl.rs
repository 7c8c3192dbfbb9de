use anyhow::Result;
use calcagent_core::orchestrator::Orchestrator;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const PROMPT: &str = "> ";

/// Read commands until `quit`/`exit`/`q`, end of input, or Ctrl-C.
pub async fn run(orchestrator: &Orchestrator) -> Result<()> {
    println!("🧮 calcagent v{}", env!("CARGO_PKG_VERSION"));
    println!("Type an expression, or quit / exit / q to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if is_exit_command(input) {
            break;
        }

        tokio::select! {
            out = orchestrator.process_command(input) => {
                if let Some(text) = out {
                    println!("{text}\n");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\ninterrupted");
                break;
            }
        }
    }

    info!("interactive session closed");
    println!("Goodbye!");
    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q")
}
