//! Play Nature42 in the terminal against Claude.
//!
//! ```text
//! ANTHROPIC_API_KEY=... cargo run -p nature42-core --example play [save-file]
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use nature42_core::{ClaudeOracle, CommandProcessor, EngineConfig, GameSession, SavedGame};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let save_path = std::env::args().nth(1);
    let session = match &save_path {
        Some(path) if std::path::Path::new(path).exists() => {
            let metadata = SavedGame::peek_metadata(path).await?;
            println!(
                "Resuming at {} with {} of 6 keys.",
                metadata.location, metadata.keys_collected
            );
            let processor = CommandProcessor::new(
                Arc::new(ClaudeOracle::from_env()?),
                EngineConfig::from_env()?,
            );
            GameSession::load(path, processor).await?
        }
        _ => GameSession::from_env()?,
    };

    let opening = session.send("look").await?;
    println!("{}\n", opening.message);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        let result = session.send_with_retry(line).await?;
        println!("{}", result.message);
        if !result.suggestions.is_empty() {
            println!("(try: {})", result.suggestions.join(", "));
        }
        println!();

        if let Some(path) = &save_path {
            session.save(path).await?;
        }
        if result.game_complete {
            break;
        }
    }

    Ok(())
}
