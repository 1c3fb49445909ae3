use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use undoredo_history::config::resolve_config_path;
use undoredo_history::HistoryConfig;

mod scene;
mod script;

/// Replays a scripted sequence of undoable actions against an in-memory scene.
#[derive(Parser, Debug)]
#[command(name = "undoredo", version, about)]
struct Cli {
    /// JSON script of steps to run.
    script: PathBuf,

    /// History config file (defaults to `UNDOREDO_CONFIG` or `undoredo.json` next to the binary).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every recorded action as JSON after the script finishes.
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(resolve_config_path);
    let config = HistoryConfig::load_or_create(&config_path);
    tracing::info!("Using history config from {}", config_path.display());

    let steps = script::load(&cli.script)?;
    let mut runner = script::Runner::new(config);
    for line in runner.run(&steps)? {
        println!("{line}");
    }

    if cli.dump {
        let json = serde_json::to_string_pretty(&runner.history().all_actions())
            .context("Failed to serialize actions")?;
        println!("{json}");
    }

    Ok(())
}
