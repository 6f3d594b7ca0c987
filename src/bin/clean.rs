//! Re-run the cleaning pass over existing board datasets.

use boardcrawl::{Cleaner, Cli};
use clap::Parser;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let controls = cli.build_controls();
    let cleaner = Cleaner::from_phrases(controls.scrub_phrases());

    for board in controls.boards() {
        let path = controls.output_path(board);
        if !path.exists() {
            warn!(path = %path.display(), "file not found, skipping");
            continue;
        }
        match cleaner.clean_in_place(&path) {
            Ok(rows) => info!(board = %board.name, rows, "dataset cleaned"),
            Err(err) => warn!(board = %board.name, error = %err, "cleaning failed"),
        }
    }

    ExitCode::SUCCESS
}
