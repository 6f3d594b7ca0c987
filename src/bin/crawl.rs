//! Crawl every configured board, then clean the resulting datasets.

use boardcrawl::{crawl_boards, Cleaner, Cli, Renderer};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let controls = Arc::new(cli.build_controls());

    let renderer = match Renderer::launch(controls.wait_timeout()).await {
        Ok(renderer) => Arc::new(renderer),
        Err(err) => {
            error!(error = %err, "renderer launch failed");
            return ExitCode::FAILURE;
        }
    };

    info!(boards = controls.boards().len(), "crawl started");
    let outcome = crawl_boards(Arc::clone(&renderer), Arc::clone(&controls)).await;

    if outcome.is_ok() {
        let cleaner = Cleaner::from_phrases(controls.scrub_phrases());
        for board in controls.boards() {
            let path = controls.output_path(board);
            if !path.exists() {
                warn!(path = %path.display(), "file not found, skipping clean");
                continue;
            }
            match cleaner.clean_in_place(&path) {
                Ok(rows) => info!(board = %board.name, rows, "dataset cleaned"),
                Err(err) => warn!(board = %board.name, error = %err, "cleaning failed"),
            }
        }
    }

    // The renderer is released regardless of how the run went.
    match Arc::try_unwrap(renderer) {
        Ok(renderer) => renderer.close().await,
        Err(_) => warn!("renderer still shared at shutdown"),
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "crawl failed");
            ExitCode::FAILURE
        }
    }
}
