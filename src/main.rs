//! hobbit-bench - Regression benchmark controller

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::debug!("hobbit-bench starting...");

    if let Err(e) = cli.run().await {
        tracing::error!("hobbit-bench failed: {:#}", e);
        std::process::exit(1);
    }
}
