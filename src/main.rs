//! agentic-bench - multi-agent conversational traffic benchmark

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentic_bench::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    cli.run().await?;

    Ok(())
}
