//! longplay - long-form music mix pipeline
//!
//! Plans a session against the track library, fills the gaps through
//! generation providers, and mixes everything into one continuous
//! program with a timestamped tracklist.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use longplay::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    longplay::cli::run(cli).await
}
