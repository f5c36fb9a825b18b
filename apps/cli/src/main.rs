//! drugwatch CLI: collects drug regulatory decisions from government
//! registers and serves them as JSON.
//!
//! Scrapes the GIF and URPL decision tables, stores new decisions in a
//! local database, and runs the daily ingestion on a schedule.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
