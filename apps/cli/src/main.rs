//! ClientIntel CLI: enrich a client table with public-web insights.
//!
//! Searches each client by name and state, asks a language model for a
//! summary, tags, and an outreach email, and writes the table back out.

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
