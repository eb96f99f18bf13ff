//! Anchorage gateway CLI
//!
//! Batches records into Merkle commitments, anchors them on the simulated
//! ledger and verifies individual records later.

use anyhow::Result;
use clap::Parser;

use anchorage_cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    anchorage_cli::run(cli)
}
