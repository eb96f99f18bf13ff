//! Command handlers behind the `anchorage` binary

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod commands;

use commands::{
    anchor::{handle_anchor_command, AnchorCommand},
    chain::{handle_chain_command, ChainCommand},
    common, ingest, verify,
};

/// Top-level arguments
#[derive(Debug, Parser)]
#[command(name = "anchorage")]
#[command(about = "Anchorage - Tamper-Evident Record Commitments", long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".anchorage/config.toml")]
    pub config: PathBuf,

    /// Data directory, overriding config and environment
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Commit, anchor and confirm a JSON array of records
    Ingest {
        /// Path to a JSON array of records
        #[arg(short, long)]
        input: PathBuf,

        /// Records per batch window
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Verify a record's inclusion proof and anchor confirmation
    Verify {
        /// Record ID to verify (e.g. devA:0005)
        #[arg(long)]
        record_id: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulated chain operations
    #[command(subcommand)]
    Chain(ChainCommand),

    /// Anchor inspection
    #[command(subcommand)]
    Anchor(AnchorCommand),
}

/// Execute a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let config = common::load_config(&cli.config, cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Ingest { input, window } => ingest::run(config, &input, window),
        Commands::Verify { record_id, json } => verify::run(config, &record_id, json),
        Commands::Chain(cmd) => handle_chain_command(cmd, config),
        Commands::Anchor(cmd) => handle_anchor_command(cmd, config),
    }
}
