//! `anchorage chain`

use anchorage_pipeline::{ChainHeadFeed, GatewayConfig};
use anyhow::{Context, Result};
use clap::Subcommand;

use super::common;

/// Chain subcommands
#[derive(Debug, Subcommand)]
pub enum ChainCommand {
    /// Append simulated headers and refresh anchor depths
    Grow {
        /// Number of blocks to append
        #[arg(short, long, default_value = "6")]
        blocks: u64,
    },

    /// Show the current chain tip
    Tip,
}

/// Dispatch a chain subcommand
pub fn handle_chain_command(command: ChainCommand, config: GatewayConfig) -> Result<()> {
    let gateway = common::open_gateway(config)?;
    match command {
        ChainCommand::Grow { blocks } => {
            let height = gateway.grow_chain(blocks)?;
            println!("[OK] Appended {blocks} headers");
            println!("  Tip height: {height}");
        }
        ChainCommand::Tip => {
            let tip = gateway
                .feed()
                .tip()?
                .context("Chain feed has no headers")?;
            println!("Height: {}", tip.height);
            println!("Hash: {}", tip.hash);
            println!("Time: {}", tip.time);
        }
    }
    Ok(())
}
