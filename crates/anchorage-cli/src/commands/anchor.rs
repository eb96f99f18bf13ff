//! `anchorage anchor`

use anchorage_core::{Anchor, AnchorageError, Hash32};
use anchorage_pipeline::{Gateway, GatewayConfig};
use anyhow::{Context, Result};
use clap::Subcommand;

use super::common;

/// Anchor subcommands
#[derive(Debug, Subcommand)]
pub enum AnchorCommand {
    /// Show the anchor stored for a batch root
    Show {
        /// Batch root (64 hex characters)
        #[arg(long)]
        root: String,
    },

    /// List every anchor
    List,
}

/// Dispatch an anchor subcommand
pub fn handle_anchor_command(command: AnchorCommand, config: GatewayConfig) -> Result<()> {
    let gateway = common::open_gateway(config)?;
    match command {
        AnchorCommand::Show { root } => {
            let root = Hash32::from_hex(&root).context("Invalid root")?;
            match gateway.ledger().get(&root)? {
                Some(anchor) => {
                    print_anchor(&gateway, &anchor)?;
                    match gateway.batch(&root) {
                        Ok(batch) => println!("  Records: {}", batch.count),
                        Err(AnchorageError::BatchNotFound { .. }) => {
                            println!("  Records: no manifest stored for this root");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                None => println!("Anchor not found for root {root}."),
            }
        }
        AnchorCommand::List => {
            let anchors = gateway.ledger().anchors()?;
            println!("{} anchors", anchors.len());
            for anchor in &anchors {
                print_anchor(&gateway, anchor)?;
            }
        }
    }
    Ok(())
}

fn print_anchor(gateway: &Gateway, anchor: &Anchor) -> Result<()> {
    println!("Root: {}", anchor.merkle_root);
    println!("  State: {:?}", anchor.state());
    println!("  Receipt: {}", anchor.receipt_id);
    println!("  First seen: {}", anchor.first_seen);
    if let (Some(height), Some(hash)) = (anchor.block_height, anchor.block_hash) {
        println!("  Block: {height} ({hash})");
    }
    println!("  Confirmations: {}", anchor.confirmations);
    println!("  SPV confirmed: {}", gateway.spv().is_confirmed(anchor)?);
    Ok(())
}
