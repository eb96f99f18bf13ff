//! `anchorage verify`

use anchorage_pipeline::{AnchorStatus, GatewayConfig, VerificationReport, VerifyOutcome};
use anyhow::{bail, Result};

use super::common;

/// Verify one record; corruption exits with an error
pub fn run(config: GatewayConfig, record_id: &str, json: bool) -> Result<()> {
    let gateway = common::open_gateway(config)?;
    let outcome = gateway.verify(record_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if let VerifyOutcome::Corrupted(report) = &outcome {
        bail!(
            "stored proof for {} does not reproduce batch root {}",
            report.record_id,
            report.batch_root
        );
    }
    Ok(())
}

fn print_outcome(outcome: &VerifyOutcome) {
    match outcome {
        VerifyOutcome::NotInManifest { record_id } => {
            println!("Record {record_id} not found in any batch manifest.");
        }
        VerifyOutcome::RawRecordMissing {
            record_id,
            batch_root,
        } => {
            println!("Record {record_id} is listed in batch {batch_root} but its raw content is missing.");
        }
        VerifyOutcome::Corrupted(report) | VerifyOutcome::Included(report) => print_report(report),
    }
}

fn print_report(report: &VerificationReport) {
    println!("=== Merkle Proof ===");
    println!("Record ID: {}", report.record_id);
    println!("Batch Root: {}", report.batch_root);
    println!("Leaf index: {}", report.leaf_index);
    println!("Proof len: {}", report.proof_len);
    println!("Proof valid: {}", report.proof_valid);

    println!();
    println!("=== Anchor & SPV ===");
    match &report.anchor {
        AnchorStatus::Unanchored => println!("Anchor not found for this root."),
        AnchorStatus::Anchored {
            receipt_id,
            block_height,
            confirmations,
            spv_confirmed,
        } => {
            let height = block_height.map_or_else(|| "none".to_string(), |h| h.to_string());
            println!("Receipt: {receipt_id}");
            println!("Block height: {height}  Confirmations: {confirmations}");
            println!("SPV confirmed: {spv_confirmed}");
        }
    }
}
