//! `anchorage ingest`

use std::path::Path;

use anchorage_core::Record;
use anchorage_pipeline::GatewayConfig;
use anyhow::{Context, Result};
use tracing::info;

use super::common;

/// Load records from `input` and run them through the gateway
pub fn run(mut config: GatewayConfig, input: &Path, window: Option<usize>) -> Result<()> {
    if let Some(window) = window {
        config.window_size = window;
    }

    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let records = Record::parse_json_array(&text)
        .with_context(|| format!("Invalid records in {}", input.display()))?;
    info!("Loaded {} records from {}", records.len(), input.display());

    let gateway = common::open_gateway(config)?;
    let report = gateway.ingest(&records)?;

    println!(
        "[OK] Ingested {} records into {} batches",
        report.records,
        report.batches.len()
    );
    for batch in &report.batches {
        println!("  Root: {}", batch.merkle_root);
        println!("    Records: {}", batch.count);
        println!("    Receipt: {}", batch.receipt_id);
        match batch.block_height {
            Some(height) => println!(
                "    Confirmed at height {height} ({} confirmations)",
                batch.confirmations
            ),
            None => println!("    Broadcast, awaiting confirmation"),
        }
    }
    Ok(())
}
