//! Configuration loading and gateway construction shared by commands

use std::path::Path;
use std::sync::Arc;

use anchorage_core::SystemClock;
use anchorage_pipeline::{config::ENV_DEVICE_SECRET, Gateway, GatewayConfig};
use anchorage_store::FileStore;
use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Resolve configuration: file, then environment, then `--data-dir`
pub fn load_config(path: &Path, data_dir: Option<&Path>) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    config
        .apply_env()
        .context("Invalid ANCHORAGE_* environment override")?;
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    debug!(config = ?path, data_dir = ?config.data_dir, "configuration resolved");
    Ok(config)
}

/// Open the file store and wire a simulated gateway over it
pub fn open_gateway(config: GatewayConfig) -> Result<Gateway> {
    if config.uses_demo_secret() {
        warn!("using the built-in demo device secret; set {ENV_DEVICE_SECRET} for real devices");
    }
    let store = FileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open store at {}", config.data_dir.display()))?;
    Gateway::simulated(config, Arc::new(store), Arc::new(SystemClock))
        .context("Failed to start gateway")
}
