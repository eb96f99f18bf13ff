//! Gateway configuration
//!
//! Resolution order: defaults, then the TOML file (a missing file means
//! defaults), then `ANCHORAGE_*` environment variables. Command-line flags
//! are applied last by the binary.

use std::path::{Path, PathBuf};

use anchorage_core::{AnchorageError, ConfigValidator, DeviceSecret, Result};
use serde::{Deserialize, Serialize};

use crate::ledger::ReanchorPolicy;

/// Environment variable overriding `device_secret`
pub const ENV_DEVICE_SECRET: &str = "ANCHORAGE_DEVICE_SECRET";
/// Environment variable overriding `data_dir`
pub const ENV_DATA_DIR: &str = "ANCHORAGE_DATA_DIR";
/// Environment variable overriding `window_size`
pub const ENV_WINDOW_SIZE: &str = "ANCHORAGE_WINDOW_SIZE";

/// Secret used when nothing else is configured; demo use only
pub const DEMO_DEVICE_SECRET: &str = "demo-device-secret";

const HEX_PREFIX: &str = "hex:";
const MAX_CONFIRM_AFTER_BLOCKS: u64 = 1_000;
const MAX_WINDOW_SIZE: u64 = 1_000_000;

/// Settings for one gateway instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Directory holding the store's changelogs
    pub data_dir: PathBuf,
    /// Records per batch window
    pub window_size: usize,
    /// Device secret; `hex:`-prefixed values are hex-decoded, others used as UTF-8
    pub device_secret: String,
    /// Handling of roots that are anchored twice
    pub reanchor_policy: ReanchorPolicy,
    /// Blocks the simulated chain grows per anchored batch during ingest
    pub confirm_after_blocks: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".anchorage/data"),
            window_size: 100,
            device_secret: DEMO_DEVICE_SECRET.to_string(),
            reanchor_policy: ReanchorPolicy::Overwrite,
            confirm_after_blocks: 1,
        }
    }
}

impl GatewayConfig {
    /// Parse TOML text; absent keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| AnchorageError::config(format!("failed to parse config: {e}")))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnchorageError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| AnchorageError::config(format!("{}: {e}", path.display())))
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AnchorageError::serialization(format!("failed to render config: {e}")))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(secret) = lookup(ENV_DEVICE_SECRET) {
            self.device_secret = secret;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(window) = lookup(ENV_WINDOW_SIZE) {
            self.window_size = window.trim().parse().map_err(|e| {
                AnchorageError::config(format!("{ENV_WINDOW_SIZE}={window:?} is not a number: {e}"))
            })?;
        }
        Ok(())
    }

    /// Decode the configured device secret
    pub fn device_secret(&self) -> Result<DeviceSecret> {
        match self.device_secret.strip_prefix(HEX_PREFIX) {
            Some(encoded) => hex::decode(encoded)
                .map(DeviceSecret::new)
                .map_err(|e| AnchorageError::config(format!("device_secret is not valid hex: {e}"))),
            None => Ok(DeviceSecret::new(self.device_secret.as_bytes().to_vec())),
        }
    }

    /// Whether the built-in demo secret is in use
    pub fn uses_demo_secret(&self) -> bool {
        self.device_secret == DEMO_DEVICE_SECRET
    }

    /// Check every field, reporting all failures at once
    pub fn validate(&self) -> Result<()> {
        let secret = self.device_secret()?;
        let mut validator = ConfigValidator::for_section("gateway");
        validator
            .range("window_size", self.window_size as u64, 1, MAX_WINDOW_SIZE)
            .non_empty("device_secret", secret.as_bytes())
            .range(
                "confirm_after_blocks",
                self.confirm_after_blocks,
                0,
                MAX_CONFIRM_AFTER_BLOCKS,
            )
            .custom(
                "data_dir",
                &self.data_dir,
                |dir: &PathBuf| !dir.as_os_str().is_empty(),
                "must not be empty",
            );
        validator.result()
    }
}
