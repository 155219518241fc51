//! Client configuration, read from an optional JSON file.
//!
//! Every field has a default, so a partial file (or none at all) is valid.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use blockworld_engine::terrain::TerrainParams;
use blockworld_engine::world::WorldDims;
use serde::{Deserialize, Serialize};

/// Default tick interval, ~60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Size of a freshly generated world, and the chunk size used to read a
    /// stored one.
    pub world: WorldDims,
    pub terrain: TerrainParams,
    /// Fixed seed for a freshly generated world. Random when unset.
    pub seed: Option<u32>,
    pub tick_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            world: WorldDims::default(),
            terrain: TerrainParams::default(),
            seed: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
