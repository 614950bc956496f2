//! Run profiles loaded from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use symposium_sim::{RunConfig, Scenario};
use symposium_table::TableConfig;

/// Everything needed to set up one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Table settings
    pub table: TableConfig,
    /// Run settings
    pub run: RunConfig,
    /// Table variant
    pub scenario: Scenario,
    /// Wrap forks in an occupancy monitor
    pub monitor: bool,
}

impl Profile {
    /// Load a profile; missing fields take their defaults
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let profile = serde_json::from_str(&raw)?;
        Ok(profile)
    }
}
