//! Topology configuration.

use serde::{Deserialize, Serialize};

/// Settings supplied once when a topology is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Racks whose hosts the read-path sort moves behind all others.
    pub master_racks: Vec<String>,
}

impl TopologyConfig {
    /// Configuration key holding the comma-separated master racks.
    pub const MASTER_RACKS_KEY: &'static str = "dfs.master.racks";

    /// Build a config from the raw value of [`Self::MASTER_RACKS_KEY`].
    ///
    /// Entries are trimmed; empty entries are dropped.
    pub fn from_comma_separated(value: &str) -> Self {
        let master_racks = value
            .split(',')
            .map(str::trim)
            .filter(|rack| !rack.is_empty())
            .map(str::to_string)
            .collect();
        Self { master_racks }
    }

    pub fn with_master_racks<I, S>(mut self, racks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.master_racks.extend(racks.into_iter().map(Into::into));
        self
    }
}
