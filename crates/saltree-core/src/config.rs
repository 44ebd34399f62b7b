//! Retrieval service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::hash::HashAlgorithm;

/// Protocol version constant
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Configuration shared by the server binary and tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hash primitive for leaves and internal nodes
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Tree snapshot path (loaded on start, written on demand)
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Seed records, one hex record per line, used when no snapshot exists
    #[serde(default)]
    pub seed_records_path: Option<PathBuf>,
    /// Refuse inserts beyond this many leaves
    #[serde(default)]
    pub max_leaves: Option<u64>,
    /// Protocol version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl RetrievalConfig {
    /// Create a new configuration from a base directory
    ///
    /// Expects the following structure:
    /// ```text
    /// base_dir/
    ///   tree.snapshot
    ///   records.txt
    /// ```
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();

        Self {
            hash_algorithm: HashAlgorithm::default(),
            snapshot_path: Some(base.join("tree.snapshot")),
            seed_records_path: Some(base.join("records.txt")),
            max_leaves: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    pub fn with_max_leaves(mut self, max_leaves: u64) -> Self {
        self.max_leaves = Some(max_leaves);
        self
    }

    /// Keep the tree in memory only
    pub fn without_snapshot(mut self) -> Self {
        self.snapshot_path = None;
        self
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Whether another leaf fits under `max_leaves`
    pub fn allows_insert(&self, current_leaves: u64) -> bool {
        self.max_leaves.map_or(true, |max| current_leaves < max)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from_base_dir("./saltree-data")
    }
}

/// Parse seed records: one hex record per line, blank lines and `#` comments skipped
pub fn parse_seed_records(content: &str) -> crate::Result<Vec<Vec<u8>>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            crate::encoding::decode_hex(line)
                .map_err(|e| crate::Error::InvalidRecord(format!("{}: {}", line, e)))
        })
        .collect()
}
