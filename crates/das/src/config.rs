//! Configuration for the DA client components.
//!
//! Every field has a default so partial JSON documents deserialize.

use das_schema::{DasError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Strategy names accepted in [`RestfulClientAggregatorConfig::strategy`].
pub const SIMPLE_EXPLORE_EXPLOIT_STRATEGY: &str = "simple-explore-exploit";
pub const TESTING_SEQUENTIAL_STRATEGY: &str = "testing-sequential";

/// Top-level DA configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataAvailabilityConfig {
    /// Bound on a whole store or retrieval, in seconds (0 disables it).
    pub request_timeout_secs: u64,
    pub aggregator: AggregatorConfig,
    pub rest_aggregator: RestfulClientAggregatorConfig,
    pub fallback: FallbackConfig,
}

impl Default for DataAvailabilityConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
            aggregator: AggregatorConfig::default(),
            rest_aggregator: RestfulClientAggregatorConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl DataAvailabilityConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DasError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DasError::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Store aggregation across the committee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub enable: bool,
    /// Number of signers that must attest before a certificate is issued.
    pub assumed_honest: u64,
    pub backends: Vec<BackendConfig>,
}

/// One committee member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    /// Base64 encoded BLS public key.
    pub pubkey: String,
    /// Single-bit mask identifying this signer's keyset position.
    pub signermask: u64,
}

/// Retrieval across committee REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestfulClientAggregatorConfig {
    pub enable: bool,
    pub urls: Vec<String>,
    /// Either `simple-explore-exploit` or `testing-sequential`.
    pub strategy: String,
    /// Samples kept per endpoint for ranking.
    pub max_per_endpoint_stats: usize,
    pub simple_explore_exploit: SimpleExploreExploitConfig,
}

impl Default for RestfulClientAggregatorConfig {
    fn default() -> Self {
        Self {
            enable: false,
            urls: Vec::new(),
            strategy: SIMPLE_EXPLORE_EXPLOIT_STRATEGY.to_string(),
            max_per_endpoint_stats: 20,
            simple_explore_exploit: SimpleExploreExploitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleExploreExploitConfig {
    pub explore_iterations: u32,
    pub exploit_iterations: u32,
}

impl Default for SimpleExploreExploitConfig {
    fn default() -> Self {
        Self {
            explore_iterations: 20,
            exploit_iterations: 1000,
        }
    }
}

/// Local read-through cache in front of the committee readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enable: bool,
    /// sled database directory; in-memory storage when unset.
    pub data_dir: Option<PathBuf>,
    /// How long backfilled data is kept (u64::MAX keeps it forever).
    pub retention_seconds: u64,
    pub ignore_retention_write_errors: bool,
    pub prevent_recursive_gets: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enable: false,
            data_dir: None,
            retention_seconds: 21 * 24 * 60 * 60,
            ignore_retention_write_errors: true,
            prevent_recursive_gets: true,
        }
    }
}
