// Path: crates/types/src/config/mod.rs

//! Node configuration structures and the JSON loader.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_max_proposal_size() -> usize {
    2048
}
fn default_proposal_delay_ms() -> u64 {
    5000
}
fn default_vote_delay_ms() -> u64 {
    5000
}
fn default_mst_enable() -> bool {
    false
}
fn default_mst_gossip_period_ms() -> u64 {
    5000
}
fn default_mst_ttl_ms() -> u64 {
    300_000
}
fn default_proposal_limit() -> usize {
    3
}
fn default_gossip_amount() -> usize {
    2
}

/// The node configuration, read from a JSON file at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory for the append-only block files.
    pub block_store_path: PathBuf,
    /// Client-facing port.
    pub torii_port: u16,
    /// Peer-facing port.
    pub internal_port: u16,
    /// Connection string for the world-state backend. For the embedded
    /// backend this is the database file path.
    pub pg_opt: String,
    /// Maximum number of transactions in one proposal.
    #[serde(default = "default_max_proposal_size")]
    pub max_proposal_size: usize,
    /// Milliseconds between empty-round proposal synthesis.
    #[serde(default = "default_proposal_delay_ms")]
    pub proposal_delay: u64,
    /// Milliseconds between vote-ring steps in consensus.
    #[serde(default = "default_vote_delay_ms")]
    pub vote_delay: u64,
    /// Whether the multi-signature transaction processor runs.
    #[serde(default = "default_mst_enable")]
    pub mst_enable: bool,
    /// Milliseconds between multi-signature gossip ticks.
    #[serde(default = "default_mst_gossip_period_ms")]
    pub mst_gossip_period: u64,
    /// Milliseconds a pending multi-signature batch lives before expiry.
    #[serde(default = "default_mst_ttl_ms")]
    pub mst_expiration_time: u64,
    /// Number of prepared proposals retained by the ordering service.
    #[serde(default = "default_proposal_limit")]
    pub proposal_limit: usize,
    /// Peers contacted per multi-signature gossip tick.
    #[serde(default = "default_gossip_amount")]
    pub mst_gossip_amount: usize,
}

impl NodeConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: NodeConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_proposal_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_proposal_size",
                message: "must be at least 1".into(),
            });
        }
        if self.proposal_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "proposal_limit",
                message: "must be at least 1".into(),
            });
        }
        if self.pg_opt.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "pg_opt",
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
