//! Configuration for the ledger node

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Sequencer configuration
    pub sequencer: SequencerConfig,

    /// Input limits
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/revshare"),
            service_name: "revshare-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_json: false,
            rocksdb: RocksDBConfig::default(),
            sequencer: SequencerConfig::default(),
            limits: Limits::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Sequencer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Height of the first block on an empty store
    pub genesis_height: u64,

    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            genesis_height: 0,
            mailbox_capacity: 1000,
        }
    }
}

/// Maximum text lengths, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Project title
    pub max_title_len: usize,

    /// License type
    pub max_license_len: usize,

    /// Collaborator role
    pub max_role_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_title_len: 256,
            max_license_len: 64,
            max_role_len: 64,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment overrides
    pub fn from_env() -> crate::Result<Self> {
        Config::default().with_env_overrides()
    }

    /// Overlay `REVSHARE_*` environment variables onto this config
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        if let Ok(data_dir) = std::env::var("REVSHARE_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(flag) = std::env::var("REVSHARE_LOG_JSON") {
            self.log_json = flag
                .parse()
                .map_err(|_| crate::Error::Config(format!("REVSHARE_LOG_JSON: bad bool {:?}", flag)))?;
        }

        if let Ok(height) = std::env::var("REVSHARE_GENESIS_HEIGHT") {
            self.sequencer.genesis_height = height.parse().map_err(|_| {
                crate::Error::Config(format!("REVSHARE_GENESIS_HEIGHT: bad integer {:?}", height))
            })?;
        }

        Ok(self)
    }
}
