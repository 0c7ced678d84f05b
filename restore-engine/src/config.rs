//! Configuration management for the restore engine.
//!
//! Loads configuration from a TOML file. Every section has defaults so a
//! minimal file only needs `[storage] client_dir`.

use crate::storage::compression::Compression;
use crate::utils::{RestoreError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Largest payload a single record can carry (4 hex digit length field).
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per backup generation
    pub client_dir: PathBuf,

    /// Where the two reconstruction scratch slots live (defaults to `client_dir`)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Codec used when compressing on the fly while sending (gzip, zstd, none)
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Compression level (1-9 for gzip, 1-22 for zstd)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Content frame size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Write restorestats/verifystats into the generation directory
    #[serde(default = "default_write_stats")]
    pub write_stats: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the peer connects to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_compression() -> String {
    "gzip".to_string()
}

fn default_compression_level() -> i32 {
    9
}

fn default_chunk_size() -> usize {
    16 * 1024
}

fn default_write_stats() -> bool {
    true
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4971))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            compression_level: default_compression_level(),
            chunk_size: default_chunk_size(),
            write_stats: default_write_stats(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| RestoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration rooted at `client_dir`
    pub fn with_client_dir(client_dir: impl Into<PathBuf>) -> Self {
        Config {
            storage: StorageConfig {
                client_dir: client_dir.into(),
                scratch_dir: None,
            },
            restore: RestoreConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.restore.chunk_size == 0 || self.restore.chunk_size > MAX_CHUNK_SIZE {
            return Err(RestoreError::Config(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.restore.chunk_size
            )));
        }
        self.wire_compression()?;
        Ok(())
    }

    /// Codec selected by `[restore] compression`
    pub fn wire_compression(&self) -> Result<Compression> {
        self.restore.compression.parse()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.storage
            .scratch_dir
            .as_deref()
            .unwrap_or(&self.storage.client_dir)
    }
}
