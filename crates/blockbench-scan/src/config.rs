//! Scan configuration: built once, validated, then shared read-only by every worker.

use std::path::{Path, PathBuf};

use blockbench_reduce::{CompressionStrategy, Compressor, RegistryKind, DEFAULT_HIGH_LEVEL};
use serde::{Deserialize, Serialize};

use crate::device::DEFAULT_ALIGNMENT;
use crate::error::{ScanError, ScanResult};

/// Block size of the plain throughput reader (1 GiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 1024 * 1024 * 1024;
/// Block size when hashing or compression is enabled (10 MiB).
pub const DEFAULT_DEDUP_BLOCK_SIZE: u64 = 10 * 1024 * 1024;
/// Default worker count.
pub const DEFAULT_JOBS: usize = 10;
/// Highest supported verbosity level.
pub const MAX_VERBOSITY: u8 = 2;

/// Which byte count throughput is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ByteAccounting {
    /// Bytes actually read by workers. Excludes dropped trailing blocks and
    /// blocks after a worker's fatal error.
    #[default]
    Scanned,
    /// Full probed device size, regardless of what was read.
    Device,
}

/// Immutable configuration for one scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Device or image file to scan
    pub device: PathBuf,
    /// Block size in bytes; `None` picks a default from the enabled features
    pub block_size: Option<u64>,
    /// Worker count, also the thread pool size
    pub num_jobs: usize,
    /// Fingerprint blocks and skip duplicates
    pub hashing: bool,
    /// Compression applied to non-duplicate blocks
    pub compression: CompressionStrategy,
    /// Zstd level for `CompressionStrategy::High`
    pub high_level: i32,
    /// 0 = quiet, 1 = per-block messages, 2 = also dump the dedupe set
    pub verbosity: u8,
    /// Open the device with `O_DIRECT`
    pub direct_io: bool,
    /// Dedupe registry implementation
    pub registry: RegistryKind,
    /// Byte accounting policy for throughput
    pub accounting: ByteAccounting,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::new(),
            block_size: None,
            num_jobs: DEFAULT_JOBS,
            hashing: false,
            compression: CompressionStrategy::None,
            high_level: DEFAULT_HIGH_LEVEL,
            verbosity: 0,
            direct_io: true,
            registry: RegistryKind::default(),
            accounting: ByteAccounting::default(),
        }
    }
}

impl ScanConfig {
    /// Default configuration for `device`.
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            ..Self::default()
        }
    }

    /// Block size after applying the feature-dependent default.
    pub fn effective_block_size(&self) -> u64 {
        self.block_size.unwrap_or(if self.hashing || self.compression.is_enabled() {
            DEFAULT_DEDUP_BLOCK_SIZE
        } else {
            DEFAULT_BLOCK_SIZE
        })
    }

    /// Compressor for the configured strategy.
    pub fn compressor(&self) -> Compressor {
        Compressor::new(self.compression).with_high_level(self.high_level)
    }

    /// Reject configurations no run can honour.
    pub fn validate(&self) -> ScanResult<()> {
        if self.device.as_os_str().is_empty() {
            return Err(ScanError::InvalidConfig("a device path is required".into()));
        }
        if self.num_jobs == 0 {
            return Err(ScanError::InvalidConfig("num_jobs must be at least 1".into()));
        }
        let block_size = self.effective_block_size();
        if block_size == 0 {
            return Err(ScanError::InvalidConfig("block_size must be non-zero".into()));
        }
        if block_size > isize::MAX as u64 {
            return Err(ScanError::InvalidConfig(format!(
                "block_size {} exceeds addressable memory",
                block_size
            )));
        }
        if self.direct_io && block_size % DEFAULT_ALIGNMENT as u64 != 0 {
            return Err(ScanError::InvalidConfig(format!(
                "block_size {} must be a multiple of {} for direct I/O",
                block_size, DEFAULT_ALIGNMENT
            )));
        }
        if self.verbosity > MAX_VERBOSITY {
            return Err(ScanError::InvalidConfig(format!(
                "verbosity must be 0..={}, got {}",
                MAX_VERBOSITY, self.verbosity
            )));
        }
        if self.compression == CompressionStrategy::High
            && !CompressionStrategy::is_valid_high_level(self.high_level)
        {
            return Err(ScanError::InvalidConfig(format!(
                "zstd level {} out of range",
                self.high_level
            )));
        }
        Ok(())
    }

    /// Load a configuration from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> ScanResult<Self> {
        let config_err = |reason: String| ScanError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| config_err(e.to_string())),
            "json" => serde_json::from_str(&contents).map_err(|e| config_err(e.to_string())),
            _ => Err(config_err(format!("unsupported config file extension: {:?}", ext))),
        }
    }
}
