//! Error types for the scan subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Error variants for scan operations.
///
/// `Probe`, `InvalidConfig` and `ConfigFile` abort a run before any worker
/// starts. The rest end a single worker and are reported in its outcome.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The device could not be opened or sized before scheduling.
    #[error("cannot size device {}: {source}", .path.display())]
    Probe {
        /// Device path.
        path: PathBuf,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A worker failed to open its device handle.
    #[error("open of {} failed: {source}", .path.display())]
    Open {
        /// Device path.
        path: PathBuf,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A worker failed to seek to its region start.
    #[error("seek to offset {offset} failed: {source}")]
    Seek {
        /// Requested absolute offset.
        offset: u64,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A read call failed. Interrupted calls land here too.
    #[error("read at offset {offset} failed: {source}")]
    Read {
        /// Absolute offset of the block being read.
        offset: u64,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A read call returned fewer bytes than one block.
    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Absolute offset of the block being read.
        offset: u64,
        /// Block size.
        expected: usize,
        /// Bytes actually returned.
        actual: usize,
    },

    /// Offset or length violates the direct I/O alignment.
    #[error("not aligned: {value} is not a multiple of {alignment}")]
    NotAligned {
        /// Offending offset or length.
        value: u64,
        /// Required alignment.
        alignment: u64,
    },

    /// Block buffer allocation failed.
    #[error("cannot allocate {size} bytes aligned to {align}")]
    Alloc {
        /// Requested size.
        size: usize,
        /// Requested alignment.
        align: usize,
    },

    /// The OS refused to start a worker thread.
    #[error("cannot spawn worker {worker}: {source}")]
    Spawn {
        /// Worker index.
        worker: usize,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("worker {worker} panicked")]
    WorkerPanicked {
        /// Worker index.
        worker: usize,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("config file {}: {reason}", .path.display())]
    ConfigFile {
        /// Path of the file.
        path: PathBuf,
        /// Description of the error.
        reason: String,
    },
}

impl ScanError {
    /// True for errors that terminate the whole run rather than one worker.
    pub fn is_fatal_to_process(&self) -> bool {
        matches!(
            self,
            ScanError::Probe { .. } | ScanError::InvalidConfig(_) | ScanError::ConfigFile { .. }
        )
    }
}
