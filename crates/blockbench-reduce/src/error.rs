//! Error types for the blockbench-reduce subsystem

/// All errors that can occur while reducing a block
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// Compression operation failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
    /// Destination buffer is smaller than the worst-case compressed size
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall {
        /// Worst-case bound for the input
        needed: usize,
        /// Capacity of the buffer supplied by the caller
        available: usize,
    },
}
