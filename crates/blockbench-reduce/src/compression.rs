//! LZ4 and Zstd block compression for the scan pipeline

use crate::error::ReduceError;
use serde::{Deserialize, Serialize};

/// Default Zstd level used by [`CompressionStrategy::High`].
pub const DEFAULT_HIGH_LEVEL: i32 = 19;

/// Compression strategy selection, resolved once before a scan starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStrategy {
    /// Compression step skipped entirely
    #[default]
    None,
    /// LZ4 block format: speed over ratio
    Fast,
    /// Zstandard: ratio over speed
    High,
}

impl CompressionStrategy {
    /// Map the numeric selector used on the command line (0 = none, 1 = fast, 2 = high).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Fast),
            2 => Some(Self::High),
            _ => None,
        }
    }

    /// True for every strategy except `None`.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether `level` is accepted by the Zstd backend.
    pub fn is_valid_high_level(level: i32) -> bool {
        zstd::compression_level_range().contains(&level)
    }
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Fast => write!(f, "fast(lz4)"),
            Self::High => write!(f, "high(zstd)"),
        }
    }
}

/// Stateless block compressor.
///
/// Callers size their destination with [`Compressor::max_compressed_len`]
/// once and reuse it for every block; [`Compressor::compress_into`] never
/// allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    strategy: CompressionStrategy,
    high_level: i32,
}

impl Compressor {
    /// Create a compressor using the default Zstd level for `High`
    pub fn new(strategy: CompressionStrategy) -> Self {
        Self {
            strategy,
            high_level: DEFAULT_HIGH_LEVEL,
        }
    }

    /// Override the Zstd level used by `High`
    pub fn with_high_level(mut self, level: i32) -> Self {
        self.high_level = level;
        self
    }

    /// Configured strategy
    pub fn strategy(&self) -> CompressionStrategy {
        self.strategy
    }

    /// True unless the strategy is `None`
    pub fn is_enabled(&self) -> bool {
        self.strategy.is_enabled()
    }

    /// Upper bound on the compressed size of `input_len` bytes.
    pub fn max_compressed_len(&self, input_len: usize) -> usize {
        match self.strategy {
            CompressionStrategy::None => input_len,
            CompressionStrategy::Fast => lz4_flex::block::get_maximum_output_size(input_len),
            CompressionStrategy::High => zstd::zstd_safe::compress_bound(input_len),
        }
    }

    /// Compress `input` into `output`, returning the number of bytes written.
    ///
    /// `output` must hold at least `max_compressed_len(input.len())` bytes.
    /// With `None` the input is copied through unchanged.
    pub fn compress_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, ReduceError> {
        let needed = self.max_compressed_len(input.len());
        if output.len() < needed {
            return Err(ReduceError::OutputTooSmall {
                needed,
                available: output.len(),
            });
        }
        match self.strategy {
            CompressionStrategy::None => {
                output[..input.len()].copy_from_slice(input);
                Ok(input.len())
            }
            CompressionStrategy::Fast => lz4_flex::block::compress_into(input, output)
                .map_err(|e| ReduceError::CompressionFailed(e.to_string())),
            CompressionStrategy::High => zstd::bulk::compress_to_buffer(input, output, self.high_level)
                .map_err(|e| ReduceError::CompressionFailed(e.to_string())),
        }
    }
}

/// Block compression backend driven by the scanner.
///
/// Object-safe and sync-capable so one instance serves every worker.
pub trait BlockCompressor: Send + Sync {
    /// False if the compression step should be skipped.
    fn is_enabled(&self) -> bool;

    /// Upper bound on the compressed size of `input_len` bytes.
    fn max_compressed_len(&self, input_len: usize) -> usize;

    /// Compress `input` into `output`, returning the number of bytes written.
    fn compress_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, ReduceError>;

    /// Allocate a scratch buffer large enough for any `input_len` block.
    fn scratch_buffer(&self, input_len: usize) -> Vec<u8> {
        vec![0u8; self.max_compressed_len(input_len)]
    }
}

impl BlockCompressor for Compressor {
    fn is_enabled(&self) -> bool {
        Compressor::is_enabled(self)
    }

    fn max_compressed_len(&self, input_len: usize) -> usize {
        Compressor::max_compressed_len(self, input_len)
    }

    fn compress_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, ReduceError> {
        Compressor::compress_into(self, input, output)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressionStrategy::default())
    }
}
