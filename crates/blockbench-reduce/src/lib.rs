#![warn(missing_docs)]

//! blockbench reduction subsystem: block fingerprinting (BLAKE3), dedupe registry, compression (LZ4/Zstd)
//!
//! Per-block path: Block → Fingerprint (BLAKE3/128) → Registry observe → Compress (if new)

pub mod compression;
pub mod error;
pub mod fingerprint;
pub mod registry;

pub use compression::{BlockCompressor, CompressionStrategy, Compressor, DEFAULT_HIGH_LEVEL};
pub use error::ReduceError;
pub use fingerprint::{fingerprint, Fingerprint, FINGERPRINT_LEN};
pub use registry::{DedupRegistry, LockedRegistry, RegistryKind, ShardedRegistry};
