#![warn(missing_docs)]

//! blockbench scan subsystem: concurrent direct-I/O block scanner
//!
//! A [`ScanCoordinator`] probes the device, splits it into one region per
//! worker, runs a [`BlockScanner`] per region on its own thread and folds the
//! per-worker outcomes into [`RunStatistics`] once every worker has joined.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod events;
pub mod region;
pub mod report;
pub mod scanner;
pub mod stats;

pub use buffer::AlignedBuffer;
pub use config::{ByteAccounting, ScanConfig, DEFAULT_BLOCK_SIZE, DEFAULT_DEDUP_BLOCK_SIZE, DEFAULT_JOBS};
pub use coordinator::ScanCoordinator;
pub use device::{probe_size, BlockDevice, DEFAULT_ALIGNMENT};
pub use error::{ScanError, ScanResult};
pub use events::{NullEvents, ScanEvents};
pub use region::{Region, RegionPlan};
pub use report::ConsoleReporter;
pub use scanner::BlockScanner;
pub use stats::{RunStatistics, WorkerOutcome};
