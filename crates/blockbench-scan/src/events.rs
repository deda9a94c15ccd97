//! Scan progress callbacks.
//!
//! Workers report through a shared [`ScanEvents`] implementation. Every method
//! has a no-op default so observers only implement what they need.

use blockbench_reduce::{Fingerprint, ReduceError};

use crate::error::ScanError;
use crate::region::{Region, RegionPlan};
use crate::stats::WorkerOutcome;

/// Observer of a scan run. Called concurrently from all worker threads.
pub trait ScanEvents: Send + Sync {
    /// The device was sized and partitioned; no worker has started yet.
    fn plan_ready(&self, _plan: &RegionPlan) {}

    /// A worker is about to open the device for `region`.
    fn worker_started(&self, _region: &Region) {}

    /// A block was compressed from `before` to `after` bytes.
    fn block_compressed(&self, _worker: usize, _offset: u64, _before: usize, _after: usize) {}

    /// A block's fingerprint was already registered; compression skipped.
    fn duplicate_skipped(&self, _worker: usize, _offset: u64, _fingerprint: &Fingerprint) {}

    /// Compressing a block failed; the worker moves on to the next block.
    fn compression_failed(&self, _worker: usize, _offset: u64, _error: &ReduceError) {}

    /// A worker hit a fatal error and stopped scanning its region.
    fn worker_failed(&self, _worker: usize, _error: &ScanError) {}

    /// A worker finished, successfully or not.
    fn worker_finished(&self, _outcome: &WorkerOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl ScanEvents for NullEvents {}
