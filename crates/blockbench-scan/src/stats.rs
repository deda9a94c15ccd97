//! Per-worker outcomes and aggregate run statistics.

use std::path::PathBuf;
use std::time::Duration;

use blockbench_reduce::Fingerprint;
use serde::{Serialize, Serializer};

use crate::config::ByteAccounting;
use crate::error::ScanError;
use crate::region::{Region, RegionPlan};

const MIB: f64 = 1024.0 * 1024.0;

/// What one worker did with its region.
#[derive(Debug, Default, Serialize)]
pub struct WorkerOutcome {
    /// Worker index
    pub worker: usize,
    /// Region start offset
    pub start_offset: u64,
    /// Blocks assigned to the worker
    pub blocks_assigned: u64,
    /// Blocks fully read
    pub blocks_read: u64,
    /// Blocks skipped as duplicates
    pub blocks_deduplicated: u64,
    /// Blocks compressed successfully
    pub blocks_compressed: u64,
    /// Bytes handed to the compressor for successful compressions
    pub compress_input_bytes: u64,
    /// Bytes produced by the compressor
    pub compressed_bytes: u64,
    /// Blocks whose compression failed
    pub compress_failures: u64,
    /// Error that stopped the worker early, if any
    #[serde(serialize_with = "error_text")]
    pub error: Option<ScanError>,
}

impl WorkerOutcome {
    /// Empty outcome for `region`.
    pub fn new(region: &Region) -> Self {
        Self {
            worker: region.index,
            start_offset: region.start_offset,
            blocks_assigned: region.block_count,
            ..Self::default()
        }
    }

    /// Outcome of a worker that never got to run.
    pub fn failed(region: &Region, error: ScanError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(region)
        }
    }

    /// True if the worker read its whole region.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.blocks_read == self.blocks_assigned
    }
}

fn error_text<S: Serializer>(error: &Option<ScanError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

fn duration_secs<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}

/// Aggregate statistics of one run. Built once after every worker joined.
#[derive(Debug, Serialize)]
pub struct RunStatistics {
    /// Scanned device
    pub device: PathBuf,
    /// Probed device size in bytes
    pub device_bytes: u64,
    /// Block size in bytes
    pub block_size: u64,
    /// Worker count
    pub num_jobs: usize,
    /// Whole blocks on the device
    pub total_blocks: u64,
    /// Blocks assigned to each worker
    pub blocks_per_worker: u64,
    /// Trailing blocks no worker was assigned
    pub unscanned_blocks: u64,
    /// Blocks read across all workers
    pub blocks_read: u64,
    /// Bytes read across all workers
    pub bytes_read: u64,
    /// Blocks skipped as duplicates
    pub blocks_deduplicated: u64,
    /// Blocks compressed
    pub blocks_compressed: u64,
    /// Bytes fed to the compressor
    pub compress_input_bytes: u64,
    /// Bytes out of the compressor
    pub compressed_bytes: u64,
    /// Blocks whose compression failed
    pub compress_failures: u64,
    /// Workers that stopped on an error
    pub failed_workers: usize,
    /// Distinct fingerprints in the dedupe registry
    pub unique_fingerprints: usize,
    /// Byte count used for throughput
    pub accounting: ByteAccounting,
    /// Wall-clock time between dispatch and the join barrier
    #[serde(rename = "elapsed_secs", serialize_with = "duration_secs")]
    pub elapsed: Duration,
    /// MiB/s over `elapsed`; `None` when the run was too fast to measure
    pub throughput_mib_s: Option<f64>,
    /// Per-worker detail, in worker order
    pub workers: Vec<WorkerOutcome>,
    /// Registry contents (only collected at verbosity 2)
    pub fingerprints: Vec<Fingerprint>,
}

impl RunStatistics {
    /// Fold worker outcomes into run totals.
    pub fn collect(
        device: PathBuf,
        plan: &RegionPlan,
        workers: Vec<WorkerOutcome>,
        accounting: ByteAccounting,
        elapsed: Duration,
    ) -> Self {
        let mut stats = Self {
            device,
            device_bytes: plan.device_size,
            block_size: plan.block_size,
            num_jobs: plan.regions.len(),
            total_blocks: plan.total_blocks,
            blocks_per_worker: plan.blocks_per_worker,
            unscanned_blocks: plan.unscanned_blocks,
            blocks_read: 0,
            bytes_read: 0,
            blocks_deduplicated: 0,
            blocks_compressed: 0,
            compress_input_bytes: 0,
            compressed_bytes: 0,
            compress_failures: 0,
            failed_workers: 0,
            unique_fingerprints: 0,
            accounting,
            elapsed,
            throughput_mib_s: None,
            workers: Vec::new(),
            fingerprints: Vec::new(),
        };
        for w in &workers {
            stats.blocks_read += w.blocks_read;
            stats.blocks_deduplicated += w.blocks_deduplicated;
            stats.blocks_compressed += w.blocks_compressed;
            stats.compress_input_bytes += w.compress_input_bytes;
            stats.compressed_bytes += w.compressed_bytes;
            stats.compress_failures += w.compress_failures;
            if w.error.is_some() {
                stats.failed_workers += 1;
            }
        }
        stats.bytes_read = stats.blocks_read * stats.block_size;
        stats.workers = workers;
        stats.throughput_mib_s = throughput(stats.accounted_bytes(), elapsed);
        stats
    }

    /// Bytes the throughput figure is based on.
    pub fn accounted_bytes(&self) -> u64 {
        match self.accounting {
            ByteAccounting::Scanned => self.bytes_read,
            ByteAccounting::Device => self.device_bytes,
        }
    }

    /// Elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Fraction of read blocks skipped as duplicates.
    ///
    /// Returns 0.0 if no blocks were read.
    pub fn dedup_ratio(&self) -> f64 {
        if self.blocks_read == 0 {
            0.0
        } else {
            self.blocks_deduplicated as f64 / self.blocks_read as f64
        }
    }

    /// Compressor input over output.
    ///
    /// Returns 1.0 if nothing was compressed.
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            1.0
        } else {
            self.compress_input_bytes as f64 / self.compressed_bytes as f64
        }
    }
}

fn throughput(bytes: u64, elapsed: Duration) -> Option<f64> {
    if elapsed.is_zero() {
        return None;
    }
    Some(bytes as f64 / elapsed.as_secs_f64() / MIB)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> RegionPlan {
        RegionPlan::new("/dev/x".into(), 10 * 1024 * 1024, 1024 * 1024, 3)
    }

    fn outcome(region: &Region, read: u64) -> WorkerOutcome {
        WorkerOutcome {
            blocks_read: read,
            ..WorkerOutcome::new(region)
        }
    }

    #[test]
    fn scanned_accounting_counts_blocks_read() {
        let plan = plan();
        let workers = plan.regions.iter().map(|r| outcome(r, 3)).collect();
        let stats = RunStatistics::collect(
            "/dev/x".into(),
            &plan,
            workers,
            ByteAccounting::Scanned,
            Duration::from_secs(1),
        );
        assert_eq!(stats.blocks_read, 9);
        assert_eq!(stats.bytes_read, 9 * 1024 * 1024);
        assert_eq!(stats.unscanned_blocks, 1);
        assert_eq!(stats.accounted_bytes(), 9 * 1024 * 1024);
        assert_eq!(stats.throughput_mib_s, Some(9.0));
    }

    #[test]
    fn device_accounting_counts_device_size() {
        let plan = plan();
        let workers = plan.regions.iter().map(|r| outcome(r, 3)).collect();
        let stats = RunStatistics::collect(
            "/dev/x".into(),
            &plan,
            workers,
            ByteAccounting::Device,
            Duration::from_secs(2),
        );
        assert_eq!(stats.accounted_bytes(), 10 * 1024 * 1024);
        assert_eq!(stats.throughput_mib_s, Some(5.0));
    }

    #[test]
    fn zero_elapsed_has_no_throughput() {
        let plan = plan();
        let stats = RunStatistics::collect(
            "/dev/x".into(),
            &plan,
            Vec::new(),
            ByteAccounting::Scanned,
            Duration::ZERO,
        );
        assert_eq!(stats.throughput_mib_s, None);
        assert_eq!(stats.dedup_ratio(), 0.0);
        assert_eq!(stats.compression_ratio(), 1.0);
    }

    #[test]
    fn failed_workers_are_counted() {
        let plan = plan();
        let workers = plan
            .regions
            .iter()
            .map(|r| {
                if r.index == 1 {
                    WorkerOutcome::failed(r, ScanError::WorkerPanicked { worker: 1 })
                } else {
                    outcome(r, 3)
                }
            })
            .collect();
        let stats = RunStatistics::collect(
            "/dev/x".into(),
            &plan,
            workers,
            ByteAccounting::Scanned,
            Duration::from_secs(1),
        );
        assert_eq!(stats.failed_workers, 1);
        assert_eq!(stats.blocks_read, 6);
        assert!(!stats.workers[1].is_complete());
        assert!(stats.workers[0].is_complete());
    }

    #[test]
    fn serializes_error_as_text() {
        let plan = plan();
        let o = WorkerOutcome::failed(&plan.regions[0], ScanError::WorkerPanicked { worker: 0 });
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["error"], "worker 0 panicked");
        let ok = serde_json::to_value(outcome(&plan.regions[0], 1)).unwrap();
        assert!(ok["error"].is_null());
    }
}
