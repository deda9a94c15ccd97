//! Console reporting for the `blockbench` binary.

use blockbench_reduce::{Fingerprint, ReduceError};

use crate::error::ScanError;
use crate::events::ScanEvents;
use crate::region::{Region, RegionPlan};
use crate::stats::RunStatistics;

/// Prints scan progress to stdout, gated by verbosity.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    verbosity: u8,
}

impl ConsoleReporter {
    /// Create a reporter for the given verbosity level (0..=2).
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Print the end-of-run summary.
    pub fn print_summary(&self, stats: &RunStatistics) {
        for line in self.summary_lines(stats) {
            println!("{}", line);
        }
    }

    /// Lines printed by [`ConsoleReporter::print_summary`].
    pub fn summary_lines(&self, stats: &RunStatistics) -> Vec<String> {
        let mut lines = Vec::new();
        if stats.unscanned_blocks > 0 {
            lines.push(format!(
                "Unscanned trailing blocks: {} ({} bytes)",
                stats.unscanned_blocks,
                stats.unscanned_blocks * stats.block_size
            ));
        }
        if stats.failed_workers > 0 {
            lines.push(format!(
                "Workers failed: {} of {}",
                stats.failed_workers, stats.num_jobs
            ));
        }
        if stats.unique_fingerprints > 0 || stats.blocks_deduplicated > 0 {
            lines.push(format!(
                "Dedupe: {} unique, {} duplicate of {} blocks ({:.1}%)",
                stats.unique_fingerprints,
                stats.blocks_deduplicated,
                stats.blocks_read,
                stats.dedup_ratio() * 100.0
            ));
        }
        if stats.blocks_compressed > 0 || stats.compress_failures > 0 {
            lines.push(format!(
                "Compression: {} blocks, {} -> {} bytes (ratio {:.2}), {} failures",
                stats.blocks_compressed,
                stats.compress_input_bytes,
                stats.compressed_bytes,
                stats.compression_ratio(),
                stats.compress_failures
            ));
        }
        if self.verbosity >= 2 {
            lines.push(format!("Dedupe set ({} entries):", stats.fingerprints.len()));
            lines.extend(stats.fingerprints.iter().map(|fp| format!("  {}", fp)));
        }
        if let Some(mib_s) = stats.throughput_mib_s {
            lines.push(format!(
                "Throughput {:.3} s @ {:.2} MiB/s",
                stats.elapsed_secs(),
                mib_s
            ));
        }
        lines
    }
}

impl ScanEvents for ConsoleReporter {
    fn plan_ready(&self, plan: &RegionPlan) {
        println!(
            "file-size: {} block-size {} total-blocks: {} blocks-per-thread: {}",
            plan.device_size, plan.block_size, plan.total_blocks, plan.blocks_per_worker
        );
    }

    fn worker_started(&self, region: &Region) {
        println!("Reading From Offset {}", region.start_offset);
    }

    fn block_compressed(&self, worker: usize, offset: u64, before: usize, after: usize) {
        if self.verbosity >= 1 {
            println!(
                "[{}] compressed block at {}: {} -> {} bytes",
                worker, offset, before, after
            );
        }
    }

    fn duplicate_skipped(&self, worker: usize, offset: u64, fingerprint: &Fingerprint) {
        if self.verbosity >= 1 {
            println!("[{}] skipping duplicate block at {} ({})", worker, offset, fingerprint);
        }
    }

    fn compression_failed(&self, worker: usize, offset: u64, error: &ReduceError) {
        if self.verbosity >= 1 {
            println!("[{}] compression failed at {}: {}", worker, offset, error);
        }
    }

    fn worker_failed(&self, worker: usize, error: &ScanError) {
        println!("[{}] error: {}", worker, error);
    }
}
