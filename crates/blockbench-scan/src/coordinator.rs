//! Scan coordinator: size the device, partition it, run one worker per
//! region on a fixed pool of scoped threads, and aggregate after the join.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use blockbench_reduce::DedupRegistry;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::device::probe_size;
use crate::error::{ScanError, ScanResult};
use crate::events::{NullEvents, ScanEvents};
use crate::region::RegionPlan;
use crate::scanner::BlockScanner;
use crate::stats::{RunStatistics, WorkerOutcome};

/// Drives one scan run.
pub struct ScanCoordinator {
    config: ScanConfig,
    events: Arc<dyn ScanEvents>,
}

impl ScanCoordinator {
    /// Create a coordinator that reports to no one.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            events: Arc::new(NullEvents),
        }
    }

    /// Attach an event observer.
    pub fn with_events(mut self, events: Arc<dyn ScanEvents>) -> Self {
        self.events = events;
        self
    }

    /// Validate the configuration, probe the device and partition it.
    ///
    /// Any error here is fatal to the run; no worker has been started.
    pub fn plan(&self) -> ScanResult<RegionPlan> {
        self.config.validate()?;
        let device_size = probe_size(&self.config.device, self.config.direct_io)?;
        let plan = RegionPlan::new(
            self.config.device.clone(),
            device_size,
            self.config.effective_block_size(),
            self.config.num_jobs,
        );
        if plan.unscanned_blocks > 0 {
            warn!(
                unscanned_blocks = plan.unscanned_blocks,
                "trailing blocks do not divide evenly among workers and will not be read"
            );
        }
        if plan.blocks_per_worker == 0 {
            warn!(
                total_blocks = plan.total_blocks,
                num_jobs = self.config.num_jobs,
                "fewer blocks than workers, nothing will be read"
            );
        }
        Ok(plan)
    }

    /// Run the scan and return statistics once every worker has finished.
    pub fn run(&self) -> ScanResult<RunStatistics> {
        let plan = self.plan()?;
        info!(
            device = %self.config.device.display(),
            device_size = plan.device_size,
            block_size = plan.block_size,
            total_blocks = plan.total_blocks,
            blocks_per_worker = plan.blocks_per_worker,
            num_jobs = self.config.num_jobs,
            hashing = self.config.hashing,
            compression = %self.config.compression,
            registry = %self.config.registry,
            "starting scan"
        );
        self.events.plan_ready(&plan);

        let registry = self.config.registry.build();
        let start = Instant::now();
        let workers = self.run_workers(&plan, registry.as_ref());
        let elapsed = start.elapsed();

        let mut stats = RunStatistics::collect(
            self.config.device.clone(),
            &plan,
            workers,
            self.config.accounting,
            elapsed,
        );
        stats.unique_fingerprints = registry.len();
        if self.config.verbosity >= 2 {
            stats.fingerprints = registry.fingerprints();
        }
        info!(
            elapsed_secs = stats.elapsed_secs(),
            bytes_read = stats.bytes_read,
            blocks_deduplicated = stats.blocks_deduplicated,
            blocks_compressed = stats.blocks_compressed,
            failed_workers = stats.failed_workers,
            "scan finished"
        );
        Ok(stats)
    }

    fn run_workers(&self, plan: &RegionPlan, registry: &dyn DedupRegistry) -> Vec<WorkerOutcome> {
        let scanner = BlockScanner::new(&self.config, registry, self.events.as_ref());
        let scanner = &scanner;
        thread::scope(|s| {
            let handles: Vec<_> = plan
                .regions
                .iter()
                .map(|region| {
                    let handle = thread::Builder::new()
                        .name(format!("blockbench-scan-{}", region.index))
                        .spawn_scoped(s, move || scanner.scan(region));
                    (region, handle)
                })
                .collect();

            // Join barrier: every worker is joined before any outcome is used.
            handles
                .into_iter()
                .map(|(region, handle)| {
                    let failure = match handle {
                        Ok(h) => match h.join() {
                            Ok(outcome) => return outcome,
                            // Unreachable under the release profile's panic = "abort".
                            Err(_) => ScanError::WorkerPanicked {
                                worker: region.index,
                            },
                        },
                        Err(source) => ScanError::Spawn {
                            worker: region.index,
                            source,
                        },
                    };
                    self.events.worker_failed(region.index, &failure);
                    WorkerOutcome::failed(region, failure)
                })
                .collect()
        })
    }
}
