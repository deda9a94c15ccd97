//! Per-worker block scanner: read → fingerprint → dedupe → compress.

use blockbench_reduce::{fingerprint, BlockCompressor, DedupRegistry};
use tracing::{debug, error, instrument, warn};

use crate::buffer::AlignedBuffer;
use crate::config::ScanConfig;
use crate::device::BlockDevice;
use crate::error::{ScanError, ScanResult};
use crate::events::ScanEvents;
use crate::region::Region;
use crate::stats::WorkerOutcome;

/// Scans one region at a time. Shared by reference across worker threads;
/// all mutable state (handle, buffers, counters) lives on the worker's stack.
pub struct BlockScanner<'a> {
    config: &'a ScanConfig,
    compressor: Box<dyn BlockCompressor + 'a>,
    registry: &'a dyn DedupRegistry,
    events: &'a dyn ScanEvents,
}

impl<'a> BlockScanner<'a> {
    /// Create a scanner over a validated configuration.
    pub fn new(
        config: &'a ScanConfig,
        registry: &'a dyn DedupRegistry,
        events: &'a dyn ScanEvents,
    ) -> Self {
        Self {
            config,
            compressor: Box::new(config.compressor()),
            registry,
            events,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_compressor(mut self, compressor: Box<dyn BlockCompressor + 'a>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Scan `region` to completion or to its first fatal error.
    ///
    /// Never fails: open, seek and read errors end up in the outcome.
    #[instrument(skip(self, region), fields(worker = region.index, offset = region.start_offset, blocks = region.block_count))]
    pub fn scan(&self, region: &Region) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::new(region);
        self.events.worker_started(region);
        if let Err(e) = self.scan_region(region, &mut outcome) {
            error!(worker = region.index, error = %e, blocks_read = outcome.blocks_read, "worker stopped");
            self.events.worker_failed(region.index, &e);
            outcome.error = Some(e);
        }
        self.events.worker_finished(&outcome);
        outcome
    }

    fn scan_region(&self, region: &Region, outcome: &mut WorkerOutcome) -> ScanResult<()> {
        let block_size = self.config.effective_block_size();
        let mut device = BlockDevice::open(&region.device, self.config.direct_io).map_err(|source| {
            ScanError::Open {
                path: region.device.clone(),
                source,
            }
        })?;
        device.check_aligned(block_size)?;
        device.check_aligned(region.start_offset)?;
        device.seek_to(region.start_offset)?;
        if region.block_count == 0 {
            return Ok(());
        }

        // block_size <= isize::MAX, checked by ScanConfig::validate
        let len = block_size as usize;
        let mut block = AlignedBuffer::new(len, device.alignment())?;
        let mut scratch = if self.compressor.is_enabled() {
            self.compressor.scratch_buffer(len)
        } else {
            Vec::new()
        };

        for i in 0..region.block_count {
            let offset = region.block_offset(block_size, i);
            device.read_block(block.as_mut_slice(), offset)?;
            outcome.blocks_read += 1;

            if self.config.hashing {
                let fp = fingerprint(block.as_slice());
                if !self.registry.observe(fp) {
                    debug!(offset, fingerprint = %fp, "duplicate block");
                    outcome.blocks_deduplicated += 1;
                    self.events.duplicate_skipped(region.index, offset, &fp);
                    continue;
                }
            }

            if self.compressor.is_enabled() {
                match self.compressor.compress_into(block.as_slice(), &mut scratch) {
                    Ok(n) => {
                        debug!(offset, before = len, after = n, "compressed block");
                        outcome.blocks_compressed += 1;
                        outcome.compress_input_bytes += len as u64;
                        outcome.compressed_bytes += n as u64;
                        self.events.block_compressed(region.index, offset, len, n);
                    }
                    Err(e) => {
                        warn!(offset, error = %e, "compression failed, continuing");
                        outcome.compress_failures += 1;
                        self.events.compression_failed(region.index, offset, &e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockbench_reduce::{CompressionStrategy, Compressor, ReduceError, ShardedRegistry};
    use std::sync::Mutex;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    use crate::events::NullEvents;

    const BLOCK: u64 = 4096;

    fn image(contents: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        for &c in contents {
            f.write_all(&vec![c; BLOCK as usize]).unwrap();
        }
        f.flush().unwrap();
        f
    }

    fn config(path: PathBuf) -> ScanConfig {
        ScanConfig {
            block_size: Some(BLOCK),
            direct_io: false,
            ..ScanConfig::new(path)
        }
    }

    fn region(path: PathBuf, start_block: u64, blocks: u64) -> Region {
        Region {
            index: 0,
            device: path,
            start_offset: start_block * BLOCK,
            block_count: blocks,
        }
    }

    #[test]
    fn plain_read_counts_blocks() {
        let img = image(&[1, 2, 3, 4]);
        let cfg = config(img.path().into());
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(img.path().into(), 1, 3));
        assert!(out.is_complete());
        assert_eq!(out.blocks_read, 3);
        assert_eq!(out.blocks_compressed, 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn hashing_skips_repeats() {
        let img = image(&[7, 7, 8, 7, 8]);
        let mut cfg = config(img.path().into());
        cfg.hashing = true;
        cfg.compression = CompressionStrategy::Fast;
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(img.path().into(), 0, 5));
        assert_eq!(out.blocks_read, 5);
        assert_eq!(out.blocks_deduplicated, 3);
        assert_eq!(out.blocks_compressed, 2);
        assert_eq!(out.compress_input_bytes, 2 * BLOCK);
        assert!(out.compressed_bytes < out.compress_input_bytes);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn compression_without_hashing_compresses_every_block() {
        let img = image(&[5, 5, 5]);
        let mut cfg = config(img.path().into());
        cfg.compression = CompressionStrategy::High;
        cfg.high_level = 3;
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(img.path().into(), 0, 3));
        assert_eq!(out.blocks_compressed, 3);
        assert_eq!(out.blocks_deduplicated, 0);
    }

    #[test]
    fn missing_device_is_open_error() {
        let path = PathBuf::from("/nonexistent/blockbench-image");
        let cfg = config(path.clone());
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(path, 0, 2));
        assert!(matches!(out.error, Some(ScanError::Open { .. })));
        assert_eq!(out.blocks_read, 0);
    }

    #[test]
    fn region_past_eof_stops_at_first_short_read() {
        let img = image(&[1, 2]);
        let cfg = config(img.path().into());
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(img.path().into(), 1, 4));
        assert_eq!(out.blocks_read, 1);
        assert!(matches!(
            out.error,
            Some(ScanError::ShortRead { actual: 0, offset, .. }) if offset == 2 * BLOCK
        ));
        assert!(!out.is_complete());
    }

    #[test]
    fn empty_region_reads_nothing() {
        let img = image(&[1]);
        let cfg = config(img.path().into());
        let reg = ShardedRegistry::new();
        let scanner = BlockScanner::new(&cfg, &reg, &NullEvents);
        let out = scanner.scan(&region(img.path().into(), 0, 0));
        assert!(out.is_complete());
        assert_eq!(out.blocks_read, 0);
    }

    /// Fails the `fail_on`-th compression call (0-based), delegates otherwise.
    struct FlakyCompressor {
        inner: Compressor,
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl BlockCompressor for FlakyCompressor {
        fn is_enabled(&self) -> bool {
            true
        }

        fn max_compressed_len(&self, input_len: usize) -> usize {
            BlockCompressor::max_compressed_len(&self.inner, input_len)
        }

        fn compress_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, ReduceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(ReduceError::CompressionFailed("injected".into()));
            }
            BlockCompressor::compress_into(&self.inner, input, output)
        }
    }

    #[derive(Default)]
    struct FailureLog {
        failed_at: Mutex<Vec<u64>>,
        compressed: AtomicUsize,
    }

    impl ScanEvents for FailureLog {
        fn block_compressed(&self, _worker: usize, _offset: u64, _before: usize, _after: usize) {
            self.compressed.fetch_add(1, Ordering::SeqCst);
        }

        fn compression_failed(&self, _worker: usize, offset: u64, _error: &ReduceError) {
            self.failed_at.lock().unwrap().push(offset);
        }
    }

    #[test]
    fn compression_failure_is_counted_and_scan_continues() {
        let img = image(&[1, 2, 3, 4]);
        let mut cfg = config(img.path().into());
        cfg.hashing = true;
        cfg.compression = CompressionStrategy::Fast;
        let reg = ShardedRegistry::new();
        let events = FailureLog::default();
        let flaky = FlakyCompressor {
            inner: Compressor::new(CompressionStrategy::Fast),
            calls: AtomicUsize::new(0),
            fail_on: 1,
        };
        let scanner = BlockScanner::new(&cfg, &reg, &events).with_compressor(Box::new(flaky));
        let out = scanner.scan(&region(img.path().into(), 0, 4));

        assert!(out.is_complete());
        assert_eq!(out.blocks_read, 4);
        assert_eq!(out.blocks_compressed, 3);
        assert_eq!(out.compress_failures, 1);
        assert_eq!(out.compress_input_bytes, 3 * BLOCK);
        assert_eq!(reg.len(), 4);
        assert_eq!(*events.failed_at.lock().unwrap(), vec![BLOCK]);
        assert_eq!(events.compressed.load(Ordering::SeqCst), 3);
    }
}
