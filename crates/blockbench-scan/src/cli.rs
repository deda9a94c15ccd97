//! Command-line interface for the `blockbench` binary.

use std::path::PathBuf;

use blockbench_reduce::{CompressionStrategy, RegistryKind};
use clap::{Parser, ValueEnum};

use crate::config::{ByteAccounting, ScanConfig};
use crate::error::{ScanError, ScanResult};

/// Parsed command line.
#[derive(Parser, Debug)]
#[command(name = "blockbench")]
#[command(about = "Block device throughput benchmark with inline dedupe and compression", long_about = None)]
pub struct Cli {
    /// Device or image file to read
    #[arg(short, long, required_unless_present = "config")]
    pub device: Option<PathBuf>,

    /// Block size in bytes [default: 1 GiB, or 10 MiB with --hash/--compress]
    #[arg(short, long)]
    pub block_size: Option<u64>,

    /// Number of worker threads [default: 10]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Fingerprint blocks and skip compression of duplicates
    #[arg(short = 'H', long)]
    pub hash: bool,

    /// Compression: 0 = none, 1 = fast (lz4), 2 = high (zstd)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub compress: Option<u8>,

    /// Zstd level used by --compress 2
    #[arg(long)]
    pub zstd_level: Option<i32>,

    /// 0 = quiet, 1 = per-block messages, 2 = also dump the dedupe set
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub verbose: Option<u8>,

    /// Read through the page cache instead of O_DIRECT
    #[arg(long)]
    pub buffered: bool,

    /// Dedupe registry implementation
    #[arg(long, value_enum)]
    pub registry: Option<RegistryArg>,

    /// Bytes used for the throughput figure
    #[arg(long, value_enum)]
    pub accounting: Option<AccountingArg>,

    /// Load settings from a TOML or JSON file; flags override it
    #[arg(long, env = "BLOCKBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print final statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// `--registry` values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryArg {
    /// One mutex around the whole set
    Locked,
    /// Sharded concurrent set
    Sharded,
}

impl From<RegistryArg> for RegistryKind {
    fn from(arg: RegistryArg) -> Self {
        match arg {
            RegistryArg::Locked => RegistryKind::Locked,
            RegistryArg::Sharded => RegistryKind::Sharded,
        }
    }
}

/// `--accounting` values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountingArg {
    /// Bytes actually read
    Scanned,
    /// Probed device size
    Device,
}

impl From<AccountingArg> for ByteAccounting {
    fn from(arg: AccountingArg) -> Self {
        match arg {
            AccountingArg::Scanned => ByteAccounting::Scanned,
            AccountingArg::Device => ByteAccounting::Device,
        }
    }
}

impl Cli {
    /// Merge the optional config file with the flags and validate the result.
    pub fn into_config(self) -> ScanResult<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::from_file(path)?,
            None => ScanConfig::default(),
        };
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(block_size) = self.block_size {
            config.block_size = Some(block_size);
        }
        if let Some(jobs) = self.jobs {
            config.num_jobs = jobs;
        }
        if self.hash {
            config.hashing = true;
        }
        if let Some(level) = self.compress {
            config.compression = CompressionStrategy::from_level(level).ok_or_else(|| {
                ScanError::InvalidConfig(format!("unknown compression selector {}", level))
            })?;
        }
        if let Some(level) = self.zstd_level {
            config.high_level = level;
        }
        if let Some(verbosity) = self.verbose {
            config.verbosity = verbosity;
        }
        if self.buffered {
            config.direct_io = false;
        }
        if let Some(registry) = self.registry {
            config.registry = registry.into();
        }
        if let Some(accounting) = self.accounting {
            config.accounting = accounting.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BLOCK_SIZE, DEFAULT_DEDUP_BLOCK_SIZE, DEFAULT_JOBS};
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("blockbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn missing_device_is_usage_error() {
        let err = Cli::try_parse_from(["blockbench", "-j", "4"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn defaults() {
        let config = parse(&["-d", "/dev/sdb"]).into_config().unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/sdb"));
        assert_eq!(config.num_jobs, DEFAULT_JOBS);
        assert_eq!(config.effective_block_size(), DEFAULT_BLOCK_SIZE);
        assert!(config.direct_io);
        assert!(!config.hashing);
    }

    #[test]
    fn dedup_flags() {
        let config = parse(&["-d", "/dev/sdb", "-H", "-c", "2", "-v", "1", "-j", "4"])
            .into_config()
            .unwrap();
        assert!(config.hashing);
        assert_eq!(config.compression, CompressionStrategy::High);
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.num_jobs, 4);
        assert_eq!(config.effective_block_size(), DEFAULT_DEDUP_BLOCK_SIZE);
    }

    #[test]
    fn selector_out_of_range_rejected() {
        let err = Cli::try_parse_from(["blockbench", "-d", "/dev/sdb", "-c", "3"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn long_options() {
        let config = parse(&[
            "--device",
            "img.raw",
            "--block-size",
            "4096",
            "--buffered",
            "--registry",
            "locked",
            "--accounting",
            "device",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.block_size, Some(4096));
        assert!(!config.direct_io);
        assert_eq!(config.registry, RegistryKind::Locked);
        assert_eq!(config.accounting, ByteAccounting::Device);
    }

    #[test]
    fn zero_jobs_rejected() {
        let err = parse(&["-d", "/dev/sdb", "-j", "0"]).into_config().unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }
}
