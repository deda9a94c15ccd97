#![warn(missing_docs)]
//! blockbench: concurrent block device read / dedupe / compress benchmark

use std::sync::Arc;

use blockbench_scan::cli::Cli;
use blockbench_scan::{ConsoleReporter, NullEvents, ScanCoordinator, ScanEvents};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let config = cli.into_config()?;

    let reporter = ConsoleReporter::new(config.verbosity);
    let events: Arc<dyn ScanEvents> = if json {
        Arc::new(NullEvents)
    } else {
        Arc::new(reporter)
    };

    let stats = ScanCoordinator::new(config).with_events(events).run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        reporter.print_summary(&stats);
    }
    Ok(())
}
