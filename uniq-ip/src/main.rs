mod cli;
mod tracing_config;

use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use uniq_ip::Pipeline;

use crate::cli::CliArgs;
use crate::tracing_config::{TracingConfig, initialize_tracing};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    initialize_tracing(
        TracingConfig::default()
            .with_log_level(args.log_level())
            .with_ansi(io::stderr().is_terminal()),
    );

    let pipeline = Pipeline::new(args.load_config()?)?;

    let summary = if args.reads_stdin() {
        pipeline.count_reader(io::stdin())
    } else {
        pipeline.count_file(&args.input)
    }
    .with_context(|| format!("Counting addresses in {}", args.input.display()))?;

    if summary.truncated {
        warn!(
            lines = summary.lines,
            "Input ended with a read error; the count covers only the lines read"
        );
    }

    info!("Unique IP addresses: {}", summary.unique);
    info!(
        "Execution time: {}",
        humantime::format_duration(whole_millis(summary.elapsed))
    );

    println!("{}", summary.unique);
    Ok(())
}

/// Drop sub-millisecond precision for display.
fn whole_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
