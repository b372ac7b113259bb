use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytesize::ByteSize;
use clap::Parser;
use uniq_ip::{AddressPolicy, Config, ReadErrorPolicy};

/// Count distinct IPv4 addresses in a file with one address per line
#[derive(Debug, Parser)]
#[command(name = "uniq-ip")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Input file, or `-` to read standard input
    pub input: PathBuf,

    /// YAML configuration file; flags below override its values
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Lines per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Capacity of the batch and result queues
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Read buffer size (e.g. "2 MiB")
    #[arg(long)]
    pub read_buffer: Option<ByteSize>,

    /// Number of bitmap segments (power of two)
    #[arg(long)]
    pub segments: Option<u32>,

    /// Skip malformed addresses instead of counting them
    #[arg(long)]
    pub strict: bool,

    /// Report a partial count instead of failing when the input breaks mid-way
    #[arg(long)]
    pub partial_on_read_error: bool,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for `--log-level debug`
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Whether the input is standard input.
    pub fn reads_stdin(&self) -> bool {
        self.input == Path::new("-")
    }

    pub fn log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        }
    }

    /// Defaults, then the config file, then command-line flags.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_yaml_file(path)
                .with_context(|| format!("Loading config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = Some(capacity);
        }
        if let Some(read_buffer) = self.read_buffer {
            config.read_buffer = read_buffer;
        }
        if let Some(segments) = self.segments {
            config.segments = segments;
        }
        if self.strict {
            config.address_policy = AddressPolicy::Strict;
        }
        if self.partial_on_read_error {
            config.on_read_error = ReadErrorPolicy::Truncate;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
