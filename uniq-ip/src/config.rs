//! Run configuration.
//!
//! Every field has a default, so a YAML file only needs the values it wants
//! to change:
//!
//! ```yaml
//! batch_size: 100000
//! workers: 16
//! read_buffer: 8 MiB
//! address_policy: strict
//! ```

use std::fs;
use std::path::Path;

use bytesize::ByteSize;
use presence_map::SegmentLayout;
use serde::{Deserialize, Serialize};

use crate::codec::AddressPolicy;
use crate::error::{Result, UniqIpError};

pub const DEFAULT_BATCH_SIZE: usize = 250_000;
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_READ_BUFFER: u64 = 2 * 1024 * 1024;
/// Largest accepted read buffer.
pub const MAX_READ_BUFFER: u64 = 256 * 1024 * 1024;

/// What to do when the input fails after it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Finish the batches already read, then report the error.
    #[default]
    Fail,
    /// Stop reading and report the count over the lines read so far.
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Lines per batch
    pub batch_size: usize,

    /// Number of worker threads
    pub workers: usize,

    /// Capacity of the batch and result queues (defaults to `workers`)
    pub queue_capacity: Option<usize>,

    /// Read buffer size
    #[serde(with = "bytesize_serde")]
    pub read_buffer: ByteSize,

    /// Number of independently locked bitmap segments
    pub segments: u32,

    /// Lenient or strict address decoding
    pub address_policy: AddressPolicy,

    /// Behaviour on a mid-stream read failure
    pub on_read_error: ReadErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            read_buffer: ByteSize::b(DEFAULT_READ_BUFFER),
            segments: presence_map::DEFAULT_SEGMENTS,
            address_policy: AddressPolicy::default(),
            on_read_error: ReadErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| UniqIpError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&contents).map_err(|source| UniqIpError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_read_buffer(mut self, size: ByteSize) -> Self {
        self.read_buffer = size;
        self
    }

    pub fn with_segments(mut self, segments: u32) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_address_policy(mut self, policy: AddressPolicy) -> Self {
        self.address_policy = policy;
        self
    }

    pub fn with_read_error_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.on_read_error = policy;
        self
    }

    /// Effective queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers)
    }

    /// Read buffer size in bytes, clamped to the address space.
    pub fn read_buffer_bytes(&self) -> usize {
        usize::try_from(self.read_buffer.as_u64()).unwrap_or(usize::MAX)
    }

    /// Bitmap layout for the configured segment count.
    pub fn layout(&self) -> Result<SegmentLayout> {
        SegmentLayout::new(self.segments)
            .map_err(|err| UniqIpError::Config(format!("segments: {err}")))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(UniqIpError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(UniqIpError::Config(
                "workers must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity() == 0 {
            return Err(UniqIpError::Config(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.read_buffer.as_u64() == 0 {
            return Err(UniqIpError::Config(
                "read_buffer must be greater than 0".to_string(),
            ));
        }

        if self.read_buffer.as_u64() > MAX_READ_BUFFER {
            return Err(UniqIpError::Config(format!(
                "read_buffer must be at most {}",
                ByteSize::b(MAX_READ_BUFFER)
            )));
        }

        self.layout().map(|_| ())
    }
}
