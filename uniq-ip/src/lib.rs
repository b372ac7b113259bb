//! Exact distinct-IPv4 counting for inputs far larger than memory.
//!
//! Input is one address per line. Lines are grouped into batches by a
//! producer thread, marked into a dense 2^32-bit [`PresenceMap`] by a fixed
//! pool of workers, and the per-batch "newly seen" counts are summed on the
//! calling thread. Memory use is the 512 MiB bitmap plus the batches in
//! flight, regardless of input size or cardinality.
//!
//! ```no_run
//! use uniq_ip::{Config, Pipeline};
//!
//! let pipeline = Pipeline::new(Config::default().with_workers(4))?;
//! let summary = pipeline.count_file("addresses.txt")?;
//! println!("{}", summary.unique);
//! # Ok::<(), uniq_ip::UniqIpError>(())
//! ```

pub mod aggregate;
pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;

pub use aggregate::{Aggregator, Tally};
pub use batch::{Batch, BatchSource};
pub use codec::{AddressPolicy, MalformedAddress, decode, encode};
pub use config::{Config, ReadErrorPolicy};
pub use error::{Result, UniqIpError};
pub use pipeline::{Pipeline, Summary, count_unique};
pub use pool::{BatchOutcome, WorkerPool, process_batch};

pub use presence_map::PresenceMap;
