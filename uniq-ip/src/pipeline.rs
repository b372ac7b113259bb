//! Producer → worker pool → aggregator wiring.
//!
//! One producer thread fills a bounded batch queue from a [`BatchSource`].
//! `W` workers drain it into the shared [`PresenceMap`] and push one
//! [`BatchOutcome`] each onto a bounded result queue. A watcher thread joins
//! the workers and then drops the last result sender, which closes the
//! result queue. The calling thread aggregates until that happens.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use presence_map::PresenceMap;
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregator, Tally};
use crate::batch::{Batch, BatchSource, MAX_LINE_BYTES};
use crate::config::{Config, ReadErrorPolicy};
use crate::error::{Result, UniqIpError};
use crate::pool::{BatchOutcome, WorkerPool};

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Distinct addresses observed.
    pub unique: u64,
    /// Lines processed, empty ones included.
    pub lines: u64,
    /// Batches processed.
    pub batches: u64,
    /// Lines refused by the strict decoder.
    pub rejected: u64,
    /// Batches that failed and contributed nothing.
    pub failed_batches: u64,
    /// The input failed part way and the counts cover only a prefix.
    pub truncated: bool,
    /// Wall-clock time spent in the pipeline.
    pub elapsed: Duration,
}

impl Summary {
    fn new(tally: Tally, truncated: bool, elapsed: Duration) -> Self {
        Self {
            unique: tally.unique,
            lines: tally.lines,
            batches: tally.batches,
            rejected: tally.rejected,
            failed_batches: tally.failed_batches,
            truncated,
            elapsed,
        }
    }
}

/// What the producer saw of the input.
struct Produced {
    lines: u64,
    batches: u64,
    error: Option<io::Error>,
}

/// A validated configuration ready to count inputs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Count the distinct addresses in the file at `path`.
    pub fn count_file<P: AsRef<Path>>(&self, path: P) -> Result<Summary> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| UniqIpError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "counting distinct addresses");
        self.count_reader(file)
    }

    /// Count the distinct addresses in an unbuffered byte stream.
    pub fn count_reader<R: Read + Send>(&self, reader: R) -> Result<Summary> {
        let reader = BufReader::with_capacity(self.config.read_buffer_bytes(), reader);
        self.count_buffered(reader)
    }

    /// Count the distinct addresses in a buffered byte stream.
    pub fn count_buffered<R: BufRead + Send>(&self, reader: R) -> Result<Summary> {
        let map = PresenceMap::with_layout(self.config.layout()?);
        self.count_into(reader, &map)
    }

    /// Run the pipeline against `map`, which is released before returning.
    pub(crate) fn count_into<R: BufRead + Send>(
        &self,
        reader: R,
        map: &PresenceMap,
    ) -> Result<Summary> {
        let start = Instant::now();
        let config = &self.config;

        info!(
            workers = config.workers,
            batch_size = config.batch_size,
            queue_capacity = config.queue_capacity(),
            segments = config.segments,
            address_policy = ?config.address_policy,
            on_read_error = ?config.on_read_error,
            "starting pipeline"
        );

        let outcome = self.run(reader, map);

        // Released here on every path, errors included.
        map.release();

        let (tally, produced) = outcome?;
        debug!(
            lines_read = produced.lines,
            batches_read = produced.batches,
            "producer finished"
        );

        let truncated = match produced.error {
            None => false,
            Some(source) => match config.on_read_error {
                ReadErrorPolicy::Fail => {
                    error!(lines_read = produced.lines, error = %source, "input read failed");
                    return Err(UniqIpError::Read {
                        lines_read: produced.lines,
                        source,
                    });
                }
                ReadErrorPolicy::Truncate => {
                    warn!(
                        lines_read = produced.lines,
                        error = %source,
                        "input read failed, reporting a partial count"
                    );
                    true
                }
            },
        };

        let summary = Summary::new(tally, truncated, start.elapsed());
        info!(
            unique = summary.unique,
            lines = summary.lines,
            batches = summary.batches,
            rejected = summary.rejected,
            failed_batches = summary.failed_batches,
            truncated = summary.truncated,
            elapsed = ?summary.elapsed,
            "pipeline finished"
        );

        Ok(summary)
    }

    fn run<R: BufRead + Send>(&self, reader: R, map: &PresenceMap) -> Result<(Tally, Produced)> {
        let config = &self.config;
        let capacity = config.queue_capacity();
        let (batch_tx, batch_rx) = crossbeam_channel::bounded::<Batch>(capacity);
        let (result_tx, result_rx) = crossbeam_channel::bounded::<BatchOutcome>(capacity);
        let source = BatchSource::new(reader, config.batch_size);

        thread::scope(|scope| -> Result<(Tally, Produced)> {
            let producer = thread::Builder::new()
                .name("uniq-ip-producer".to_string())
                .spawn_scoped(scope, move || produce(source, batch_tx))
                .map_err(UniqIpError::Spawn)?;

            let pool = WorkerPool::spawn(
                scope,
                config.workers,
                batch_rx,
                &result_tx,
                map,
                config.address_policy,
            )?;

            let watcher = thread::Builder::new()
                .name("uniq-ip-watcher".to_string())
                .spawn_scoped(scope, move || {
                    let joined = pool.join();
                    drop(result_tx);
                    joined
                })
                .map_err(UniqIpError::Spawn)?;

            let tally = Aggregator::new(result_rx).drain();

            let produced = producer
                .join()
                .map_err(|_| UniqIpError::WorkerPanicked("uniq-ip-producer".to_string()))?;
            let processed = watcher
                .join()
                .map_err(|_| UniqIpError::WorkerPanicked("uniq-ip-watcher".to_string()))??;
            debug!(batches = processed, "workers finished");

            Ok((tally, produced))
        })
    }
}

fn produce<R: BufRead>(mut source: BatchSource<R>, batches: Sender<Batch>) -> Produced {
    let error = loop {
        match source.next_batch() {
            Ok(Some(batch)) => {
                if batches.send(batch).is_err() {
                    warn!("batch queue closed before input was exhausted");
                    break None;
                }
            }
            Ok(None) => break None,
            Err(err) => break Some(err),
        }
    };

    if source.overlong_lines() > 0 {
        warn!(
            overlong_lines = source.overlong_lines(),
            max_line_bytes = MAX_LINE_BYTES,
            "cut overlong lines down to their prefix"
        );
    }

    Produced {
        lines: source.lines_read(),
        batches: source.batches_emitted(),
        error,
    }
}

/// Count the distinct addresses in the file at `path`.
pub fn count_unique<P: AsRef<Path>>(path: P, config: &Config) -> Result<u64> {
    let summary = Pipeline::new(config.clone())?.count_file(path)?;
    Ok(summary.unique)
}
