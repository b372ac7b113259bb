//! Fixed-size pool of workers marking batches into the shared presence map.

use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};
use presence_map::PresenceMap;
use tracing::{debug, error, warn};

use crate::batch::Batch;
use crate::codec::AddressPolicy;
use crate::error::{Result, UniqIpError};

/// What one worker reports for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Sequence number of the batch.
    pub sequence: u64,
    /// Lines in the batch, empty ones included.
    pub lines: u64,
    /// Addresses this batch was the first to mark.
    pub new_unique: u64,
    /// Non-empty lines refused by the strict decoder.
    pub rejected: u64,
    /// The batch could not be processed and contributes nothing.
    pub failed: bool,
}

impl BatchOutcome {
    fn empty(batch: &Batch) -> Self {
        Self {
            sequence: batch.sequence(),
            lines: batch.len() as u64,
            ..Default::default()
        }
    }

    /// Zero-contribution outcome for a batch that failed.
    pub fn failed(batch: &Batch) -> Self {
        Self {
            failed: true,
            ..Self::empty(batch)
        }
    }
}

/// Mark every non-empty line of `batch` and count the newly seen ones.
///
/// Lines the policy rejects are skipped and counted. Fails only if the map
/// refuses a mark, in which case the whole batch should count as zero.
pub fn process_batch(
    batch: &Batch,
    map: &PresenceMap,
    policy: AddressPolicy,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::empty(batch);

    for line in batch.lines() {
        if line.is_empty() {
            continue;
        }

        match policy.ordinal(line) {
            Ok(ordinal) => {
                if map.try_mark(ordinal)? {
                    outcome.new_unique += 1;
                }
            }
            Err(reason) => {
                outcome.rejected += 1;
                debug!(
                    sequence = batch.sequence(),
                    line = %String::from_utf8_lossy(line),
                    %reason,
                    "rejected malformed address"
                );
            }
        }
    }

    Ok(outcome)
}

/// `W` worker threads sharing one batch queue and one presence map.
///
/// Each batch is received by exactly one worker. Workers exit once the batch
/// queue is closed and drained, or when nobody listens for results anymore.
pub struct WorkerPool<'scope> {
    handles: Vec<ScopedJoinHandle<'scope, u64>>,
}

impl<'scope> WorkerPool<'scope> {
    /// Start `workers` threads inside `scope`.
    ///
    /// Every worker holds its own clone of `results`; the caller keeps the
    /// original and decides when the result queue closes.
    pub fn spawn<'env>(
        scope: &'scope Scope<'scope, 'env>,
        workers: usize,
        batches: Receiver<Batch>,
        results: &Sender<BatchOutcome>,
        map: &'scope PresenceMap,
        policy: AddressPolicy,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let batches = batches.clone();
            let results = results.clone();

            let handle = thread::Builder::new()
                .name(format!("uniq-ip-worker-{id}"))
                .spawn_scoped(scope, move || worker_loop(id, batches, results, map, policy))
                .map_err(UniqIpError::Spawn)?;

            handles.push(handle);
        }

        Ok(Self { handles })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker and return the number of batches processed.
    ///
    /// All workers are joined even if some panicked; the first panicked
    /// worker is reported.
    pub fn join(self) -> Result<u64> {
        let mut processed = 0;
        let mut panicked = None;

        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(batches) => processed += batches,
                Err(_) => {
                    error!(thread = %name, "worker panicked");
                    panicked.get_or_insert(name);
                }
            }
        }

        match panicked {
            Some(name) => Err(UniqIpError::WorkerPanicked(name)),
            None => Ok(processed),
        }
    }
}

fn worker_loop(
    id: usize,
    batches: Receiver<Batch>,
    results: Sender<BatchOutcome>,
    map: &PresenceMap,
    policy: AddressPolicy,
) -> u64 {
    let mut processed = 0;

    for batch in batches.iter() {
        let outcome = match process_batch(&batch, map, policy) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    worker = id,
                    sequence = batch.sequence(),
                    error = %err,
                    "batch failed, counting it as zero"
                );
                BatchOutcome::failed(&batch)
            }
        };

        if outcome.rejected > 0 {
            warn!(
                worker = id,
                sequence = outcome.sequence,
                rejected = outcome.rejected,
                "skipped malformed addresses"
            );
        }

        debug!(
            worker = id,
            sequence = outcome.sequence,
            lines = outcome.lines,
            new_unique = outcome.new_unique,
            "batch finished"
        );

        processed += 1;
        if results.send(outcome).is_err() {
            debug!(worker = id, "result queue closed, stopping");
            break;
        }
    }

    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    #[test]
    fn test_process_batch_counts_first_sightings() {
        let map = PresenceMap::default();
        let batch = Batch::from_lines(0, ["10.0.0.1", "10.0.0.1", "10.0.0.2", "", "10.0.0.1"]);

        let outcome = process_batch(&batch, &map, AddressPolicy::Lenient).unwrap();
        assert_eq!(outcome.new_unique, 2);
        assert_eq!(outcome.lines, 5);
        assert_eq!(outcome.rejected, 0);
        assert!(!outcome.failed);

        assert!(map.contains(encode("10.0.0.1")));
        assert!(map.contains(encode("10.0.0.2")));

        // Replaying the batch finds nothing new.
        let again = process_batch(&batch, &map, AddressPolicy::Lenient).unwrap();
        assert_eq!(again.new_unique, 0);
    }

    #[test]
    fn test_process_batch_of_empty_lines() {
        let map = PresenceMap::default();
        let batch = Batch::from_lines(7, ["", "", "   "]);

        let outcome = process_batch(&batch, &map, AddressPolicy::Strict).unwrap();
        assert_eq!(
            outcome,
            BatchOutcome {
                sequence: 7,
                lines: 3,
                ..Default::default()
            }
        );
        assert!(!map.contains(0));
    }

    #[test]
    fn test_process_batch_strict_skips_malformed() {
        let map = PresenceMap::default();
        let batch = Batch::from_lines(0, ["1.2.3.4", "1.2.3", "300.1.1.1", "x.y.z.w", "1.2.3.4"]);

        let outcome = process_batch(&batch, &map, AddressPolicy::Strict).unwrap();
        assert_eq!(outcome.new_unique, 1);
        assert_eq!(outcome.rejected, 3);
        assert!(!map.contains(encode("1.2.3")));
    }

    #[test]
    fn test_process_batch_lenient_counts_malformed() {
        let map = PresenceMap::default();
        let batch = Batch::from_lines(0, ["1.2.3.4", "1.2.3", "300.1.1.1"]);

        let outcome = process_batch(&batch, &map, AddressPolicy::Lenient).unwrap();
        assert_eq!(outcome.new_unique, 3);
        assert_eq!(outcome.rejected, 0);
    }

    #[test]
    fn test_process_batch_fails_on_released_map() {
        let map = PresenceMap::new(2).unwrap();
        map.release();

        let batch = Batch::from_lines(0, ["1.2.3.4"]);
        let err = process_batch(&batch, &map, AddressPolicy::Lenient).unwrap_err();
        assert!(matches!(err, UniqIpError::Presence(_)));
    }

    #[test]
    fn test_pool_processes_each_batch_once() {
        let map = PresenceMap::default();
        let (batch_tx, batch_rx) = crossbeam_channel::bounded(2);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let processed = thread::scope(|scope| {
            let pool = WorkerPool::spawn(
                scope,
                4,
                batch_rx,
                &result_tx,
                &map,
                AddressPolicy::Lenient,
            )
            .unwrap();
            assert_eq!(pool.len(), 4);
            drop(result_tx);

            for sequence in 0..20u64 {
                let lines = (0..100u64).map(|i| format!("10.0.{}.{}", sequence % 5, i));
                batch_tx.send(Batch::from_lines(sequence, lines)).unwrap();
            }
            drop(batch_tx);

            pool.join().unwrap()
        });

        let mut outcomes: Vec<BatchOutcome> = result_rx.iter().collect();
        outcomes.sort_by_key(|o| o.sequence);

        assert_eq!(processed, 20);
        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.iter().enumerate().all(|(i, o)| o.sequence == i as u64));
        assert_eq!(outcomes.iter().map(|o| o.new_unique).sum::<u64>(), 500);
    }

    #[test]
    fn test_pool_reports_failed_batches_as_zero() {
        let map = PresenceMap::new(2).unwrap();
        map.release();

        let (batch_tx, batch_rx) = crossbeam_channel::bounded(1);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        thread::scope(|scope| {
            let pool =
                WorkerPool::spawn(scope, 2, batch_rx, &result_tx, &map, AddressPolicy::Lenient)
                    .unwrap();
            drop(result_tx);

            batch_tx.send(Batch::from_lines(0, ["1.1.1.1", "2.2.2.2"])).unwrap();
            drop(batch_tx);

            assert_eq!(pool.join().unwrap(), 1);
        });

        let outcome = result_rx.recv().unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.new_unique, 0);
        assert_eq!(outcome.lines, 2);
    }
}
