//! Summation of per-batch results.

use crossbeam_channel::Receiver;

use crate::pool::BatchOutcome;

/// Running totals over batch outcomes. Order of accumulation is irrelevant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub unique: u64,
    pub lines: u64,
    pub batches: u64,
    pub rejected: u64,
    pub failed_batches: u64,
}

impl Tally {
    pub fn add(&mut self, outcome: &BatchOutcome) {
        self.unique += outcome.new_unique;
        self.lines += outcome.lines;
        self.batches += 1;
        self.rejected += outcome.rejected;
        self.failed_batches += u64::from(outcome.failed);
    }
}

impl Extend<BatchOutcome> for Tally {
    fn extend<I: IntoIterator<Item = BatchOutcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.add(&outcome);
        }
    }
}

impl FromIterator<BatchOutcome> for Tally {
    fn from_iter<I: IntoIterator<Item = BatchOutcome>>(iter: I) -> Self {
        let mut tally = Self::default();
        tally.extend(iter);
        tally
    }
}

/// Drains the result queue on the calling thread.
pub struct Aggregator {
    results: Receiver<BatchOutcome>,
}

impl Aggregator {
    pub fn new(results: Receiver<BatchOutcome>) -> Self {
        Self { results }
    }

    /// Block until the result queue is closed and empty, then return the
    /// totals.
    pub fn drain(self) -> Tally {
        self.results.iter().collect()
    }
}
