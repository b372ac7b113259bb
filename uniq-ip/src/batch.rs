//! Line batching over a buffered byte stream.

use std::io::{self, BufRead, Read};
use std::iter::FusedIterator;

/// Bytes reserved per line when a batch is allocated. Covers
/// `"255.255.255.255"` without reallocating.
const TYPICAL_LINE_BYTES: usize = 16;

/// Longest line kept in full. Anything past it is skipped up to the next
/// newline, so a stream without newlines never gets buffered whole.
pub const MAX_LINE_BYTES: usize = 1024;

/// A bounded group of trimmed lines, processed as a unit by one worker.
///
/// Lines live back to back in a single buffer; `ends` holds the exclusive
/// end offset of each line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    sequence: u64,
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            ..Default::default()
        }
    }

    /// Create an empty batch with room for `lines` typical lines.
    pub fn with_capacity(sequence: u64, lines: usize) -> Self {
        Self {
            sequence,
            data: Vec::with_capacity(lines.saturating_mul(TYPICAL_LINE_BYTES)),
            ends: Vec::with_capacity(lines),
        }
    }

    /// Build a batch from ready-made lines.
    pub fn from_lines<I>(sequence: u64, lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut batch = Self::new(sequence);
        for line in lines {
            batch.push(line.as_ref());
        }
        batch
    }

    /// Append a line, trimming surrounding ASCII whitespace.
    pub fn push(&mut self, line: &[u8]) {
        self.data.extend_from_slice(line.trim_ascii());
        self.ends.push(self.data.len());
    }

    /// Position of this batch in the input, starting at zero.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of lines, including empty ones.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Iterate over the lines in input order.
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            data: &self.data,
            ends: self.ends.iter(),
            start: 0,
        }
    }
}

/// Iterator over the lines of a [`Batch`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    data: &'a [u8],
    ends: std::slice::Iter<'a, usize>,
    start: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let end = *self.ends.next()?;
        let line = &self.data[self.start..end];
        self.start = end;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ends.size_hint()
    }
}

impl ExactSizeIterator for Lines<'_> {}

/// Splits a byte stream into [`Batch`]es of at most `batch_size` lines.
///
/// The sequence is lazy, finite and cannot be replayed. A final short batch
/// is produced when the stream ends. End of stream is reported as `Ok(None)`,
/// a read failure as `Err`. When a read fails part way through a batch, the
/// lines read so far are returned first and the error on the following call.
/// After either, the source yields `Ok(None)` forever.
pub struct BatchSource<R> {
    reader: R,
    batch_size: usize,
    line: Vec<u8>,
    next_sequence: u64,
    lines_read: u64,
    overlong_lines: u64,
    pending_error: Option<io::Error>,
    finished: bool,
}

impl<R: BufRead> BatchSource<R> {
    /// A `batch_size` of zero is treated as one.
    pub fn new(reader: R, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
            line: Vec::with_capacity(64),
            next_sequence: 0,
            lines_read: 0,
            overlong_lines: 0,
            pending_error: None,
            finished: false,
        }
    }

    /// Lines consumed from the stream so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Lines cut down to [`MAX_LINE_BYTES`] so far.
    pub fn overlong_lines(&self) -> u64 {
        self.overlong_lines
    }

    /// Batches produced so far.
    pub fn batches_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Read the next batch.
    pub fn next_batch(&mut self) -> io::Result<Option<Batch>> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.finished {
            return Ok(None);
        }

        let mut batch = Batch::with_capacity(self.next_sequence, self.batch_size);

        while batch.len() < self.batch_size {
            match self.read_line() {
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Ok(true) => {
                    batch.push(&self.line);
                    self.lines_read += 1;
                }
                Err(err) => {
                    // A line cut short by the failure is dropped.
                    self.finished = true;
                    if batch.is_empty() {
                        return Err(err);
                    }
                    self.pending_error = Some(err);
                    break;
                }
            }
        }

        if batch.is_empty() {
            return Ok(None);
        }

        self.next_sequence += 1;
        Ok(Some(batch))
    }

    /// Read one line into `self.line`, keeping at most [`MAX_LINE_BYTES`].
    /// Returns `false` at end of stream.
    fn read_line(&mut self) -> io::Result<bool> {
        self.line.clear();
        let read = (&mut self.reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut self.line)?;

        if read == 0 {
            return Ok(false);
        }
        if read == MAX_LINE_BYTES && self.line.last() != Some(&b'\n') {
            if self.skip_rest_of_line()? > 0 {
                self.overlong_lines += 1;
            }
        }
        Ok(true)
    }

    /// Consume input up to and including the next newline without keeping it.
    /// Returns the number of bytes dropped before the newline.
    fn skip_rest_of_line(&mut self) -> io::Result<u64> {
        let mut skipped = 0u64;
        loop {
            let (used, done) = {
                let available = match self.reader.fill_buf() {
                    Ok(available) => available,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                match available.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        skipped += newline as u64;
                        (newline + 1, true)
                    }
                    None => {
                        skipped += available.len() as u64;
                        (available.len(), available.is_empty())
                    }
                }
            };
            self.reader.consume(used);
            if done {
                return Ok(skipped);
            }
        }
    }
}

impl<R: BufRead> Iterator for BatchSource<R> {
    type Item = io::Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl<R: BufRead> FusedIterator for BatchSource<R> {}
