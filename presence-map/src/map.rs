use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use static_assertions::const_assert;

use crate::{MAX_SEGMENTS, PresenceError, Result, SegmentLayout, UNIVERSE_BYTES};

/// One independently locked slice of the bitmap. Padded so that neighbouring
/// locks never share a cache line.
type Segment = CachePadded<Mutex<Box<[u8]>>>;

const_assert!(
    MAX_SEGMENTS as u64 * std::mem::size_of::<Segment>() as u64 <= UNIVERSE_BYTES / 64
);

/// Concurrent "have we seen this ordinal" bitmap.
///
/// Every `u32` ordinal owns one bit. Writers go through [`mark`](Self::mark),
/// which locks only the segment owning the ordinal, tests the bit and sets
/// it. Exactly one caller ever observes `true` for a given ordinal, no
/// matter how calls interleave.
pub struct PresenceMap {
    layout: SegmentLayout,
    segments: Box<[Segment]>,
    released: AtomicBool,
}

impl PresenceMap {
    /// Allocate a zeroed map split into `segments` segments.
    pub fn new(segments: u32) -> Result<Self> {
        Ok(Self::with_layout(SegmentLayout::new(segments)?))
    }

    /// Allocate a zeroed map with the given layout.
    pub fn with_layout(layout: SegmentLayout) -> Self {
        let bytes = layout.bytes_per_segment();
        let segments = (0..layout.segments())
            .map(|_| CachePadded::new(Mutex::new(vec![0u8; bytes].into_boxed_slice())))
            .collect();

        Self {
            layout,
            segments,
            released: AtomicBool::new(false),
        }
    }

    /// Bytes taken by the per-segment lock headers, on top of
    /// [`allocated_bytes`](Self::allocated_bytes).
    pub fn header_bytes(&self) -> u64 {
        (self.segments.len() * std::mem::size_of::<Segment>()) as u64
    }

    /// The layout this map was built with.
    pub fn layout(&self) -> SegmentLayout {
        self.layout
    }

    /// Mark `ordinal` as present.
    ///
    /// Returns `true` iff this call is the first to mark it.
    ///
    /// # Panics
    ///
    /// Panics if the map has been [released](Self::release). Use
    /// [`try_mark`](Self::try_mark) when that is a recoverable condition.
    #[inline]
    pub fn mark(&self, ordinal: u32) -> bool {
        match self.try_mark(ordinal) {
            Ok(newly_set) => newly_set,
            Err(err) => panic!("cannot mark ordinal {ordinal}: {err}"),
        }
    }

    /// Fallible version of [`mark`](Self::mark).
    #[inline]
    pub fn try_mark(&self, ordinal: u32) -> Result<bool> {
        let slot = self.layout.locate(ordinal);
        let mask = slot.mask();

        let mut segment = self.segments[slot.segment].lock();
        let byte = segment
            .get_mut(slot.byte)
            .ok_or(PresenceError::Released)?;

        if *byte & mask != 0 {
            return Ok(false);
        }

        *byte |= mask;
        Ok(true)
    }

    /// Whether `ordinal` has been marked. Always `false` once released.
    pub fn contains(&self, ordinal: u32) -> bool {
        let slot = self.layout.locate(ordinal);
        let segment = self.segments[slot.segment].lock();
        segment
            .get(slot.byte)
            .is_some_and(|byte| byte & slot.mask() != 0)
    }

    /// Number of marked ordinals, computed by scanning every segment.
    ///
    /// Segments are locked one at a time, so the result is only exact when
    /// no writer is running concurrently.
    pub fn count_ones(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| {
                segment
                    .lock()
                    .iter()
                    .map(|byte| u64::from(byte.count_ones()))
                    .sum::<u64>()
            })
            .sum()
    }

    /// Bytes currently held by segment storage.
    pub fn allocated_bytes(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| segment.lock().len() as u64)
            .sum()
    }

    /// Drop all segment storage.
    ///
    /// Returns `true` if this call released the storage and `false` if it had
    /// already been released; repeated calls are no-ops. After release,
    /// [`try_mark`](Self::try_mark) fails with [`PresenceError::Released`].
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        for segment in self.segments.iter() {
            *segment.lock() = Box::default();
        }

        true
    }

    /// Whether [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Default for PresenceMap {
    fn default() -> Self {
        Self::with_layout(SegmentLayout::DEFAULT)
    }
}

impl fmt::Debug for PresenceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceMap")
            .field("segments", &self.layout.segments())
            .field("bytes_per_segment", &self.layout.bytes_per_segment())
            .field("released", &self.is_released())
            .finish()
    }
}
