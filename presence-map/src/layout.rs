use std::ops::RangeInclusive;

use crate::{MAX_SEGMENTS, PresenceError, Result, UNIVERSE_BITS};

/// Position of a single ordinal inside a segmented bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Index of the segment that owns the ordinal.
    pub segment: usize,
    /// Byte offset inside the segment.
    pub byte: usize,
    /// Bit offset inside the byte (`0..8`, least significant first).
    pub bit: u8,
}

impl Slot {
    /// Mask selecting this slot's bit within its byte.
    #[inline]
    pub fn mask(&self) -> u8 {
        1u8 << self.bit
    }
}

/// Arithmetic mapping ordinals to `(segment, byte, bit)` slots.
///
/// The ordinal space `[0, 2^32)` is cut into `segments` equal, contiguous
/// ranges. Because the segment count is a power of two, every lookup is a
/// shift and a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    segments: u32,
    /// log2 of the number of bits per segment.
    shift: u32,
}

impl SegmentLayout {
    /// Layout with [`DEFAULT_SEGMENTS`](crate::DEFAULT_SEGMENTS) segments.
    pub const DEFAULT: Self = Self {
        segments: crate::DEFAULT_SEGMENTS,
        shift: 32 - crate::DEFAULT_SEGMENTS.trailing_zeros(),
    };

    /// Create a layout with the given number of segments.
    ///
    /// The count must be a power of two no larger than [`MAX_SEGMENTS`], so
    /// that it divides `2^32` evenly and each segment holds whole bytes.
    pub fn new(segments: u32) -> Result<Self> {
        if segments == 0 || !segments.is_power_of_two() || segments > MAX_SEGMENTS {
            return Err(PresenceError::InvalidSegmentCount(segments));
        }

        Ok(Self {
            segments,
            shift: 32 - segments.trailing_zeros(),
        })
    }

    /// Number of segments.
    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// Number of ordinals covered by each segment.
    pub fn bits_per_segment(&self) -> u64 {
        1u64 << self.shift
    }

    /// Storage size of one segment.
    pub fn bytes_per_segment(&self) -> usize {
        (self.bits_per_segment() / 8) as usize
    }

    /// Storage size of the whole map. Independent of the segment count.
    pub fn total_bytes(&self) -> u64 {
        UNIVERSE_BITS / 8
    }

    /// Find the slot holding `ordinal`.
    #[inline]
    pub fn locate(&self, ordinal: u32) -> Slot {
        let ordinal = u64::from(ordinal);
        let local = ordinal & (self.bits_per_segment() - 1);

        Slot {
            segment: (ordinal >> self.shift) as usize,
            byte: (local >> 3) as usize,
            bit: (local & 7) as u8,
        }
    }

    /// Inverse of [`locate`](Self::locate).
    ///
    /// Returns `None` if the slot lies outside this layout.
    pub fn ordinal(&self, slot: Slot) -> Option<u32> {
        if slot.segment >= self.segments as usize
            || slot.byte >= self.bytes_per_segment()
            || slot.bit >= 8
        {
            return None;
        }

        let base = (slot.segment as u64) << self.shift;
        let local = (slot.byte as u64) * 8 + u64::from(slot.bit);
        u32::try_from(base + local).ok()
    }

    /// The inclusive ordinal range owned by `segment`.
    pub fn segment_range(&self, segment: u32) -> Option<RangeInclusive<u32>> {
        if segment >= self.segments {
            return None;
        }

        let start = u64::from(segment) << self.shift;
        let end = start + self.bits_per_segment() - 1;
        Some(start as u32..=end as u32)
    }
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}
