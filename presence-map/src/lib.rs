//! Dense presence bitmap over the whole 32-bit ordinal space.
//!
//! The map holds exactly one bit per possible `u32` ordinal (512 MiB in
//! total), split into a power-of-two number of contiguous segments. Each
//! segment sits behind its own lock, so concurrent writers only contend when
//! they touch the same slice of the ordinal space.
//!
//! Memory is fixed at construction and never depends on how many ordinals
//! end up being marked.

mod error;
mod layout;
mod map;

#[cfg(test)]
mod tests_layout;
#[cfg(test)]
mod tests_map;

pub use error::{PresenceError, Result};
pub use layout::{SegmentLayout, Slot};
pub use map::PresenceMap;

use static_assertions::const_assert;

/// Number of bits in the presence universe (one per `u32` value).
pub const UNIVERSE_BITS: u64 = 1 << 32;

/// Bytes needed to store the whole universe.
pub const UNIVERSE_BYTES: u64 = UNIVERSE_BITS / 8;

/// Segment count used when the caller has no preference.
pub const DEFAULT_SEGMENTS: u32 = 256;

/// Largest accepted segment count. Each segment carries a padded lock, so
/// at this bound the lock headers stay within 1/64 of the bitmap itself.
pub const MAX_SEGMENTS: u32 = 1 << 16;

const_assert!(DEFAULT_SEGMENTS.is_power_of_two());
const_assert!(DEFAULT_SEGMENTS <= MAX_SEGMENTS);
