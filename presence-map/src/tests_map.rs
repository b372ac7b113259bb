use crate::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[test]
fn test_new_rejects_invalid_segments() {
    assert_eq!(
        PresenceMap::new(100).unwrap_err(),
        PresenceError::InvalidSegmentCount(100)
    );
}

#[test]
fn test_map_allocates_whole_universe() {
    let map = PresenceMap::default();
    assert_eq!(map.layout().segments(), DEFAULT_SEGMENTS);
    assert_eq!(map.allocated_bytes(), UNIVERSE_BYTES);
    assert!(!map.is_released());
}

#[test]
fn test_map_at_max_segments_keeps_headers_small() {
    let map = PresenceMap::new(MAX_SEGMENTS).unwrap();
    assert_eq!(map.allocated_bytes(), UNIVERSE_BYTES);
    assert!(map.header_bytes() <= UNIVERSE_BYTES / 64, "{}", map.header_bytes());

    assert!(map.mark(u32::MAX));
    assert!(map.contains(u32::MAX));

    assert_eq!(
        PresenceMap::new(MAX_SEGMENTS * 2).unwrap_err(),
        PresenceError::InvalidSegmentCount(MAX_SEGMENTS * 2)
    );
}

#[test]
fn test_mark_first_call_wins() {
    let map = PresenceMap::default();

    for ordinal in [0, 1, 7, 8, 3_232_235_521, u32::MAX] {
        assert!(!map.contains(ordinal));
        assert!(map.mark(ordinal), "first mark of {ordinal}");
        assert!(map.contains(ordinal));
        for _ in 0..3 {
            assert!(!map.mark(ordinal), "repeat mark of {ordinal}");
        }
    }
}

#[test]
fn test_mark_does_not_touch_neighbours() {
    let map = PresenceMap::new(16).unwrap();
    let span = map.layout().bits_per_segment() as u32;

    // Last bit of one segment and first bit of the next.
    assert!(map.mark(span - 1));
    assert!(!map.contains(span - 2));
    assert!(!map.contains(span));
    assert!(map.mark(span));
    assert!(map.contains(span - 1));
}

#[test]
fn test_count_ones() {
    let map = PresenceMap::new(4).unwrap();
    assert_eq!(map.count_ones(), 0);

    let ordinals = [0, 9, 10, 1 << 30, (1 << 30) + 1, u32::MAX];
    for ordinal in ordinals {
        map.mark(ordinal);
        map.mark(ordinal);
    }

    assert_eq!(map.count_ones(), ordinals.len() as u64);
}

#[test]
fn test_concurrent_marks_have_one_winner() {
    const THREADS: usize = 8;
    const ORDINALS: u32 = 50_000;

    let map = Arc::new(PresenceMap::default());
    let winners = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let map = Arc::clone(&map);
            let winners = Arc::clone(&winners);
            std::thread::spawn(move || {
                // Every thread walks the same ordinals, starting at a
                // different offset, spread across all segments.
                for i in 0..ORDINALS {
                    let i = (i + t as u32 * 997) % ORDINALS;
                    let ordinal = i.wrapping_mul(85_899);
                    if map.mark(ordinal) {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::Relaxed), u64::from(ORDINALS));
    assert_eq!(map.count_ones(), u64::from(ORDINALS));
}

#[test]
fn test_release_is_idempotent() {
    let map = PresenceMap::new(8).unwrap();
    map.mark(42);

    assert!(map.release());
    assert!(map.is_released());
    assert_eq!(map.allocated_bytes(), 0);

    assert!(!map.release());
    assert!(map.is_released());
}

#[test]
fn test_released_map_refuses_marks() {
    let map = PresenceMap::new(8).unwrap();
    map.mark(42);
    map.release();

    assert_eq!(map.try_mark(42), Err(PresenceError::Released));
    assert_eq!(map.try_mark(7), Err(PresenceError::Released));
    assert!(!map.contains(42));
    assert_eq!(map.count_ones(), 0);
}

#[test]
#[should_panic(expected = "released")]
fn test_mark_after_release_panics() {
    let map = PresenceMap::new(2).unwrap();
    map.release();
    map.mark(1);
}
