use crate::*;
use proptest::prelude::*;

/// Segment counts that exercise both extremes and the default.
const COUNTS: [u32; 6] = [1, 2, 16, 256, 1 << 12, MAX_SEGMENTS];

// ---- Construction ----

#[test]
fn test_layout_rejects_invalid_counts() {
    for bad in [0, 3, 6, 255, 257, 1000, MAX_SEGMENTS * 2, 1 << 20, 1 << 29, u32::MAX] {
        assert_eq!(
            SegmentLayout::new(bad),
            Err(PresenceError::InvalidSegmentCount(bad)),
            "count {bad} should be rejected"
        );
    }
}

#[test]
fn test_layout_default_matches_new() {
    assert_eq!(SegmentLayout::default(), SegmentLayout::new(256).unwrap());
    assert_eq!(SegmentLayout::DEFAULT.segments(), DEFAULT_SEGMENTS);
}

#[test]
fn test_layout_sizes() {
    for count in COUNTS {
        let layout = SegmentLayout::new(count).unwrap();
        assert_eq!(layout.bits_per_segment() * u64::from(count), UNIVERSE_BITS);
        assert_eq!(
            layout.bytes_per_segment() as u64 * u64::from(count),
            UNIVERSE_BYTES
        );
        assert_eq!(layout.total_bytes(), 512 * 1024 * 1024);
    }

    let layout = SegmentLayout::new(MAX_SEGMENTS).unwrap();
    assert_eq!(layout.bytes_per_segment(), 8 * 1024);
}

// ---- Lookup ----

#[test]
fn test_locate_default_layout() {
    let layout = SegmentLayout::DEFAULT;

    assert_eq!(
        layout.locate(0),
        Slot {
            segment: 0,
            byte: 0,
            bit: 0
        }
    );

    // 192.168.0.1
    assert_eq!(
        layout.locate(3_232_235_521),
        Slot {
            segment: 192,
            byte: (168 << 13),
            bit: 1
        }
    );

    assert_eq!(
        layout.locate(u32::MAX),
        Slot {
            segment: 255,
            byte: (1 << 21) - 1,
            bit: 7
        }
    );
}

#[test]
fn test_locate_single_segment() {
    let layout = SegmentLayout::new(1).unwrap();
    let slot = layout.locate(u32::MAX);
    assert_eq!(slot.segment, 0);
    assert_eq!(slot.byte, (1 << 29) - 1);
    assert_eq!(slot.bit, 7);
}

#[test]
fn test_ordinal_rejects_foreign_slots() {
    let layout = SegmentLayout::DEFAULT;
    let outside = [
        Slot {
            segment: 256,
            byte: 0,
            bit: 0,
        },
        Slot {
            segment: 0,
            byte: 1 << 21,
            bit: 0,
        },
        Slot {
            segment: 0,
            byte: 0,
            bit: 8,
        },
    ];

    for slot in outside {
        assert_eq!(layout.ordinal(slot), None, "{slot:?}");
    }
}

// ---- Partition of the ordinal space ----

#[test]
fn test_segment_ranges_partition_universe() {
    for count in COUNTS {
        let layout = SegmentLayout::new(count).unwrap();
        let mut expected_start = 0u64;

        for segment in 0..count {
            let range = layout.segment_range(segment).unwrap();
            let (start, end) = (u64::from(*range.start()), u64::from(*range.end()));

            assert_eq!(start, expected_start, "gap before segment {segment}");
            assert_eq!(end - start + 1, layout.bits_per_segment());
            assert_eq!(layout.locate(*range.start()).segment, segment as usize);
            assert_eq!(layout.locate(*range.end()).segment, segment as usize);

            expected_start = end + 1;
        }

        assert_eq!(expected_start, UNIVERSE_BITS, "ranges must end at 2^32");
        assert!(layout.segment_range(count).is_none());
    }
}

#[test]
fn test_segment_boundaries_exact() {
    let layout = SegmentLayout::DEFAULT;
    let span = layout.bits_per_segment() as u32;

    for segment in 1..layout.segments() {
        let first = segment * span;
        assert_eq!(layout.locate(first - 1).segment, (segment - 1) as usize);
        assert_eq!(layout.locate(first).segment, segment as usize);
        assert_eq!(layout.locate(first).byte, 0);
        assert_eq!(layout.locate(first).bit, 0);
    }
}

fn arb_layout() -> impl Strategy<Value = SegmentLayout> {
    (0u32..=16).prop_map(|exp| SegmentLayout::new(1 << exp).unwrap())
}

proptest! {
    #[test]
    fn locate_is_inverted_by_ordinal(layout in arb_layout(), ordinal in any::<u32>()) {
        let slot = layout.locate(ordinal);
        prop_assert!(slot.segment < layout.segments() as usize);
        prop_assert!(slot.byte < layout.bytes_per_segment());
        prop_assert!(slot.bit < 8);
        prop_assert_eq!(layout.ordinal(slot), Some(ordinal));
    }

    #[test]
    fn ordinal_lies_in_its_segment_range(layout in arb_layout(), ordinal in any::<u32>()) {
        let slot = layout.locate(ordinal);
        let range = layout.segment_range(slot.segment as u32).unwrap();
        prop_assert!(range.contains(&ordinal));
    }

    #[test]
    fn distinct_ordinals_never_share_a_slot(
        layout in arb_layout(),
        a in any::<u32>(),
        b in any::<u32>(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(layout.locate(a), layout.locate(b));
    }
}
