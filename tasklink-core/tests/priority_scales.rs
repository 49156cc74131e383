//! Priority translation between native scales and the canonical ordinal.

use rstest::rstest;
use tasklink_core::PriorityScale;

#[rstest]
#[case(PriorityScale::ascending(5))]
#[case(PriorityScale::ascending(3))]
#[case(PriorityScale::descending(5))]
#[case(PriorityScale::descending(3))]
#[case(PriorityScale::descending(1))]
fn round_trip_equals_clamp(#[case] scale: PriorityScale) {
    for p in 0..=8u16 {
        assert_eq!(
            scale.to_canonical(scale.from_canonical(p)),
            scale.clamp(p),
            "p = {p}, scale = {scale:?}"
        );
    }
}

#[rstest]
#[case(5, 1)]
#[case(4, 1)]
#[case(3, 1)]
#[case(2, 2)]
#[case(1, 3)]
fn descending_three_level_target(#[case] canonical: u16, #[case] native: u16) {
    assert_eq!(PriorityScale::descending(3).from_canonical(canonical), native);
}

#[test]
fn out_of_range_desired_compares_equal_to_clamped() {
    let target = PriorityScale::descending(3);
    assert!(!target.needs_update(3, 5));
    assert!(target.needs_update(2, 5));
    assert!(!target.needs_update(1, 0));
}
