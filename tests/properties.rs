//! Property-based tests for cycle-time transforms and event lookup.

use proptest::prelude::*;
use weft::{EventCollection, Fraction, Interval, Pipeline, Stage, Transform};

fn f(n: i64, d: i64) -> Fraction {
    Fraction::new(n, d)
}

/// An interval strictly inside one cycle: `k < start <= end < k + 1`.
fn inner_interval() -> impl Strategy<Value = Interval> {
    (-8i64..8, 2i64..64)
        .prop_flat_map(|(cycle, denom)| (Just(cycle), Just(denom), 1..denom, 1..denom))
        .prop_map(|(cycle, denom, a, b)| {
            let base = Fraction::from_integer(cycle);
            Interval::new(base + f(a, denom), base + f(b, denom))
        })
}

fn any_interval() -> impl Strategy<Value = Interval> {
    (-64i64..64, 0i64..64, 1i64..16).prop_map(|(start, len, denom)| {
        Interval::new(f(start, denom), f(start + len, denom))
    })
}

fn amount() -> impl Strategy<Value = Fraction> {
    (-32i64..32, 1i64..16).prop_map(|(n, d)| f(n, d))
}

proptest! {
    #[test]
    fn prop_reverse_twice_is_identity(q in inner_interval()) {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::always(Transform::reverse()));
        pipeline.push(Stage::always(Transform::reverse()));
        prop_assert_eq!(pipeline.map(q), q);
    }

    #[test]
    fn prop_reverse_keeps_size(q in inner_interval()) {
        let reflected = q.reflect_in_cycle();
        prop_assert_eq!(reflected.size(), q.size());
        prop_assert_eq!(reflected.start().sam(), q.start().sam());
    }

    #[test]
    fn prop_shift_and_unshift_is_identity(q in any_interval(), x in amount()) {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::always(Transform::shift_by(x)));
        pipeline.push(Stage::always(Transform::shift_by(-x)));
        prop_assert_eq!(pipeline.map(q), q);
    }

    #[test]
    fn prop_shift_every_cycle_rotates_slots(cycle in 0i64..64, slot in 0i64..4) {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::every(1, Transform::shift(1, 4)).unwrap());
        pipeline.set_looped(true);

        let query = Interval::point(Fraction::from_integer(cycle) + f(2 * slot + 1, 8));
        let expected = Interval::point(f(2 * ((slot + cycle) % 4) + 1, 8));
        prop_assert_eq!(pipeline.map(query), expected);
    }

    #[test]
    fn prop_speed_scales_query(q in any_interval(), n in 1i64..16, d in 1i64..16) {
        let mut pipeline = Pipeline::new();
        pipeline.multiply_speed(f(n, d));
        prop_assert_eq!(pipeline.map(q), q.scale(f(n, d)));
    }

    #[test]
    fn prop_looped_queries_land_in_first_cycle(q in any_interval()) {
        let mut pipeline = Pipeline::new();
        pipeline.set_looped(true);
        let local = pipeline.map(q);
        prop_assert!(local.start() >= Fraction::zero());
        prop_assert!(local.start() < Fraction::one());
        prop_assert_eq!(local.size(), q.size());
    }

    #[test]
    fn prop_cycle_pos_and_sam_recompose(n in -1000i64..1000, d in 1i64..64) {
        let t = f(n, d);
        let pos = t.cycle_pos();
        prop_assert!(pos >= Fraction::zero() && pos < Fraction::one());
        prop_assert_eq!(t.sam() + pos, t);
    }

    /// A point inside a slot sees exactly that slot's value.
    #[test]
    fn prop_slot_lookup(
        values in prop::collection::vec(1u8..10, 1..12),
        pick in any::<prop::sample::Index>()
    ) {
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        let events = EventCollection::from_values(&values).unwrap();
        let max = values.iter().cloned().fold(0.0_f64, f64::max);

        let slots = values.len() as i64;
        let i = pick.index(values.len());
        let midpoint = Interval::point(f(2 * i as i64 + 1, 2 * slots));
        let event = events.last_active_during(&midpoint).unwrap();
        prop_assert_eq!(event.value(), values[i] / max);
    }

    /// Where events overlap the one added last wins.
    #[test]
    fn prop_last_added_wins(first in 0u8..10, second in 0u8..10, t in 0i64..8) {
        let mut events = EventCollection::new();
        events.add(weft::Event::evt(Fraction::one(), f64::from(first)));
        events.add(weft::Event::evt(Fraction::one(), f64::from(second)));
        let query = Interval::point(f(t, 8));
        prop_assert_eq!(events.last_active_during(&query).unwrap().value(), f64::from(second));
    }
}
