//! Time-axis transforms and the per-pattern pipeline that applies them.
//!
//! A [`Transform`] is a pure function of an elapsed-period count `n` and an
//! interval. Nothing is accumulated between queries: the same `n` always
//! gives the same mapping, so a pattern can be sampled at any time in any
//! order and still agree with itself.

use num_integer::Integer;

use crate::error::{LoomError, Result};
use crate::fraction::Fraction;
use crate::interval::{Interval, Window};

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Rotate within the current cycle by `amount * n` cycles.
    Shift { amount: Fraction },
    /// Mirror within the current cycle when `n` is odd.
    Reverse,
    /// Scale time by `factor^n`. Only valid ungated.
    Speed { factor: Fraction },
    /// Apply each member in order with the same `n`.
    Composite(Vec<Transform>),
}

impl Transform {
    /// Shift by `offset` slots of a pattern `base_length` slots long, e.g.
    /// `shift(1, 4)` moves a four-slot pattern along by one slot.
    ///
    /// A zero `base_length` is treated as one.
    pub fn shift(offset: impl Into<Fraction>, base_length: impl Into<Fraction>) -> Self {
        let offset = offset.into();
        let base_length = base_length.into();
        let amount = if base_length.is_zero() {
            offset
        } else {
            offset / base_length
        };
        Transform::Shift { amount }
    }

    /// Shift by `amount` cycles.
    pub fn shift_by(amount: impl Into<Fraction>) -> Self {
        Transform::Shift {
            amount: amount.into(),
        }
    }

    pub fn reverse() -> Self {
        Transform::Reverse
    }

    pub fn speed(factor: impl Into<Fraction>) -> Self {
        Transform::Speed {
            factor: factor.into(),
        }
    }

    pub fn composite(transforms: Vec<Transform>) -> Self {
        Transform::Composite(transforms)
    }

    /// Whether a `Speed` appears anywhere in this transform.
    pub fn contains_speed(&self) -> bool {
        match self {
            Transform::Speed { .. } => true,
            Transform::Composite(members) => members.iter().any(Transform::contains_speed),
            _ => false,
        }
    }

    pub fn apply(&self, n: i64, interval: Interval) -> Interval {
        self.apply_window(n, Window::forward(interval)).interval()
    }

    /// Apply to a window, tracking whether reversal has mirrored it.
    pub fn apply_window(&self, n: i64, window: Window) -> Window {
        match self {
            Transform::Shift { amount } => {
                let delta = *amount * Fraction::from_integer(n);
                if delta.is_zero() {
                    window
                } else {
                    window.rotate(delta)
                }
            }
            Transform::Reverse => {
                if n.is_odd() {
                    window.reflect()
                } else {
                    window
                }
            }
            Transform::Speed { factor } => {
                let exp = n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
                if factor.is_zero() && exp < 0 {
                    return window;
                }
                window.scale(factor.pow(exp))
            }
            Transform::Composite(members) => members
                .iter()
                .fold(window, |local, member| member.apply_window(n, local)),
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Shift { amount } => write!(f, "shift({})", amount),
            Transform::Reverse => write!(f, "reverse"),
            Transform::Speed { factor } => write!(f, "speed({})", factor),
            Transform::Composite(members) => {
                write!(f, "[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A transform and the period that gates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    period: Option<Fraction>,
    transform: Transform,
}

impl Stage {
    /// A stage applied on every query with `n = 1`.
    pub fn always(transform: Transform) -> Self {
        Stage {
            period: None,
            transform,
        }
    }

    /// A stage applied with `n` = whole periods elapsed.
    pub fn every(period: impl Into<Fraction>, transform: Transform) -> Result<Self> {
        let period = period.into();
        if period <= Fraction::zero() {
            return Err(LoomError::composition(format!(
                "every() needs a positive period, got {}",
                period
            )));
        }
        if transform.contains_speed() {
            return Err(LoomError::composition(format!(
                "speed cannot be period-gated: every({}, {})",
                period, transform
            )));
        }
        Ok(Stage {
            period: Some(period),
            transform,
        })
    }

    pub fn period(&self) -> Option<Fraction> {
        self.period
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Elapsed-period count for a query starting at `t`.
    pub fn step_count(&self, t: Fraction) -> i64 {
        match self.period {
            None => 1,
            Some(period) => t.periods_elapsed(period),
        }
    }
}

/// Maps a global query interval to the local interval a pattern samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    speed: Fraction,
    stages: Vec<Stage>,
    looped: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline {
            speed: Fraction::one(),
            stages: Vec::new(),
            looped: false,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn speed(&self) -> Fraction {
        self.speed
    }

    /// Multiply the playback speed; successive calls compound.
    pub fn multiply_speed(&mut self, factor: Fraction) {
        self.speed = self.speed * factor;
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn map(&self, global: Interval) -> Interval {
        self.map_window(global).interval()
    }

    /// Like [`map`](Pipeline::map), keeping the reading direction that
    /// reversal leaves behind.
    pub fn map_window(&self, global: Interval) -> Window {
        let scaled = Window::forward(global).scale(self.speed);
        let mut local = scaled;
        for stage in &self.stages {
            let n = stage.step_count(scaled.interval().start());
            local = stage.transform.apply_window(n, local);
        }
        if self.looped {
            local = local.wrap();
        }
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(n: i64, d: i64) -> Fraction {
        Fraction::new(n, d)
    }

    fn at(n: i64, d: i64) -> Interval {
        Interval::point(f(n, d))
    }

    #[test]
    fn test_shift_then_unshift_is_identity() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::always(Transform::shift_by(f(1, 3))));
        pipeline.push(Stage::always(Transform::shift_by(f(-1, 3))));
        for k in 0..12 {
            let q = at(k, 8);
            assert_eq!(pipeline.map(q), q);
        }
    }

    #[test]
    fn test_reverse_twice_is_identity() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::always(Transform::reverse()));
        pipeline.push(Stage::always(Transform::reverse()));
        let q = Interval::new(f(1, 8), f(3, 8));
        assert_eq!(pipeline.map(q), q);
    }

    #[test]
    fn test_every_shift_accumulates() {
        let stage = Stage::every(1, Transform::shift(1, 4)).unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.push(stage);
        // cycle 2, slot 1 samples slot 3 of cycle 2
        assert_eq!(pipeline.map(at(19, 8)), at(23, 8));
        // cycle 0 is untouched
        assert_eq!(pipeline.map(at(1, 8)), at(1, 8));
    }

    #[test]
    fn test_every_reverse_toggles() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::every(1, Transform::reverse()).unwrap());
        pipeline.set_looped(true);
        assert_eq!(pipeline.map(at(1, 8)), at(1, 8));
        assert_eq!(pipeline.map(at(9, 8)), at(7, 8));
        assert_eq!(pipeline.map(at(17, 8)), at(1, 8));
    }

    #[test]
    fn test_speed_scales_before_stages() {
        let mut pipeline = Pipeline::new();
        pipeline.multiply_speed(f(2, 1));
        pipeline.push(Stage::every(1, Transform::reverse()).unwrap());
        // 5/8 global is 5/4 scaled: cycle 1, reversed
        assert_eq!(pipeline.map(at(5, 8)), at(7, 4));
        pipeline.multiply_speed(f(1, 4));
        assert_eq!(pipeline.speed(), f(1, 2));
    }

    #[test]
    fn test_gated_speed_is_rejected() {
        assert!(matches!(
            Stage::every(2, Transform::speed(2)),
            Err(LoomError::InvalidComposition(_))
        ));
        let nested = Transform::composite(vec![Transform::reverse(), Transform::speed(2)]);
        assert!(Stage::every(1, nested).is_err());
        assert!(Stage::every(0, Transform::reverse()).is_err());
    }

    #[test]
    fn test_speed_transform_raises_to_n() {
        let speed = Transform::speed(2);
        assert_eq!(speed.apply(3, at(1, 8)), at(1, 1));
        assert_eq!(speed.apply(-1, at(1, 2)), at(1, 4));
    }

    #[test]
    fn test_reverse_reads_slot_starts_from_the_right() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Stage::always(Transform::reverse()));
        let events = crate::event::EventCollection::from_digits("0123").unwrap();
        let read = |t: Interval| {
            let window = pipeline.map_window(t);
            events.last_active_in(&window).map(|e| e.value())
        };
        assert_eq!(read(at(0, 4)), Some(1.0));
        assert_eq!(read(at(1, 4)), Some(2.0 / 3.0));
        assert_eq!(read(at(2, 4)), Some(1.0 / 3.0));
        assert_eq!(read(at(3, 4)), Some(0.0));

        pipeline.push(Stage::always(Transform::reverse()));
        let read = |t: Interval| {
            let window = pipeline.map_window(t);
            events.last_active_in(&window).map(|e| e.value())
        };
        assert_eq!(read(at(0, 4)), Some(0.0));
        assert_eq!(read(at(1, 4)), Some(1.0 / 3.0));
    }

    #[test]
    fn test_composite_uses_same_n() {
        let both = Transform::composite(vec![Transform::shift_by(f(1, 4)), Transform::reverse()]);
        // n = 1: shift 1/8 -> 3/8, reflect -> 5/8
        assert_eq!(both.apply(1, at(1, 8)), at(5, 8));
        // n = 2: shift by 1/2 only
        assert_eq!(both.apply(2, at(1, 8)), at(5, 8));
    }
}
