//! Continuous functions of cycle time.
//!
//! Most functions are pure [`Signal`]s: the same time always gives the same
//! value, so they are shared freely between patterns. A few, like
//! [`Trigger`], carry state that changes every time they are read. Those
//! implement [`StatefulSignal`] instead, and [`ContinuousFunction`] keeps the
//! two apart so the difference shows up in the types.

use parking_lot::Mutex;
use std::any::Any;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::fraction::Fraction;
use crate::interval::Interval;
use crate::pattern::Pattern;

/// A pure mapping from cycle time to a value.
pub trait Signal: Send + Sync {
    fn value(&self, t: Fraction) -> f64;
}

/// A time function with internal state that advances on every read.
///
/// Implementations must be driven from one caller in chronological order;
/// reading out of order or from several threads gives unspecified (but
/// memory-safe) results.
pub trait StatefulSignal: Send + Sync {
    fn advance(&self, t: Fraction) -> f64;

    /// A fresh instance with the same configuration and initial state.
    fn fork(&self) -> Arc<dyn StatefulSignal>;

    /// Upcast for [`ContinuousFunction::stateful_handle`].
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// The continuous source of a pattern.
#[derive(Clone)]
pub enum ContinuousFunction {
    Pure(Arc<dyn Signal>),
    Stateful(Arc<dyn StatefulSignal>),
}

impl ContinuousFunction {
    pub fn pure<S: Signal + 'static>(signal: S) -> Self {
        ContinuousFunction::Pure(Arc::new(signal))
    }

    /// Wrap a stateful signal. The caller may keep its own `Arc` to the
    /// signal, e.g. to [`Trigger::fire`] it.
    pub fn stateful<S: StatefulSignal + 'static>(signal: Arc<S>) -> Self {
        ContinuousFunction::Stateful(signal)
    }

    pub fn constant(value: f64) -> Self {
        ContinuousFunction::pure(Constant(value))
    }

    pub fn sine() -> Self {
        ContinuousFunction::pure(Periodic::sine())
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, ContinuousFunction::Stateful(_))
    }

    /// Value over `query`.
    ///
    /// Pure functions are averaged over the two endpoints (evaluated once
    /// for a point). Stateful functions advance exactly once, at the end.
    pub fn sample(&self, query: &Interval) -> f64 {
        match self {
            ContinuousFunction::Pure(signal) => {
                if query.is_point() {
                    signal.value(query.start())
                } else {
                    (signal.value(query.start()) + signal.value(query.end())) / 2.0
                }
            }
            ContinuousFunction::Stateful(signal) => signal.advance(query.end()),
        }
    }

    /// The stateful signal as its concrete type, e.g. the [`Trigger`] a
    /// forked pattern was given. `None` for pure functions and other types.
    pub fn stateful_handle<S: StatefulSignal + 'static>(&self) -> Option<Arc<S>> {
        match self {
            ContinuousFunction::Stateful(signal) => Arc::clone(signal).into_any().downcast().ok(),
            ContinuousFunction::Pure(_) => None,
        }
    }

    /// Copy for an independent pattern: pure signals are shared, stateful
    /// ones start over.
    pub fn fork(&self) -> Self {
        match self {
            ContinuousFunction::Pure(signal) => ContinuousFunction::Pure(Arc::clone(signal)),
            ContinuousFunction::Stateful(signal) => ContinuousFunction::Stateful(signal.fork()),
        }
    }
}

impl std::fmt::Debug for ContinuousFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContinuousFunction::Pure(_) => f.write_str("ContinuousFunction::Pure"),
            ContinuousFunction::Stateful(_) => f.write_str("ContinuousFunction::Stateful"),
        }
    }
}

/// A fixed value.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl Signal for Constant {
    fn value(&self, _t: Fraction) -> f64 {
        self.0
    }
}

/// Shapes available to [`Periodic`]. All range over `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Cosine,
    Saw,
    Triangle,
    Square,
}

/// A waveform repeating every `period` cycles.
#[derive(Debug, Clone, Copy)]
pub struct Periodic {
    waveform: Waveform,
    period: Fraction,
}

impl Periodic {
    /// A non-positive period is replaced by one cycle.
    pub fn new(waveform: Waveform, period: Fraction) -> Self {
        let period = if period > Fraction::zero() {
            period
        } else {
            Fraction::one()
        };
        Periodic { waveform, period }
    }

    /// `(sin(2πt) + 1) / 2`: 1.0 at a quarter cycle, 0.0 at three quarters.
    pub fn sine() -> Self {
        Periodic::new(Waveform::Sine, Fraction::one())
    }
}

impl Signal for Periodic {
    fn value(&self, t: Fraction) -> f64 {
        let phase = (t / self.period).cycle_pos().to_f64();
        match self.waveform {
            Waveform::Sine => ((phase * TAU).sin() + 1.0) / 2.0,
            Waveform::Cosine => ((phase * TAU).cos() + 1.0) / 2.0,
            Waveform::Saw => phase,
            Waveform::Triangle => 1.0 - (2.0 * phase - 1.0).abs(),
            Waveform::Square => {
                if phase < 0.5 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

/// `inner` as it was `offset` cycles ago.
pub struct Delay {
    inner: Arc<dyn Signal>,
    offset: Fraction,
}

impl Delay {
    pub fn new<S: Signal + 'static>(inner: S, offset: Fraction) -> Self {
        Delay {
            inner: Arc::new(inner),
            offset,
        }
    }
}

impl Signal for Delay {
    fn value(&self, t: Fraction) -> f64 {
        self.inner.value(t - self.offset)
    }
}

/// Mirrors another pattern's sampled value, turning a discrete pattern into
/// a continuous one.
pub struct Follower {
    pattern: Pattern,
}

impl Follower {
    pub fn new(pattern: Pattern) -> Self {
        Follower { pattern }
    }
}

impl Signal for Follower {
    fn value(&self, t: Fraction) -> f64 {
        self.pattern.value_over(Interval::point(t))
    }
}

/// 1.0 exactly when `inner` equals `target`, else 0.0.
pub struct Match {
    inner: Arc<dyn Signal>,
    target: f64,
}

impl Match {
    pub fn new<S: Signal + 'static>(inner: S, target: f64) -> Self {
        Match {
            inner: Arc::new(inner),
            target,
        }
    }
}

impl Signal for Match {
    fn value(&self, t: Fraction) -> f64 {
        if self.inner.value(t) == self.target {
            1.0
        } else {
            0.0
        }
    }
}

/// 1.0 when `inner` is at or above `cutoff`, else 0.0.
pub struct Threshold {
    inner: Arc<dyn Signal>,
    cutoff: f64,
}

impl Threshold {
    pub fn new<S: Signal + 'static>(inner: S, cutoff: f64) -> Self {
        Threshold {
            inner: Arc::new(inner),
            cutoff,
        }
    }
}

impl Signal for Threshold {
    fn value(&self, t: Fraction) -> f64 {
        if self.inner.value(t) >= self.cutoff {
            1.0
        } else {
            0.0
        }
    }
}

/// One-shot pulse: after [`fire`](Trigger::fire) the next read is 1.0 and
/// every read after that is 0.0 until it fires again.
#[derive(Debug, Default)]
pub struct Trigger {
    armed: AtomicBool,
    last_read: Mutex<Option<Fraction>>,
}

impl Trigger {
    pub fn new() -> Self {
        Trigger::default()
    }

    pub fn fire(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl StatefulSignal for Trigger {
    fn advance(&self, t: Fraction) -> f64 {
        {
            let mut last = self.last_read.lock();
            if let Some(previous) = *last {
                if t < previous {
                    tracing::trace!(%t, %previous, "trigger read out of order");
                }
            }
            *last = Some(t);
        }
        if self.armed.swap(false, Ordering::SeqCst) {
            1.0
        } else {
            0.0
        }
    }

    fn fork(&self) -> Arc<dyn StatefulSignal> {
        Arc::new(Trigger::new())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
