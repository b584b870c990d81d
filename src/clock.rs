//! Clocks and the [`Loom`] that binds patterns to one.
//!
//! The engine never reads wall time itself. A [`Clock`] reports the current
//! query interval and the loom's [`tick`](Loom::tick) samples every pattern
//! at it. [`ManualClock`] and [`OfflineScheduler`] step time by hand, which
//! is what tests and offline rendering use; the real-time driver lives in
//! [`crate::scheduler`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use crate::config::LoomConfig;
use crate::fraction::Fraction;
use crate::interval::Interval;
use crate::pattern::{Pattern, PatternInner};

/// Source of the current query interval.
pub trait Clock: Send + Sync {
    /// The interval patterns should be sampled over right now, in cycles.
    fn now(&self) -> Interval;
    fn play(&self);
    fn pause(&self);
    fn is_playing(&self) -> bool;
    /// Stop for good. A disposed clock never plays again.
    fn dispose(&self);
}

/// A clock whose elapsed time is set explicitly.
#[derive(Debug)]
pub struct ManualClock {
    cycle_millis: i64,
    elapsed_millis: AtomicI64,
    playing: AtomicBool,
    disposed: AtomicBool,
}

impl ManualClock {
    pub fn new(cycle_millis: i64) -> Self {
        ManualClock {
            cycle_millis: cycle_millis.max(1),
            elapsed_millis: AtomicI64::new(0),
            playing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn set_elapsed_millis(&self, millis: i64) {
        self.elapsed_millis.store(millis, Ordering::SeqCst);
    }

    pub fn elapsed_millis(&self) -> i64 {
        self.elapsed_millis.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Interval {
        Interval::point(Fraction::from_millis(self.elapsed_millis(), self.cycle_millis))
    }

    fn play(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.playing.store(true, Ordering::SeqCst);
        }
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.pause();
    }
}

struct LoomInner {
    clock: Arc<dyn Clock>,
    config: LoomConfig,
    patterns: Mutex<Vec<Weak<PatternInner>>>,
}

/// The context patterns are created in: a clock, a configuration and the
/// set of top-level patterns the clock drives.
///
/// Patterns are held weakly, so dropping the last handle to a pattern
/// removes it from the loom.
#[derive(Clone)]
pub struct Loom {
    inner: Arc<LoomInner>,
}

impl Loom {
    pub fn new(clock: Arc<dyn Clock>, config: LoomConfig) -> Self {
        Loom {
            inner: Arc::new(LoomInner {
                clock,
                config,
                patterns: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn config(&self) -> &LoomConfig {
        &self.inner.config
    }

    pub fn now(&self) -> Interval {
        self.inner.clock.now()
    }

    pub fn play(&self) {
        self.inner.clock.play();
    }

    pub fn pause(&self) {
        self.inner.clock.pause();
    }

    pub fn is_playing(&self) -> bool {
        self.inner.clock.is_playing()
    }

    pub fn dispose(&self) {
        self.inner.clock.dispose();
        self.inner.patterns.lock().clear();
    }

    pub(crate) fn register(&self, pattern: &Pattern) {
        self.inner.patterns.lock().push(pattern.downgrade());
    }

    pub(crate) fn unregister(&self, pattern: &Pattern) {
        let target = pattern.downgrade();
        self.inner
            .patterns
            .lock()
            .retain(|weak| weak.strong_count() > 0 && !weak.ptr_eq(&target));
    }

    /// Live top-level patterns, in creation order.
    pub fn patterns(&self) -> Vec<Pattern> {
        let mut registered = self.inner.patterns.lock();
        registered.retain(|weak| weak.strong_count() > 0);
        registered
            .iter()
            .filter_map(Weak::upgrade)
            .map(Pattern::from_inner)
            .collect()
    }

    /// Top-level patterns that do something on their own each tick:
    /// callables, stateful callables or edge watchers.
    pub fn patterns_with_external_mappings(&self) -> Vec<Pattern> {
        self.patterns()
            .into_iter()
            .filter(Pattern::has_external_mappings)
            .collect()
    }

    /// Sample every pattern at the clock's current interval and dispatch
    /// their external mappings. Does nothing while the clock is paused.
    pub fn tick(&self) {
        if !self.is_playing() {
            return;
        }
        let now = self.now();
        tracing::trace!(%now, "tick");
        // The pattern list is copied out so callbacks may create patterns.
        for pattern in self.patterns() {
            pattern.dispatch(now);
        }
    }
}

impl std::fmt::Debug for Loom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loom")
            .field("config", &self.inner.config)
            .field("patterns", &self.inner.patterns.lock().len())
            .finish()
    }
}

/// Drives a [`Loom`] through a [`ManualClock`], one tick per
/// `tick_millis`, without touching wall time.
pub struct OfflineScheduler {
    clock: Arc<ManualClock>,
    loom: Loom,
    tick_millis: i64,
    position: Mutex<Option<i64>>,
}

impl OfflineScheduler {
    /// A paused scheduler at time zero.
    pub fn new(config: LoomConfig) -> Self {
        let clock = Arc::new(ManualClock::new(config.cycle_millis()));
        let tick_millis = config.tick_millis();
        let loom = Loom::new(Arc::clone(&clock) as Arc<dyn Clock>, config);
        OfflineScheduler {
            clock,
            loom,
            tick_millis,
            position: Mutex::new(None),
        }
    }

    pub fn loom(&self) -> &Loom {
        &self.loom
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn play(&self) {
        self.loom.play();
    }

    pub fn pause(&self) {
        self.loom.pause();
    }

    pub fn dispose(&self) {
        self.loom.dispose();
    }

    /// Move to `millis`, ticking at every step along the way.
    ///
    /// The first call starts from zero and includes it. Later calls resume
    /// one step after the previous position. Moving backwards jumps straight
    /// to `millis` and ticks once.
    pub fn set_elapsed_millis(&self, millis: i64) {
        let previous = self.position.lock().replace(millis);
        let steps: Vec<i64> = match previous {
            Some(p) if millis < p => vec![millis],
            Some(p) => self.steps_between(p + self.tick_millis, millis),
            None => self.steps_between(0.min(millis), millis),
        };
        for t in steps {
            self.clock.set_elapsed_millis(t);
            self.loom.tick();
        }
    }

    /// Advance by `millis` from the current position.
    pub fn advance_millis(&self, millis: i64) {
        let current = (*self.position.lock()).unwrap_or(0);
        self.set_elapsed_millis(current + millis);
    }

    pub fn elapsed_millis(&self) -> i64 {
        self.clock.elapsed_millis()
    }

    fn steps_between(&self, from: i64, to: i64) -> Vec<i64> {
        let mut steps: Vec<i64> = (from..=to).step_by(self.tick_millis as usize).collect();
        if steps.last().is_some_and(|&last| last != to) {
            steps.push(to);
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_reports_point() {
        let clock = ManualClock::new(1000);
        clock.set_elapsed_millis(250);
        assert_eq!(clock.now(), Interval::point(Fraction::new(1, 4)));
        assert!(!clock.is_playing());
        clock.play();
        assert!(clock.is_playing());
        clock.dispose();
        clock.play();
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_steps_cover_range() {
        let config = LoomConfig {
            tick_millis: 4,
            ..LoomConfig::default()
        };
        let scheduler = OfflineScheduler::new(config);
        assert_eq!(scheduler.steps_between(0, 10), vec![0, 4, 8, 10]);
        assert_eq!(scheduler.steps_between(3, 3), vec![3]);
        assert!(scheduler.steps_between(5, 4).is_empty());
    }

    #[test]
    fn test_set_elapsed_moves_clock() {
        let scheduler = OfflineScheduler::new(LoomConfig::default());
        scheduler.play();
        scheduler.set_elapsed_millis(500);
        assert_eq!(scheduler.elapsed_millis(), 500);
        scheduler.set_elapsed_millis(100);
        assert_eq!(scheduler.elapsed_millis(), 100);
        scheduler.advance_millis(50);
        assert_eq!(scheduler.elapsed_millis(), 150);
        assert_eq!(scheduler.loom().now(), Interval::point(Fraction::new(3, 20)));
    }
}
