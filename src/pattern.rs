//! Patterns: values that vary over cycle time.
//!
//! A [`Pattern`] is a cheap handle around shared state. It samples either a
//! collection of timed events or a continuous function, after mapping the
//! query time through its [`Pipeline`] of transforms. The sampled value is
//! then scaled, offset and clamped to `[0, 1]`, and can be turned into
//! integers, colours, callbacks or OSC messages through output mappings.
//!
//! Every mutable part of a pattern sits in its own copy-on-write cell. A
//! live-coding thread can add a transform or replace a mapping while the
//! clock thread is sampling, and the sampler simply keeps the snapshot it
//! already loaded. No lock is held while a callback runs.
//!
//! ```rust
//! use weft::prelude::*;
//!
//! let scheduler = OfflineScheduler::new(LoomConfig::default());
//! let pattern = Pattern::from_digits(scheduler.loom(), "0123").unwrap();
//! pattern.loop_cycle();
//! pattern.reverse();
//!
//! scheduler.set_elapsed_millis(100);
//! assert_eq!(pattern.get_value(), 1.0);
//! ```

use rosc::{OscBundle, OscColor, OscMessage, OscType};
use std::sync::{Arc, Weak};

use crate::clock::Loom;
use crate::color::Color;
use crate::continuous::{ContinuousFunction, Follower, Signal, StatefulSignal, Trigger};
use crate::edge::{Edge, EdgeAction, EdgeDetector};
use crate::error::{LoomError, Result};
use crate::event::{Event, EventCollection, EventId};
use crate::fraction::Fraction;
use crate::interval::{Interval, Window};
use crate::mapping::{
    integer_in_range, pick, Callback, Mapping, MappingKind, MappingRegistry, Object, OnChange,
};
use crate::notation;
use crate::osc::{self, OscSink};
use crate::rewrite::{BoundaryRewriter, Rewriter};
use crate::shared::Shared;
use crate::transform::{Pipeline, Stage, Transform};

/// What a pattern samples. Exactly one of the two, never both.
#[derive(Debug, Clone)]
pub enum Source {
    Discrete(EventCollection),
    Continuous(ContinuousFunction),
}

impl Source {
    /// Raw value over an already-transformed window. Discrete sources
    /// yield `default` where no event is active.
    pub fn sample(&self, local: &Window, default: f64) -> f64 {
        match self {
            Source::Discrete(events) => events
                .last_active_in(local)
                .map(Event::value)
                .unwrap_or(default),
            Source::Continuous(function) => function.sample(&local.interval()),
        }
    }

    pub fn events(&self) -> Option<&EventCollection> {
        match self {
            Source::Discrete(events) => Some(events),
            Source::Continuous(_) => None,
        }
    }

    /// An independent copy; stateful functions start over.
    pub fn fork(&self) -> Source {
        match self {
            Source::Discrete(events) => Source::Discrete(events.clone()),
            Source::Continuous(function) => Source::Continuous(function.fork()),
        }
    }
}

/// `v * scale + offset`, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub scale: f64,
    pub offset: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Affine {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl Affine {
    pub fn apply(&self, v: f64) -> f64 {
        (v * self.scale + self.offset).clamp(0.0, 1.0)
    }

    /// Compose with `v -> 1 - v`.
    pub fn inverted(self) -> Self {
        Affine {
            scale: -self.scale,
            offset: 1.0 - self.offset,
        }
    }

    /// Compose with `v -> v * k`.
    pub fn scaled(self, k: f64) -> Self {
        Affine {
            scale: self.scale * k,
            offset: self.offset * k,
        }
    }

    /// Compose with `v -> v + k`.
    pub fn offset_by(self, k: f64) -> Self {
        Affine {
            scale: self.scale,
            offset: self.offset + k,
        }
    }
}

pub(crate) struct PatternInner {
    loom: Loom,
    source: Shared<Source>,
    pipeline: Shared<Pipeline>,
    affine: Shared<Affine>,
    mappings: Shared<MappingRegistry>,
    detectors: Shared<Vec<Arc<EdgeDetector>>>,
    children: Shared<Vec<Pattern>>,
}

/// Handle to a pattern. Clones share the same pattern; use
/// [`fork`](Pattern::fork) for an independent copy.
#[derive(Clone)]
pub struct Pattern {
    inner: Arc<PatternInner>,
}

impl Pattern {
    /// An empty discrete pattern. It yields the loom's default value until
    /// events are added with [`extend`](Pattern::extend).
    pub fn new(loom: &Loom) -> Pattern {
        Pattern::with_events(loom, EventCollection::new())
    }

    pub fn with_events(loom: &Loom, events: EventCollection) -> Pattern {
        Pattern::registered(loom, Source::Discrete(events), Pipeline::new())
    }

    pub fn with_function(loom: &Loom, function: ContinuousFunction) -> Pattern {
        Pattern::registered(loom, Source::Continuous(function), Pipeline::new())
    }

    /// One cycle of equal slots from a digit string, e.g. `"1101"`.
    pub fn from_digits(loom: &Loom, digits: &str) -> Result<Pattern> {
        Ok(Pattern::with_events(loom, EventCollection::from_digits(digits)?))
    }

    /// One cycle of equal slots, normalised by the largest value.
    pub fn from_values(loom: &Loom, values: &[f64]) -> Result<Pattern> {
        Ok(Pattern::with_events(loom, EventCollection::from_values(values)?))
    }

    /// Import a tune written in ABC notation. See [`notation::parse_abc`].
    pub fn from_abc(loom: &Loom, text: &str) -> Result<Pattern> {
        Ok(Pattern::with_events(loom, notation::parse_abc(text)?))
    }

    /// A continuous pattern mirroring `other`'s sampled value.
    pub fn following(other: &Pattern) -> Pattern {
        let function = ContinuousFunction::pure(Follower::new(other.clone()));
        Pattern::with_function(other.loom(), function)
    }

    fn detached(loom: &Loom, source: Source, pipeline: Pipeline) -> Pattern {
        Pattern {
            inner: Arc::new(PatternInner {
                loom: loom.clone(),
                source: Shared::new(source),
                pipeline: Shared::new(pipeline),
                affine: Shared::default(),
                mappings: Shared::default(),
                detectors: Shared::default(),
                children: Shared::default(),
            }),
        }
    }

    fn registered(loom: &Loom, source: Source, pipeline: Pipeline) -> Pattern {
        let pattern = Pattern::detached(loom, source, pipeline);
        loom.register(&pattern);
        pattern
    }

    pub(crate) fn from_inner(inner: Arc<PatternInner>) -> Pattern {
        Pattern { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<PatternInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn loom(&self) -> &Loom {
        &self.inner.loom
    }

    /// Whether both handles refer to the same pattern.
    pub fn ptr_eq(&self, other: &Pattern) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // Events

    /// Add one cycle of slots parsed from a digit string. Later events win
    /// where they overlap earlier ones.
    pub fn extend(&self, digits: &str) -> Result<&Self> {
        let events = EventCollection::from_digits(digits)?;
        self.extend_events(events.iter().cloned())
    }

    /// Add one cycle of slots with the given values, normalised by the
    /// largest one.
    pub fn extend_values(&self, values: &[f64]) -> Result<&Self> {
        let events = EventCollection::from_values(values)?;
        self.extend_events(events.iter().cloned())
    }

    pub fn extend_events(&self, events: impl IntoIterator<Item = Event>) -> Result<&Self> {
        let events: Vec<Event> = events.into_iter().collect();
        let added = events.len();
        self.inner.source.update(|source| match source {
            Source::Discrete(existing) => {
                existing.extend(events);
                Ok(())
            }
            Source::Continuous(_) => Err(LoomError::composition(
                "cannot add events to a continuous pattern",
            )),
        })?;
        tracing::debug!(added, "extended pattern");
        Ok(self)
    }

    pub fn add_event(&self, event: Event) -> Result<EventId> {
        self.inner.source.update(|source| match source {
            Source::Discrete(existing) => Ok(existing.add(event)),
            Source::Continuous(_) => Err(LoomError::composition(
                "cannot add events to a continuous pattern",
            )),
        })
    }

    /// Remove every event.
    pub fn clear(&self) -> Result<&Self> {
        self.inner.source.update(|source| match source {
            Source::Discrete(existing) => {
                existing.clear();
                Ok(())
            }
            Source::Continuous(_) => Err(LoomError::composition(
                "a continuous pattern has no events to clear",
            )),
        })?;
        Ok(self)
    }

    /// The current source snapshot.
    pub fn source(&self) -> Arc<Source> {
        self.inner.source.load()
    }

    /// A copy of the current events, `None` for a continuous pattern.
    pub fn events(&self) -> Option<EventCollection> {
        self.source().events().cloned()
    }

    pub fn is_discrete(&self) -> bool {
        matches!(*self.source(), Source::Discrete(_))
    }

    pub fn is_continuous(&self) -> bool {
        !self.is_discrete()
    }

    fn discrete_events(&self, operation: &str) -> Result<EventCollection> {
        self.events().ok_or_else(|| {
            LoomError::composition(format!("{} needs a discrete pattern", operation))
        })
    }

    // Transforms

    /// Play faster by `factor`. Repeated calls multiply.
    pub fn speed(&self, factor: impl Into<Fraction>) -> &Self {
        let factor = factor.into();
        self.inner.pipeline.update(|p| p.multiply_speed(factor));
        tracing::debug!(%factor, "speed");
        self
    }

    /// Rotate by `amount` cycles.
    pub fn shift(&self, amount: impl Into<Fraction>) -> &Self {
        self.transform(Transform::shift_by(amount))
    }

    pub fn reverse(&self) -> &Self {
        self.transform(Transform::reverse())
    }

    /// Append an always-active transform.
    pub fn transform(&self, transform: Transform) -> &Self {
        tracing::debug!(%transform, "transform");
        self.inner
            .pipeline
            .update(|p| p.push(Stage::always(transform)));
        self
    }

    /// Append a transform applied with `n` = whole periods elapsed. Rejects
    /// speed changes and non-positive periods.
    pub fn every(&self, period: impl Into<Fraction>, transform: Transform) -> Result<&Self> {
        let stage = Stage::every(period, transform)?;
        tracing::debug!(?stage, "every");
        self.inner.pipeline.update(|p| p.push(stage));
        Ok(self)
    }

    /// Repeat the first cycle forever.
    pub fn loop_cycle(&self) -> &Self {
        self.inner.pipeline.update(|p| p.set_looped(true));
        self
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.inner.pipeline.load()
    }

    /// The interval this pattern samples for a global query.
    pub fn local_interval(&self, global: Interval) -> Interval {
        self.local_window(global).interval()
    }

    pub fn local_window(&self, global: Interval) -> Window {
        self.inner.pipeline.load().map_window(global)
    }

    // Values

    /// Map `v` to `1 - v`.
    pub fn invert(&self) -> &Self {
        self.inner.affine.update(|a| *a = a.inverted());
        self
    }

    pub fn scale_values(&self, k: f64) -> &Self {
        self.inner.affine.update(|a| *a = a.scaled(k));
        self
    }

    pub fn offset_values(&self, k: f64) -> &Self {
        self.inner.affine.update(|a| *a = a.offset_by(k));
        self
    }

    pub fn affine(&self) -> Affine {
        *self.inner.affine.load()
    }

    /// Value over a global query interval, in `[0, 1]`.
    pub fn value_over(&self, global: Interval) -> f64 {
        let local = self.local_window(global);
        let default = self.inner.loom.config().default_value;
        let raw = self.source().sample(&local, default);
        self.affine().apply(raw)
    }

    /// Value at the loom's current time.
    pub fn get_value(&self) -> f64 {
        self.value_over(self.inner.loom.now())
    }

    /// The stateful signal behind a continuous pattern, as its concrete
    /// type. A [`fork`](Pattern::fork) gets a fresh signal of its own, and
    /// this is how to reach it.
    pub fn stateful_signal<S: StatefulSignal + 'static>(&self) -> Option<Arc<S>> {
        match &*self.source() {
            Source::Continuous(function) => function.stateful_handle(),
            Source::Discrete(_) => None,
        }
    }

    pub fn trigger(&self) -> Option<Arc<Trigger>> {
        self.stateful_signal()
    }

    // Derivation

    /// An independent deep copy of the source, transforms and value
    /// scaling, registered with the same loom. Mappings, watchers and
    /// children are not copied.
    pub fn fork(&self) -> Pattern {
        let source = self.source().fork();
        let pipeline = Pipeline::clone(&self.pipeline());
        let forked = Pattern::registered(self.loom(), source, pipeline);
        forked.inner.affine.store(self.affine());
        forked
    }

    /// A new top-level pattern whose events mark where each of this
    /// pattern's events starts (1.0) and ends (a trailing 0.0 sliver).
    pub fn for_each(&self) -> Result<Pattern> {
        let events = self.discrete_events("for_each")?;
        let epsilon = self.inner.loom.config().edge_epsilon();
        let split = BoundaryRewriter::unlinked(epsilon).rewrite(&events);
        let pipeline = Pipeline::clone(&self.pipeline());
        Ok(Pattern::registered(self.loom(), Source::Discrete(split), pipeline))
    }

    /// Derive a child pattern by rewriting this pattern's events. The child
    /// starts with a copy of this pattern's transforms and is dispatched
    /// whenever this pattern is.
    pub fn rewrite(&self, rewriter: &dyn Rewriter) -> Result<Pattern> {
        let derived = rewriter.rewrite_pattern(self)?;
        tracing::debug!(events = derived.len(), "rewrote into child pattern");
        let pipeline = Pipeline::clone(&self.pipeline());
        let child = Pattern::detached(self.loom(), Source::Discrete(derived), pipeline);
        self.inner.children.update(|c| c.push(child.clone()));
        Ok(child)
    }

    /// Make `child` dispatch with this pattern instead of on its own.
    pub fn add_child(&self, child: &Pattern) -> Result<&Self> {
        if child.ptr_eq(self) {
            return Err(LoomError::composition("a pattern cannot be its own child"));
        }
        self.inner.loom.unregister(child);
        self.inner.children.update(|c| c.push(child.clone()));
        tracing::debug!("added child pattern");
        Ok(self)
    }

    pub fn children(&self) -> Vec<Pattern> {
        self.inner.children.load().to_vec()
    }

    // Mappings

    /// Register `mapping`, replacing any mapping of the same kind.
    pub fn set_mapping(&self, mapping: Mapping) -> Result<&Self> {
        mapping.validate()?;
        tracing::debug!(?mapping, "mapping");
        self.inner.mappings.update(|m| {
            m.insert(mapping);
        });
        Ok(self)
    }

    pub fn has_mapping(&self, kind: MappingKind) -> bool {
        self.inner.mappings.load().contains(kind)
    }

    pub fn mapping_kinds(&self) -> Vec<MappingKind> {
        self.inner.mappings.load().kinds().collect()
    }

    /// Map to an integer from `lo` to `hi`.
    pub fn map_int(&self, lo: i64, hi: i64) -> &Self {
        self.inner.mappings.update(|m| {
            m.insert(Mapping::Integer { lo, hi });
        });
        self
    }

    pub fn map_colors(&self, colors: Vec<Color>) -> Result<&Self> {
        self.set_mapping(Mapping::Color(colors))
    }

    pub fn map_color_blend(&self, colors: Vec<Color>) -> Result<&Self> {
        self.set_mapping(Mapping::ColorBlend(colors))
    }

    pub fn map_objects(&self, objects: Vec<Object>) -> Result<&Self> {
        self.set_mapping(Mapping::Object(objects))
    }

    /// Call the callback picked by the value on every tick.
    pub fn map_callables(&self, callbacks: Vec<Callback>) -> Result<&Self> {
        self.set_mapping(Mapping::Callable(callbacks))
    }

    /// Call the callback picked by the value whenever the pick changes.
    pub fn map_on_change(&self, callbacks: Vec<Callback>) -> Result<&Self> {
        self.set_mapping(Mapping::StatefulCallable(Arc::new(OnChange::new(callbacks))))
    }

    /// Build a one-argument OSC message at `address` whose argument comes
    /// from the `source` mapping (integer, colour or colour blend).
    pub fn map_osc_message(&self, address: &str, source: MappingKind) -> Result<&Self> {
        self.set_mapping(Mapping::OscMessage {
            address: address.to_string(),
            source,
        })
    }

    /// Bundle the OSC messages of `patterns` and send the bundle to `sink`
    /// at every onset of this pattern.
    pub fn map_osc_bundle(&self, patterns: Vec<Pattern>, sink: Arc<dyn OscSink>) -> Result<&Self> {
        self.set_mapping(Mapping::OscBundle(patterns))?;
        self.add_detector(Edge::Onset, EdgeAction::SendBundle(sink))?;
        Ok(self)
    }

    fn mapping(&self, kind: MappingKind) -> Result<Mapping> {
        self.inner.mappings.load().require(kind).map(Mapping::clone)
    }

    pub fn as_int(&self) -> Result<i64> {
        match self.mapping(MappingKind::Integer)? {
            Mapping::Integer { lo, hi } => Ok(integer_in_range(lo, hi, self.get_value())),
            _ => Err(LoomError::MissingMapping(MappingKind::Integer)),
        }
    }

    pub fn as_color(&self) -> Result<Color> {
        match self.mapping(MappingKind::Color)? {
            Mapping::Color(colors) => pick(&colors, self.get_value())
                .copied()
                .ok_or(LoomError::MissingMapping(MappingKind::Color)),
            _ => Err(LoomError::MissingMapping(MappingKind::Color)),
        }
    }

    pub fn as_color_blend(&self) -> Result<Color> {
        match self.mapping(MappingKind::ColorBlend)? {
            Mapping::ColorBlend(colors) => Color::blend(&colors, self.get_value())
                .ok_or(LoomError::MissingMapping(MappingKind::ColorBlend)),
            _ => Err(LoomError::MissingMapping(MappingKind::ColorBlend)),
        }
    }

    pub fn as_object(&self) -> Result<Object> {
        match self.mapping(MappingKind::Object)? {
            Mapping::Object(objects) => pick(&objects, self.get_value())
                .cloned()
                .ok_or(LoomError::MissingMapping(MappingKind::Object)),
            _ => Err(LoomError::MissingMapping(MappingKind::Object)),
        }
    }

    pub fn as_callable(&self) -> Result<Callback> {
        match self.mapping(MappingKind::Callable)? {
            Mapping::Callable(callbacks) => pick(&callbacks, self.get_value())
                .cloned()
                .ok_or(LoomError::MissingMapping(MappingKind::Callable)),
            _ => Err(LoomError::MissingMapping(MappingKind::Callable)),
        }
    }

    /// The callback the current value selects. Does not touch the
    /// change-detection state.
    pub fn as_stateful_callable(&self) -> Result<Callback> {
        match self.mapping(MappingKind::StatefulCallable)? {
            Mapping::StatefulCallable(on_change) => on_change
                .current(self.get_value())
                .ok_or(LoomError::MissingMapping(MappingKind::StatefulCallable)),
            _ => Err(LoomError::MissingMapping(MappingKind::StatefulCallable)),
        }
    }

    pub fn as_osc_message(&self) -> Result<OscMessage> {
        let (address, source) = match self.mapping(MappingKind::OscMessage)? {
            Mapping::OscMessage { address, source } => (address, source),
            _ => return Err(LoomError::MissingMapping(MappingKind::OscMessage)),
        };
        let arg = match source {
            MappingKind::Integer => {
                let n = self.as_int()?;
                OscType::Int(n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
            }
            MappingKind::Color => color_arg(self.as_color()?),
            MappingKind::ColorBlend => color_arg(self.as_color_blend()?),
            other => {
                return Err(LoomError::composition(format!(
                    "an OSC message argument cannot come from a {:?} mapping",
                    other
                )))
            }
        };
        Ok(osc::message(&address, arg))
    }

    /// A bundle of the messages of every bundled pattern that has an OSC
    /// message mapping.
    pub fn as_osc_bundle(&self) -> Result<OscBundle> {
        let patterns = match self.mapping(MappingKind::OscBundle)? {
            Mapping::OscBundle(patterns) => patterns,
            _ => return Err(LoomError::MissingMapping(MappingKind::OscBundle)),
        };
        let messages = patterns
            .iter()
            .filter(|p| p.has_mapping(MappingKind::OscMessage))
            .map(Pattern::as_osc_message)
            .collect::<Result<Vec<_>>>()?;
        Ok(osc::bundle(messages))
    }

    // Edges

    /// Call a callback each time the value rises from zero. The callback is
    /// picked by the value of the event that started, so with
    /// `extend_values` callback `i` answers to value `i`.
    pub fn on_onset(&self, callbacks: Vec<Callback>) -> Result<&Self> {
        self.add_detector(Edge::Onset, EdgeAction::Callbacks(callbacks))?;
        Ok(self)
    }

    /// Call a callback each time the value falls to zero, picked by the
    /// value of the event that ended.
    pub fn on_release(&self, callbacks: Vec<Callback>) -> Result<&Self> {
        self.add_detector(Edge::Release, EdgeAction::Callbacks(callbacks))?;
        Ok(self)
    }

    fn add_detector(&self, edge: Edge, action: EdgeAction) -> Result<()> {
        let epsilon = self.inner.loom.config().edge_epsilon();
        let detector = Arc::new(EdgeDetector::new(edge, action, epsilon)?);
        self.inner.detectors.update(|d| d.push(detector));
        tracing::debug!(?edge, "edge watcher");
        Ok(())
    }

    /// Whether the loom needs to drive this pattern: it has callables,
    /// stateful callables or edge watchers, itself or in a child.
    pub fn has_external_mappings(&self) -> bool {
        self.inner.mappings.load().has_external()
            || !self.inner.detectors.load().is_empty()
            || self
                .inner
                .children
                .load()
                .iter()
                .any(Pattern::has_external_mappings)
    }

    /// Run external mappings, edge watchers and children for one tick.
    /// Failures are logged and never stop the remaining work.
    pub(crate) fn dispatch(&self, now: Interval) {
        let mappings = self.inner.mappings.load();
        if mappings.has_external() {
            let value = self.value_over(now);
            if let Some(Mapping::Callable(callbacks)) = mappings.get(MappingKind::Callable) {
                if let Some(cb) = pick(callbacks, value) {
                    if let Err(err) = cb() {
                        tracing::warn!(error = %err, "callable failed");
                    }
                }
            }
            if let Some(Mapping::StatefulCallable(on_change)) =
                mappings.get(MappingKind::StatefulCallable)
            {
                if let Err(err) = on_change.dispatch(value) {
                    tracing::warn!(error = %err, "stateful callable failed");
                }
            }
        }

        for detector in self.inner.detectors.load().iter() {
            if let Err(err) = detector.check(self, now) {
                tracing::warn!(error = %err, edge = ?detector.edge(), "edge action failed");
            }
        }

        for child in self.inner.children.load().iter() {
            child.dispatch(now);
        }
    }
}

fn color_arg(color: Color) -> OscType {
    OscType::Color(OscColor {
        red: color.r,
        green: color.g,
        blue: color.b,
        alpha: color.a,
    })
}

impl Signal for Pattern {
    fn value(&self, t: Fraction) -> f64 {
        self.value_over(Interval::point(t))
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source())
            .field("pipeline", &self.pipeline())
            .field("affine", &self.affine())
            .field("mappings", &self.mapping_kinds())
            .field("children", &self.inner.children.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::OfflineScheduler;
    use crate::config::LoomConfig;
    use crate::continuous::Periodic;

    fn scheduler() -> OfflineScheduler {
        OfflineScheduler::new(LoomConfig::default())
    }

    fn at(n: i64, d: i64) -> Interval {
        Interval::point(Fraction::new(n, d))
    }

    #[test]
    fn test_digits_sample_by_slot() {
        let s = scheduler();
        let p = Pattern::from_digits(s.loom(), "0123").unwrap();
        assert_eq!(p.value_over(at(1, 8)), 0.0);
        assert_eq!(p.value_over(at(3, 8)), 1.0 / 3.0);
        assert_eq!(p.value_over(at(7, 8)), 1.0);
        // outside the first cycle nothing is active without looping
        assert_eq!(p.value_over(at(9, 8)), 0.0);
        p.loop_cycle();
        assert_eq!(p.value_over(at(15, 8)), 1.0);
    }

    #[test]
    fn test_new_pattern_is_empty_and_extendable() {
        let s = scheduler();
        let p = Pattern::new(s.loom());
        assert!(p.is_discrete());
        assert_eq!(p.value_over(at(1, 2)), 0.0);
        p.extend("01").unwrap();
        assert_eq!(p.value_over(at(3, 4)), 1.0);
        p.clear().unwrap();
        assert_eq!(p.value_over(at(3, 4)), 0.0);
    }

    #[test]
    fn test_extend_rejects_continuous() {
        let s = scheduler();
        let p = Pattern::with_function(s.loom(), ContinuousFunction::sine());
        assert!(matches!(p.extend("1"), Err(LoomError::InvalidComposition(_))));
        assert!(p.clear().is_err());
        assert!(p.for_each().is_err());
        assert!(p.rewrite(&BoundaryRewriter::new(Fraction::new(1, 1000))).is_err());
    }

    #[test]
    fn test_affine_chain() {
        let s = scheduler();
        let p = Pattern::from_values(s.loom(), &[1.0, 4.0]).unwrap();
        p.invert();
        assert_eq!(p.value_over(at(1, 4)), 0.75);
        assert_eq!(p.value_over(at(3, 4)), 0.0);
        p.scale_values(2.0).offset_values(-0.5);
        assert_eq!(p.value_over(at(1, 4)), 1.0);
        assert_eq!(p.affine(), Affine { scale: -2.0, offset: 1.5 });
    }

    #[test]
    fn test_fork_is_independent() {
        let s = scheduler();
        let p = Pattern::from_digits(s.loom(), "12").unwrap();
        p.map_int(0, 10);
        let copy = p.fork();
        copy.reverse();
        copy.extend("0").unwrap();

        assert_eq!(p.value_over(at(1, 4)), 0.5);
        assert_eq!(p.pipeline().stages().len(), 0);
        assert_eq!(copy.events().unwrap().len(), 3);
        assert!(!copy.has_mapping(MappingKind::Integer));
        assert_eq!(s.loom().patterns().len(), 2);
    }

    #[test]
    fn test_rewrite_makes_child() {
        let s = scheduler();
        let p = Pattern::from_digits(s.loom(), "11").unwrap();
        p.speed(2);
        let child = p.rewrite(&BoundaryRewriter::new(Fraction::new(1, 100))).unwrap();
        assert_eq!(p.children().len(), 1);
        assert_eq!(child.pipeline().speed(), Fraction::from_integer(2));
        assert_eq!(child.events().unwrap().len(), 4);
        // children are not top-level
        assert_eq!(s.loom().patterns().len(), 1);
    }

    #[test]
    fn test_add_child_unregisters() {
        let s = scheduler();
        let parent = Pattern::new(s.loom());
        let child = Pattern::new(s.loom());
        assert_eq!(s.loom().patterns().len(), 2);
        parent.add_child(&child).unwrap();
        assert_eq!(s.loom().patterns().len(), 1);
        assert!(parent.add_child(&parent).is_err());
    }

    #[test]
    fn test_missing_mappings() {
        let s = scheduler();
        let p = Pattern::new(s.loom());
        assert!(matches!(p.as_int(), Err(LoomError::MissingMapping(MappingKind::Integer))));
        assert!(matches!(
            p.as_osc_bundle(),
            Err(LoomError::MissingMapping(MappingKind::OscBundle))
        ));
        assert!(p.map_colors(vec![]).is_err());
    }

    #[test]
    fn test_pattern_is_a_signal() {
        let s = scheduler();
        let sine = Pattern::with_function(s.loom(), ContinuousFunction::pure(Periodic::sine()));
        let follower = Pattern::following(&sine);
        assert!((follower.value_over(at(1, 4)) - 1.0).abs() < 1e-9);
        assert!(follower.is_continuous());
    }
}
