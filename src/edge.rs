//! Onset and release detection.
//!
//! An [`EdgeDetector`] remembers the value it saw on the previous check and
//! fires when the value crosses zero. For discrete patterns it watches a
//! boundary-split copy of the pattern's events, so two back-to-back events
//! with the same value still produce two onsets. The split only marks where
//! events start and end; the value it reports is the event's own value after
//! the pattern's scale and offset, so an inverted pattern fires on its rests.
//! The copy is rebuilt whenever the pattern's events change.

use parking_lot::Mutex;
use rosc::OscPacket;
use std::sync::Arc;

use crate::error::{LoomError, Result};
use crate::event::{Event, EventCollection, EventId};
use crate::fraction::Fraction;
use crate::interval::Interval;
use crate::mapping::{pick_index, Callback};
use crate::osc::OscSink;
use crate::pattern::{Pattern, Source};
use crate::rewrite::{BoundaryRewriter, Rewriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Zero to non-zero.
    Onset,
    /// Non-zero to zero.
    Release,
}

/// What to do when the edge is seen.
#[derive(Clone)]
pub enum EdgeAction {
    /// Fire the callback picked by the value that caused the edge.
    Callbacks(Vec<Callback>),
    /// Send the pattern's OSC bundle.
    SendBundle(Arc<dyn OscSink>),
}

#[derive(Default)]
struct EdgeState {
    previous_value: f64,
    previous_parent: Option<EventId>,
    last_check: Option<Fraction>,
    split: Option<(Arc<Source>, EventCollection)>,
}

/// Most samples one check takes between two ticks. Longer gaps are treated
/// as a jump and only the new time is sampled.
const MAX_SAMPLES_PER_CHECK: i64 = 4096;

/// Watches one pattern for one kind of edge.
///
/// Checks must come from a single driver in chronological order; a check at
/// the same time as the previous one is ignored. For discrete patterns a
/// check walks the span since the previous check in steps of half the
/// release sliver, so a coarse tick still sees every event start and end.
pub struct EdgeDetector {
    edge: Edge,
    action: EdgeAction,
    epsilon: Fraction,
    state: Mutex<EdgeState>,
}

/// What a check decided while holding the state lock.
struct Crossing {
    trigger_value: f64,
}

impl EdgeDetector {
    pub fn new(edge: Edge, action: EdgeAction, epsilon: Fraction) -> Result<Self> {
        if let EdgeAction::Callbacks(callbacks) = &action {
            if callbacks.is_empty() {
                return Err(LoomError::composition(format!(
                    "{:?} detector needs at least one callback",
                    edge
                )));
            }
        }
        Ok(EdgeDetector {
            edge,
            action,
            epsilon,
            state: Mutex::new(EdgeState::default()),
        })
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Sample `pattern` up to `now` and fire for every edge since the
    /// previous check. Returns how many times it fired.
    pub fn check(&self, pattern: &Pattern, now: Interval) -> Result<usize> {
        let crossings = {
            let mut state = self.state.lock();
            let t = now.end();
            let samples = match state.last_check {
                Some(last) if t == last => return Ok(0),
                Some(last) if t < last => {
                    tracing::trace!(%t, %last, edge = ?self.edge, "edge check out of order");
                    vec![now]
                }
                Some(last) => self.samples_between(pattern, last, now),
                None => vec![now],
            };
            state.last_check = Some(t);
            samples
                .into_iter()
                .filter_map(|at| self.observe(&mut state, pattern, at))
                .collect::<Vec<_>>()
        };

        let mut fired = 0;
        for crossing in crossings {
            self.fire(pattern, crossing)?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Sample points in `(last, now]`, ending with `now` itself.
    fn samples_between(&self, pattern: &Pattern, last: Fraction, now: Interval) -> Vec<Interval> {
        if pattern.is_continuous() {
            return vec![now];
        }
        let speed = pattern.pipeline().speed().abs();
        if speed.is_zero() || self.epsilon.is_zero() {
            return vec![now];
        }
        // a sliver is `epsilon / speed` wide in global time
        let step = self.epsilon / (speed * Fraction::from_integer(2));
        let count = ((now.end() - last) / step).floor();
        if count > Fraction::from_integer(MAX_SAMPLES_PER_CHECK) {
            return vec![now];
        }
        let mut samples = Vec::new();
        let mut t = last + step;
        while t < now.end() {
            samples.push(Interval::point(t));
            t = t + step;
        }
        samples.push(now);
        samples
    }

    fn observe(&self, state: &mut EdgeState, pattern: &Pattern, at: Interval) -> Option<Crossing> {
        let source = pattern.source();
        let affine = pattern.affine();
        let (value, parent) = match &*source {
            Source::Discrete(events) => {
                let stale = match &state.split {
                    Some((seen, _)) => !Arc::ptr_eq(seen, &source),
                    None => true,
                };
                if stale {
                    let split = BoundaryRewriter::new(self.epsilon).rewrite(events);
                    state.split = Some((Arc::clone(&source), split));
                }
                let local = pattern.local_window(at);
                let marker = state
                    .split
                    .as_ref()
                    .and_then(|(_, split)| split.last_active_in(&local));
                match marker {
                    // release sliver
                    Some(marker) if marker.value() == 0.0 => (0.0, marker.parent()),
                    Some(marker) => {
                        let raw = marker
                            .parent()
                            .and_then(|id| events.get(id))
                            .map_or(marker.value(), Event::value);
                        (affine.apply(raw), marker.parent())
                    }
                    None => {
                        let default = pattern.loom().config().default_value;
                        (affine.apply(source.sample(&local, default)), None)
                    }
                }
            }
            Source::Continuous(_) => (pattern.value_over(at), None),
        };

        let previous_value = state.previous_value;
        let previous_parent = state.previous_parent;
        state.previous_value = value;
        state.previous_parent = parent;

        let rising = previous_value == 0.0 && value != 0.0;
        let falling = previous_value != 0.0 && value == 0.0;
        let (cause_value, cause_parent) = match self.edge {
            Edge::Onset if rising => (value, parent),
            Edge::Release if falling => (previous_value, previous_parent),
            _ => return None,
        };

        let trigger_value = match (&*source, cause_parent) {
            (Source::Discrete(events), Some(id)) => match events.get(id) {
                Some(event) => affine.apply(event.value()),
                None => cause_value,
            },
            _ => cause_value,
        };
        Some(Crossing { trigger_value })
    }

    fn fire(&self, pattern: &Pattern, crossing: Crossing) -> Result<()> {
        match &self.action {
            EdgeAction::Callbacks(callbacks) => {
                let index = pick_index(crossing.trigger_value, callbacks.len());
                match callbacks.get(index) {
                    Some(cb) => cb().map_err(LoomError::from),
                    None => Ok(()),
                }
            }
            EdgeAction::SendBundle(sink) => {
                let bundle = pattern.as_osc_bundle()?;
                sink.send(&OscPacket::Bundle(bundle))
            }
        }
    }
}

impl std::fmt::Debug for EdgeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDetector")
            .field("edge", &self.edge)
            .field("epsilon", &self.epsilon)
            .finish()
    }
}
