//! Deriving event collections from other event collections.

use crate::error::{LoomError, Result};
use crate::event::{Event, EventCollection};
use crate::fraction::Fraction;
use crate::pattern::{Pattern, Source};

/// Produces a new collection from an existing one, optionally linking each
/// produced event back to the event it came from.
pub trait Rewriter: Send + Sync {
    fn rewrite(&self, source: &EventCollection) -> EventCollection;

    /// Rewrite the current events of `parent`. A continuous parent has no
    /// events to rewrite and is an error.
    fn rewrite_pattern(&self, parent: &Pattern) -> Result<EventCollection> {
        match &*parent.source() {
            Source::Discrete(events) => Ok(self.rewrite(events)),
            Source::Continuous(_) => Err(LoomError::composition(
                "rewriting needs a discrete pattern",
            )),
        }
    }
}

/// Splits every non-rest event into a rising part and a trailing release
/// sliver, so that two back-to-back events still produce separate edges.
///
/// For each event with a non-zero value this emits `[start, end - ε)` with
/// value 1.0 followed by `[end - ε, end)` with value 0.0.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryRewriter {
    epsilon: Fraction,
    link_parents: bool,
}

impl BoundaryRewriter {
    /// A rewriter whose output links back to the source events.
    pub fn new(epsilon: Fraction) -> Self {
        BoundaryRewriter {
            epsilon: epsilon.abs(),
            link_parents: true,
        }
    }

    /// A rewriter whose output stands alone.
    pub fn unlinked(epsilon: Fraction) -> Self {
        BoundaryRewriter {
            epsilon: epsilon.abs(),
            link_parents: false,
        }
    }

    pub fn epsilon(&self) -> Fraction {
        self.epsilon
    }
}

impl Rewriter for BoundaryRewriter {
    fn rewrite(&self, source: &EventCollection) -> EventCollection {
        let mut derived = EventCollection::new();
        for (id, event) in source.entries().filter(|(_, e)| !e.is_rest()) {
            let [body, sliver] = event.interval().shorten_by(self.epsilon);
            if self.link_parents {
                derived.add(Event::with_parent(body, 1.0, id));
                derived.add(Event::with_parent(sliver, 0.0, id));
            } else {
                derived.add(Event::new(body, 1.0));
                derived.add(Event::new(sliver, 0.0));
            }
        }
        derived
    }
}

/// Keeps the events whose value equals `target`, as value 1.0.
#[derive(Debug, Clone, Copy)]
pub struct MatchRewriter {
    target: f64,
}

impl MatchRewriter {
    pub fn new(target: f64) -> Self {
        MatchRewriter { target }
    }
}

impl Rewriter for MatchRewriter {
    fn rewrite(&self, source: &EventCollection) -> EventCollection {
        source
            .entries()
            .filter(|(_, e)| e.value() == self.target)
            .map(|(id, e)| Event::with_parent(e.interval(), 1.0, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::interval::Interval;
    use pretty_assertions::assert_eq;

    fn f(n: i64, d: i64) -> Fraction {
        Fraction::new(n, d)
    }

    #[test]
    fn test_boundary_split_skips_rests() {
        let source = EventCollection::from_digits("1101").unwrap();
        let derived = BoundaryRewriter::new(f(1, 1000)).rewrite(&source);
        assert_eq!(derived.len(), 6);

        let parents: Vec<Option<EventId>> = derived.iter().map(|e| e.parent()).collect();
        assert_eq!(
            parents,
            vec![
                Some(EventId(0)),
                Some(EventId(0)),
                Some(EventId(1)),
                Some(EventId(1)),
                Some(EventId(3)),
                Some(EventId(3)),
            ]
        );

        let first = derived.get(EventId(0)).unwrap();
        assert_eq!(first.interval(), Interval::new(f(0, 1), f(249, 1000)));
        assert_eq!(first.value(), 1.0);
        let sliver = derived.get(EventId(1)).unwrap();
        assert_eq!(sliver.interval(), Interval::new(f(249, 1000), f(1, 4)));
        assert!(sliver.is_rest());
    }

    #[test]
    fn test_unlinked_split_has_no_parents() {
        let source = EventCollection::from_digits("1").unwrap();
        let derived = BoundaryRewriter::unlinked(f(1, 100)).rewrite(&source);
        assert!(derived.iter().all(|e| e.parent().is_none()));
    }

    #[test]
    fn test_match_keeps_equal_values() {
        let source = EventCollection::from_digits("0201").unwrap();
        let derived = MatchRewriter::new(0.5).rewrite(&source);
        assert_eq!(derived.len(), 1);
        let event = derived.get(EventId(0)).unwrap();
        assert_eq!(event.interval(), Interval::new(f(3, 4), f(1, 1)));
        assert_eq!(event.parent(), Some(EventId(3)));
    }

    #[test]
    fn test_rewrite_pattern_reads_parent_events() {
        let scheduler = crate::clock::OfflineScheduler::new(crate::config::LoomConfig::default());
        let parent = Pattern::from_digits(scheduler.loom(), "0201").unwrap();
        let derived = MatchRewriter::new(1.0).rewrite_pattern(&parent).unwrap();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived.get(EventId(0)).unwrap().parent(), Some(EventId(1)));

        let sine = crate::continuous::ContinuousFunction::sine();
        let sine = Pattern::with_function(scheduler.loom(), sine);
        assert!(matches!(
            MatchRewriter::new(1.0).rewrite_pattern(&sine),
            Err(LoomError::InvalidComposition(_))
        ));
    }
}
