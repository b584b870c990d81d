//! Events and the collections that hold them.
//!
//! An [`Event`] is a value held constant over an [`Interval`]. Unlike a
//! continuous signal it has a definite start and end, which is what makes
//! onset and release detection possible. Events derived from other events
//! (by a [`Rewriter`](crate::rewrite::Rewriter)) remember where they came
//! from through an [`EventId`], an index into the source collection rather
//! than a pointer, so the two collections stay independent.

use crate::error::{LoomError, Result};
use crate::fraction::Fraction;
use crate::interval::{Interval, Window};

/// Position of an event inside the [`EventCollection`] it was added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub usize);

/// A value active during an interval. A value of 0.0 is a rest.
#[derive(Debug, Clone)]
pub struct Event {
    interval: Interval,
    value: f64,
    parent: Option<EventId>,
}

impl Event {
    pub fn new(interval: Interval, value: f64) -> Self {
        Event {
            interval,
            value,
            parent: None,
        }
    }

    /// An event derived from the event `parent` of some other collection.
    pub fn with_parent(interval: Interval, value: f64, parent: EventId) -> Self {
        Event {
            interval,
            value,
            parent: Some(parent),
        }
    }

    /// An event occupying `[0, duration)`.
    pub fn evt(duration: Fraction, value: f64) -> Self {
        Event::new(Interval::zero_to(duration), value)
    }

    pub fn rest(duration: Fraction) -> Self {
        Event::evt(duration, 0.0)
    }

    /// A MIDI note, scaled so that note 127 has value 1.0.
    pub fn note(duration: Fraction, midi_note: u8) -> Self {
        Event::evt(duration, f64::from(midi_note) / 127.0)
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn parent(&self) -> Option<EventId> {
        self.parent
    }

    pub fn is_rest(&self) -> bool {
        self.value == 0.0
    }

    /// Whether this event is active while `query` is sampled. See
    /// [`Interval::is_active_during`].
    pub fn contained_by(&self, query: &Interval) -> bool {
        self.interval.is_active_during(query)
    }

    /// Lay events end to end. Each event is moved to start where the previous
    /// one ended; rests are dropped but still take up their time.
    pub fn seq<'a, I>(events: I) -> Vec<Event>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut offset = Fraction::zero();
        let mut sequenced = Vec::new();
        for event in events {
            if !event.is_rest() {
                sequenced.push(Event::new(event.interval.add(offset), event.value));
            }
            offset = offset + event.interval.size();
        }
        sequenced
    }
}

impl PartialEq for Event {
    /// Events compare by interval and value; provenance is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.interval == other.interval && self.value.to_bits() == other.value.to_bits()
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event({} == {})", self.interval, self.value)
    }
}

/// An ordered bag of events. Insertion order matters: when several events
/// are active at once the last one inserted wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCollection {
    events: Vec<Event>,
}

impl EventCollection {
    pub fn new() -> Self {
        EventCollection::default()
    }

    /// Parse a string of digits into one cycle of equal slots.
    ///
    /// `"0123"` becomes four quarter-cycle events valued 0, 1/3, 2/3 and 1:
    /// each digit is divided by the largest digit in the string.
    pub fn from_digits(digits: &str) -> Result<Self> {
        let values = digits
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                c.to_digit(10).map(f64::from).ok_or_else(|| {
                    LoomError::pattern(format!("'{}' is not a digit in {:?}", c, digits))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Self::from_values(&values)
    }

    /// One cycle of equal slots with the given values, normalised by the
    /// largest one.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(LoomError::pattern(format!(
                "slot values must be finite and non-negative, got {}",
                bad
            )));
        }

        let max = values.iter().cloned().fold(0.0_f64, f64::max);
        let slots = values.len() as i64;
        let mut collection = EventCollection::new();
        for (i, value) in values.iter().enumerate() {
            let start = Fraction::new(i as i64, slots);
            let end = Fraction::new(i as i64 + 1, slots);
            let normalised = if max > 0.0 { value / max } else { 0.0 };
            collection.add(Event::new(Interval::new(start, end), normalised));
        }
        Ok(collection)
    }

    /// Append an event and return its id.
    pub fn add(&mut self, event: Event) -> EventId {
        self.events.push(event);
        EventId(self.events.len() - 1)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events paired with their ids, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// All events active while `query` is sampled, in insertion order.
    pub fn events_active_during<'a>(
        &'a self,
        query: &'a Interval,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.contained_by(query))
    }

    /// The event that determines the sampled value: the last one inserted
    /// among those active during `query`.
    pub fn last_active_during(&self, query: &Interval) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.contained_by(query))
    }

    /// Like [`last_active_during`](EventCollection::last_active_during), but
    /// honours a mirrored window's containment rule.
    pub fn last_active_in(&self, window: &Window) -> Option<&Event> {
        self.events.iter().rev().find(|e| window.admits(&e.interval))
    }

    /// Smallest interval covering every event.
    pub fn extent(&self) -> Option<Interval> {
        let start = self.events.iter().map(|e| e.interval.start()).min()?;
        let end = self.events.iter().map(|e| e.interval.end()).max()?;
        Some(Interval::new(start, end))
    }
}

impl Extend<Event> for EventCollection {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

impl FromIterator<Event> for EventCollection {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        EventCollection {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventCollection {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
