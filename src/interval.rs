//! Interval geometry over exact cycle time.
//!
//! An [`Interval`] is an ordered `(start, end)` pair of [`Fraction`]s. It is
//! used both for the extent of an event and for the window a clock asks a
//! pattern about. The cycle-relative helpers (`wrap_to_cycle`,
//! `rotate_in_cycle`, `reflect_in_cycle`) are what the transform pipeline is
//! built from.

use crate::fraction::Fraction;

/// A span of cycle time with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: Fraction,
    end: Fraction,
}

impl Interval {
    /// Create an interval. The endpoints are ordered, so
    /// `Interval::new(b, a) == Interval::new(a, b)`.
    pub fn new(start: Fraction, end: Fraction) -> Self {
        if start <= end {
            Interval { start, end }
        } else {
            Interval {
                start: end,
                end: start,
            }
        }
    }

    /// A zero-width interval at `t`.
    pub fn point(t: Fraction) -> Self {
        Interval { start: t, end: t }
    }

    /// `[0, duration)`, the building block of sequenced events.
    pub fn zero_to(duration: Fraction) -> Self {
        Interval::new(Fraction::zero(), duration)
    }

    /// Create an interval from integer cycle numbers.
    pub fn from_integers(start: i64, end: i64) -> Self {
        Interval::new(Fraction::from_integer(start), Fraction::from_integer(end))
    }

    pub fn start(&self) -> Fraction {
        self.start
    }

    pub fn end(&self) -> Fraction {
        self.end
    }

    /// `end - start`.
    pub fn size(&self) -> Fraction {
        self.end - self.start
    }

    pub fn midpoint(&self) -> Fraction {
        self.start + self.size() / Fraction::from_integer(2)
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Translate by `offset`.
    pub fn add(&self, offset: Fraction) -> Self {
        Interval {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Translate by `-offset`.
    pub fn sub(&self, offset: Fraction) -> Self {
        self.add(-offset)
    }

    /// Multiply both endpoints by `factor`.
    pub fn scale(&self, factor: Fraction) -> Self {
        Interval::new(self.start * factor, self.end * factor)
    }

    /// Split off a trailing sliver of width `epsilon`.
    ///
    /// Returns `[start, end - epsilon]` and `[end - epsilon, end]`. When the
    /// interval is not wider than `epsilon` the first part collapses to the
    /// point `start` and the second part is the whole interval.
    pub fn shorten_by(&self, epsilon: Fraction) -> [Interval; 2] {
        let cut = (self.end - epsilon.abs()).max(self.start);
        [
            Interval::new(self.start, cut),
            Interval::new(cut, self.end),
        ]
    }

    /// Whether something occupying `self` is active while `query` is sampled.
    ///
    /// Inclusive at the query's end, exclusive at this interval's end:
    /// `[0, 1)` is active during `[0.99, 1.0]` but not during `[1.0, 1.01]`.
    pub fn is_active_during(&self, query: &Interval) -> bool {
        self.start <= query.end && self.end > query.start
    }

    /// Move to cycle zero, keeping the size. The result may extend past 1 if
    /// the original straddled a cycle boundary.
    pub fn wrap_to_cycle(&self) -> Self {
        let start = self.start.cycle_pos();
        Interval {
            start,
            end: start + self.size(),
        }
    }

    /// Rotate by `delta` within the cycle containing `start`, wrapping around
    /// the cycle boundary.
    pub fn rotate_in_cycle(&self, delta: Fraction) -> Self {
        let sam = self.start.sam();
        let start = sam + (self.start + delta).cycle_pos();
        Interval {
            start,
            end: start + self.size(),
        }
    }

    /// Mirror within the cycle containing `start`: a position `p` becomes
    /// `1 - p`, and the endpoints swap roles so the size is preserved.
    pub fn reflect_in_cycle(&self) -> Self {
        let sam = self.start.sam();
        let next = sam + Fraction::one();
        Interval::new(sam + (next - self.end), sam + (next - self.start))
    }

    /// Intersection of two intervals, `None` if they are disjoint.
    ///
    /// ```rust
    /// # use weft::Interval;
    /// let a = Interval::from_integers(0, 2);
    /// let b = Interval::from_integers(1, 3);
    /// assert_eq!(a.intersection(&b), Some(Interval::from_integers(1, 2)));
    /// ```
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            None
        } else {
            Some(Interval { start, end })
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} -> {}]", self.start, self.end)
    }
}

/// Start of the cycle `t` lies in when cycles are taken as `(k, k + 1]`.
fn sam_from_left(t: Fraction) -> Fraction {
    let sam = t.sam();
    if sam == t {
        sam - Fraction::one()
    } else {
        sam
    }
}

/// A local query window and the direction it reads events in.
///
/// Reversal maps each half-open event span `[s, e)` onto `(1 - e, 1 - s]`.
/// Rather than move the events, a mirrored window flips the containment
/// rule: it includes an event's end and excludes its start. Sampling the
/// reverse of `"0123"` exactly at `0.25` therefore reads slot 2, not 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    interval: Interval,
    mirrored: bool,
}

impl Window {
    pub fn forward(interval: Interval) -> Self {
        Window {
            interval,
            mirrored: false,
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Whether an event occupying `span` is active in this window.
    pub fn admits(&self, span: &Interval) -> bool {
        if self.mirrored {
            span.start < self.interval.end && span.end >= self.interval.start
        } else {
            span.is_active_during(&self.interval)
        }
    }

    /// Scale time by `factor`; a negative factor flips the direction.
    pub fn scale(&self, factor: Fraction) -> Self {
        Window {
            interval: self.interval.scale(factor),
            mirrored: self.mirrored != factor.is_negative(),
        }
    }

    /// Rotate by `delta` within the window's cycle.
    pub fn rotate(&self, delta: Fraction) -> Self {
        if !self.mirrored {
            return Window::forward(self.interval.rotate_in_cycle(delta));
        }
        let base = sam_from_left(self.interval.end);
        let moved = self.interval.end + delta;
        let end = base + (moved - sam_from_left(moved));
        Window {
            interval: Interval::new(end - self.interval.size(), end),
            mirrored: true,
        }
    }

    /// Mirror within the window's cycle and flip the direction.
    pub fn reflect(&self) -> Self {
        let base = if self.mirrored {
            sam_from_left(self.interval.end)
        } else {
            self.interval.start.sam()
        };
        let next = base + Fraction::one();
        Window {
            interval: Interval::new(
                base + (next - self.interval.end),
                base + (next - self.interval.start),
            ),
            mirrored: !self.mirrored,
        }
    }

    /// Move to cycle zero. A mirrored window lands in `(0, 1]`.
    pub fn wrap(&self) -> Self {
        if !self.mirrored {
            return Window::forward(self.interval.wrap_to_cycle());
        }
        let end = self.interval.end - sam_from_left(self.interval.end);
        Window {
            interval: Interval::new(end - self.interval.size(), end),
            mirrored: true,
        }
    }
}

impl From<Interval> for Window {
    fn from(interval: Interval) -> Self {
        Window::forward(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(a: (i64, i64), b: (i64, i64)) -> Interval {
        Interval::new(Fraction::new(a.0, a.1), Fraction::new(b.0, b.1))
    }

    #[test]
    fn test_new_orders_endpoints() {
        let a = iv((3, 4), (1, 4));
        assert_eq!(a.start(), Fraction::new(1, 4));
        assert_eq!(a.end(), Fraction::new(3, 4));
        assert_eq!(a.size(), Fraction::new(1, 2));
    }

    #[test]
    fn test_active_during_boundaries() {
        let event = Interval::from_integers(0, 1);
        assert!(event.is_active_during(&iv((99, 100), (1, 1))));
        assert!(!event.is_active_during(&iv((1, 1), (101, 100))));
        // an event starting exactly at the query end is included
        let later = Interval::from_integers(1, 2);
        assert!(later.is_active_during(&iv((99, 100), (1, 1))));
    }

    #[test]
    fn test_shorten_by() {
        let [long, short] = Interval::from_integers(0, 1).shorten_by(Fraction::new(1, 1000));
        assert_eq!(long, iv((0, 1), (999, 1000)));
        assert_eq!(short, iv((999, 1000), (1, 1)));

        let tiny = iv((0, 1), (1, 2000));
        let [long, short] = tiny.shorten_by(Fraction::new(1, 1000));
        assert!(long.is_point());
        assert_eq!(short, tiny);
    }

    #[test]
    fn test_translate_and_scale() {
        let a = Interval::zero_to(Fraction::new(1, 4));
        assert_eq!(a.add(Fraction::one()), iv((1, 1), (5, 4)));
        assert_eq!(a.add(Fraction::one()).sub(Fraction::one()), a);
        assert_eq!(a.scale(Fraction::from_integer(2)), iv((0, 1), (1, 2)));
        assert_eq!(a.scale(Fraction::from_integer(-1)), iv((-1, 4), (0, 1)));
    }

    #[test]
    fn test_rotate_in_cycle_wraps() {
        let a = Interval::point(Fraction::new(7, 4));
        assert_eq!(
            a.rotate_in_cycle(Fraction::new(1, 2)),
            Interval::point(Fraction::new(5, 4))
        );
        assert_eq!(
            a.rotate_in_cycle(Fraction::new(-3, 4)),
            Interval::point(Fraction::from_integer(1))
        );
    }

    #[test]
    fn test_reflect_in_cycle_is_involution() {
        let a = iv((1, 1000), (2, 1000));
        let reflected = a.reflect_in_cycle();
        assert_eq!(reflected, iv((998, 1000), (999, 1000)));
        assert_eq!(reflected.reflect_in_cycle(), a);

        let b = iv((5, 4), (5, 4));
        assert_eq!(b.reflect_in_cycle(), iv((7, 4), (7, 4)));
    }

    #[test]
    fn test_wrap_to_cycle() {
        let a = iv((9, 4), (10, 4));
        assert_eq!(a.wrap_to_cycle(), iv((1, 4), (2, 4)));
        let neg = iv((-1, 4), (0, 1));
        assert_eq!(neg.wrap_to_cycle(), iv((3, 4), (1, 1)));
    }

    #[test]
    #[test]
    fn test_mirrored_window_reads_slot_before_boundary() {
        let slot1 = iv((1, 4), (2, 4));
        let slot2 = iv((2, 4), (3, 4));
        let at_half = Window::forward(Interval::point(Fraction::new(1, 2)));
        assert!(!at_half.admits(&slot1));
        assert!(at_half.admits(&slot2));

        // 1/4 reflects onto the boundary 3/4, which closes slot 2
        let reflected = Window::forward(Interval::point(Fraction::new(1, 4))).reflect();
        assert!(reflected.is_mirrored());
        assert_eq!(reflected.interval(), Interval::point(Fraction::new(3, 4)));
        assert!(reflected.admits(&slot2));
        assert!(!reflected.admits(&iv((3, 4), (1, 1))));
    }

    #[test]
    fn test_mirrored_window_keeps_its_cycle() {
        // the downbeat reflects onto the end of cycle zero
        let start = Window::forward(Interval::point(Fraction::zero())).reflect();
        assert_eq!(start.interval(), Interval::point(Fraction::one()));
        assert_eq!(start.wrap().interval(), Interval::point(Fraction::one()));
        assert_eq!(start.reflect(), Window::forward(Interval::point(Fraction::zero())));

        let rotated = start.rotate(Fraction::new(1, 4));
        assert_eq!(rotated.interval(), Interval::point(Fraction::new(1, 4)));
        assert!(rotated.is_mirrored());
    }

    #[test]
    fn test_intersection() {
        let a = Interval::from_integers(0, 1);
        let b = iv((1, 2), (3, 2));
        assert_eq!(a.intersection(&b), Some(iv((1, 2), (1, 1))));
        assert_eq!(a.intersection(&Interval::from_integers(2, 3)), None);
    }
}
