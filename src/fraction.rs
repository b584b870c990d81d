//! Exact rational time.
//!
//! Every cycle position, duration, period and speed factor in the engine is a
//! [`Fraction`]. Floating point only appears once a value leaves the engine.

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul, One, Signed, Zero};
use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Largest denominator produced when approximating an `f64`.
const MAX_APPROX_DENOM: i64 = 10_000;

/// A point in time or a duration, measured in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction(Rational64);

impl Fraction {
    /// Create a new fraction from numerator and denominator.
    pub fn new(numer: i64, denom: i64) -> Self {
        Fraction(Rational64::new(numer, denom))
    }

    /// Create a fraction from an integer.
    pub fn from_integer(n: i64) -> Self {
        Fraction(Rational64::from_integer(n))
    }

    /// Convert elapsed milliseconds to cycles for a given cycle length.
    pub fn from_millis(millis: i64, cycle_millis: i64) -> Self {
        Fraction::new(millis, cycle_millis.max(1))
    }

    /// Start of the cycle containing this time ("sam" in Tidal terms).
    pub fn sam(&self) -> Self {
        self.floor()
    }

    /// Start of the next cycle.
    pub fn next_sam(&self) -> Self {
        self.sam() + Fraction::one()
    }

    /// Position within the current cycle, always in `[0, 1)`.
    pub fn cycle_pos(&self) -> Self {
        *self - self.sam()
    }

    /// Floor to integer.
    pub fn floor(&self) -> Self {
        Fraction(self.0.floor())
    }

    /// Number of whole `period`s elapsed at this time: `floor(self / period)`.
    ///
    /// A non-positive period never elapses and yields 0.
    pub fn periods_elapsed(&self, period: Fraction) -> i64 {
        if period.0 <= Rational64::zero() {
            return 0;
        }
        (self.0 / period.0).floor().to_integer()
    }

    /// Raise to an integer power.
    pub fn pow(&self, exp: i32) -> Self {
        if exp == 0 {
            return Fraction::one();
        }
        Fraction(self.0.pow(exp))
    }

    /// Convert to f64 for output values.
    pub fn to_f64(&self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }

    pub fn zero() -> Self {
        Fraction(Rational64::zero())
    }

    /// One whole cycle.
    pub fn one() -> Self {
        Fraction(Rational64::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn abs(&self) -> Self {
        Fraction(self.0.abs())
    }

    /// `self + other`, or `None` if the result does not fit.
    pub fn checked_add(&self, other: Fraction) -> Option<Self> {
        self.0.checked_add(&other.0).map(Fraction)
    }

    /// `self * other`, or `None` if the result does not fit.
    pub fn checked_mul(&self, other: Fraction) -> Option<Self> {
        self.0.checked_mul(&other.0).map(Fraction)
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::zero()
    }
}

impl From<i64> for Fraction {
    fn from(n: i64) -> Self {
        Fraction::from_integer(n)
    }
}

impl From<i32> for Fraction {
    fn from(n: i32) -> Self {
        Fraction::from_integer(n as i64)
    }
}

impl From<Rational64> for Fraction {
    fn from(r: Rational64) -> Self {
        Fraction(r)
    }
}

impl From<f64> for Fraction {
    /// Best rational approximation with a denominator of at most 10 000,
    /// found by walking the continued-fraction convergents.
    fn from(f: f64) -> Self {
        if !f.is_finite() {
            return Fraction::zero();
        }

        let negative = f < 0.0;
        let mut rest = f.abs();

        // convergents h/k, seeded with h(-2)/k(-2) = 0/1 and h(-1)/k(-1) = 1/0
        let (mut h_prev, mut h) = (0_i64, 1_i64);
        let (mut k_prev, mut k) = (1_i64, 0_i64);

        for _ in 0..64 {
            let whole = rest.floor();
            if whole > i64::MAX as f64 {
                break;
            }
            let a = whole as i64;
            let k_next = a.saturating_mul(k).saturating_add(k_prev);
            if k_next > MAX_APPROX_DENOM {
                break;
            }
            let h_next = a.saturating_mul(h).saturating_add(h_prev);
            h_prev = h;
            h = h_next;
            k_prev = k;
            k = k_next;

            let frac = rest - whole;
            if frac < 1e-12 {
                break;
            }
            rest = 1.0 / frac;
        }

        if k == 0 {
            return Fraction::zero();
        }
        let numer = if negative { -h } else { h };
        Fraction::new(numer, k)
    }
}

impl Add for Fraction {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Fraction(self.0 + other.0)
    }
}

impl Sub for Fraction {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Fraction(self.0 - other.0)
    }
}

impl Mul for Fraction {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Fraction(self.0 * other.0)
    }
}

impl Div for Fraction {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        Fraction(self.0 / other.0)
    }
}

impl Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        Fraction(-self.0)
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numer(), self.denom())
    }
}
