use crate::traits::Scalar;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Closed interval `[lo, hi]` over `f64` with outward rounding.
///
/// Every bound produced by an arithmetic operation is computed in round-to-nearest and
/// then moved one ulp outwards, so the result always contains the exact value.
/// Thin `0` and thin `1` operands are handled exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

fn next_down(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return x;
    }
    if x == 0.0 {
        return -f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

fn next_up(x: f64) -> f64 {
    -next_down(-x)
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        debug_assert!(!(lo > hi), "Interval::new: lower bound {lo} exceeds upper bound {hi}");
        Self { lo, hi }
    }

    pub fn point(value: f64) -> Self {
        Self { lo: value, hi: value }
    }

    /// `[-radius, radius]`
    pub fn symmetric(radius: f64) -> Self {
        let r = radius.abs();
        Self { lo: -r, hi: r }
    }

    pub fn entire() -> Self {
        Self {
            lo: f64::NEG_INFINITY,
            hi: f64::INFINITY,
        }
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn is_thin(&self) -> bool {
        self.lo == self.hi
    }

    pub fn midpoint(&self) -> f64 {
        if self.lo == f64::NEG_INFINITY || self.hi == f64::INFINITY {
            if self.lo == f64::NEG_INFINITY && self.hi == f64::INFINITY {
                return 0.0;
            }
            return if self.lo == f64::NEG_INFINITY {
                f64::MIN
            } else {
                f64::MAX
            };
        }
        let m = 0.5 * self.lo + 0.5 * self.hi;
        m.clamp(self.lo, self.hi)
    }

    /// Half-width, rounded up.
    pub fn radius(&self) -> f64 {
        let m = self.midpoint();
        next_up((self.hi - m).max(m - self.lo))
    }

    /// Upper bound of `|x|` over the interval.
    pub fn mag(&self) -> f64 {
        self.lo.abs().max(self.hi.abs())
    }

    /// Lower bound of `|x|` over the interval.
    pub fn mig(&self) -> f64 {
        if self.lo <= 0.0 && self.hi >= 0.0 {
            0.0
        } else {
            self.lo.abs().min(self.hi.abs())
        }
    }

    pub fn sqr(self) -> Self {
        if self.lo >= 0.0 {
            Self::new(next_down(self.lo * self.lo).max(0.0), next_up(self.hi * self.hi))
        } else if self.hi <= 0.0 {
            Self::new(next_down(self.hi * self.hi).max(0.0), next_up(self.lo * self.lo))
        } else {
            let m = self.mag();
            Self::new(0.0, next_up(m * m))
        }
    }

    fn thin_value(&self, value: f64) -> bool {
        self.lo == value && self.hi == value
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Self::point(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:e}, {:e}]", self.lo, self.hi)
    }
}

impl Zero for Interval {
    fn zero() -> Self {
        Self::point(0.0)
    }
    fn is_zero(&self) -> bool {
        self.thin_value(0.0)
    }
}

impl One for Interval {
    fn one() -> Self {
        Self::point(1.0)
    }
}

impl Add for Interval {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return self;
        }
        if self.is_zero() {
            return rhs;
        }
        Self::new(next_down(self.lo + rhs.lo), next_up(self.hi + rhs.hi))
    }
}

impl Neg for Interval {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.hi, -self.lo)
    }
}

impl Sub for Interval {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for Interval {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        if self.thin_value(1.0) {
            return rhs;
        }
        if rhs.thin_value(1.0) {
            return self;
        }
        if self.thin_value(-1.0) {
            return -rhs;
        }
        if rhs.thin_value(-1.0) {
            return -self;
        }
        // f64::min/max skip the NaN of 0·∞, which is the correct limit here.
        let products = [
            self.lo * rhs.lo,
            self.lo * rhs.hi,
            self.hi * rhs.lo,
            self.hi * rhs.hi,
        ];
        let lo = products.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = products.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::new(next_down(lo), next_up(hi))
    }
}

impl Div for Interval {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        if rhs.lo <= 0.0 && rhs.hi >= 0.0 {
            return Self::entire();
        }
        if rhs.thin_value(1.0) {
            return self;
        }
        if self.is_zero() {
            return Self::zero();
        }
        let quotients = [
            self.lo / rhs.lo,
            self.lo / rhs.hi,
            self.hi / rhs.lo,
            self.hi / rhs.hi,
        ];
        let lo = quotients.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = quotients.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::new(next_down(lo), next_up(hi))
    }
}

impl AddAssign for Interval {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl SubAssign for Interval {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl MulAssign for Interval {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl DivAssign for Interval {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Scalar for Interval {
    const IS_INTERVAL: bool = true;

    fn from_f64(value: f64) -> Self {
        Self::point(value)
    }

    fn from_bounds(lo: f64, hi: f64) -> Self {
        Self::new(lo, hi)
    }

    fn left(&self) -> f64 {
        self.lo
    }

    fn right(&self) -> f64 {
        self.hi
    }

    fn mid(&self) -> Self {
        Self::point(self.midpoint())
    }

    fn diam(&self) -> f64 {
        if self.is_thin() {
            0.0
        } else {
            next_up(self.hi - self.lo)
        }
    }

    fn abs(&self) -> Self {
        Self::new(self.mig(), self.mag())
    }

    fn sqrt(&self) -> Self {
        if self.hi < 0.0 {
            return Self {
                lo: f64::NAN,
                hi: f64::NAN,
            };
        }
        if self.thin_value(1.0) || self.is_zero() {
            return *self;
        }
        let lo = if self.lo <= 0.0 {
            0.0
        } else {
            next_down(self.lo.sqrt()).max(0.0)
        };
        Self::new(lo, next_up(self.hi.sqrt()))
    }

    fn is_singular(&self) -> bool {
        self.lo <= 0.0 && self.hi >= 0.0
    }

    fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }

    fn subset(&self, other: &Self) -> bool {
        other.lo <= self.lo && self.hi <= other.hi
    }

    fn intersection(&self, other: &Self) -> Option<Self> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo <= hi {
            Some(Self::new(lo, hi))
        } else {
            None
        }
    }

    fn hull(&self, other: &Self) -> Self {
        Self::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    fn right_sqr(&self) -> f64 {
        self.sqr().hi
    }
}
