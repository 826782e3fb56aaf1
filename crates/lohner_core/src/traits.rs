use crate::error::Result;
use crate::hessian::Hessian;
use nalgebra::{DMatrix, DVector};
use num_traits::{One, Zero};
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A trait for types that can be used as scalars in rigorous set arithmetic.
///
/// Two families implement it: point scalars (`f64`), for which every value is its own
/// enclosure, and intervals, for which every operation returns a superset of the exact
/// result. Algorithms are written once against this contract.
pub trait Scalar:
    nalgebra::Scalar
    + Copy
    + Debug
    + Display
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + 'static
{
    /// `true` for rigorous (interval) scalars.
    const IS_INTERVAL: bool;

    fn from_f64(value: f64) -> Self;

    /// Smallest representable value containing `[lo, hi]`.
    /// Point scalars return the midpoint.
    fn from_bounds(lo: f64, hi: f64) -> Self;

    fn left(&self) -> f64;
    fn right(&self) -> f64;

    /// Thin midpoint of the value.
    fn mid(&self) -> Self;

    /// Width, rounded up.
    fn diam(&self) -> f64;

    fn abs(&self) -> Self;
    fn sqrt(&self) -> Self;

    /// `true` when the value cannot be used as a divisor (contains zero).
    fn is_singular(&self) -> bool;

    fn contains(&self, value: f64) -> bool;

    fn subset(&self, other: &Self) -> bool;

    /// Common part of two enclosures, `None` when they are disjoint.
    fn intersection(&self, other: &Self) -> Option<Self>;

    fn hull(&self, other: &Self) -> Self;

    /// Decomposes `self` into a thin center and a zero-centered remainder
    /// with `self ⊆ center + remainder`.
    fn split(&self) -> (Self, Self) {
        let center = self.mid();
        (center, *self - center)
    }

    /// Upper bound of the square.
    fn right_sqr(&self) -> f64 {
        (*self * *self).right()
    }
}

impl Scalar for f64 {
    const IS_INTERVAL: bool = false;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn from_bounds(lo: f64, hi: f64) -> Self {
        0.5 * (lo + hi)
    }

    fn left(&self) -> f64 {
        *self
    }

    fn right(&self) -> f64 {
        *self
    }

    fn mid(&self) -> Self {
        *self
    }

    fn diam(&self) -> f64 {
        0.0
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    fn is_singular(&self) -> bool {
        *self == 0.0
    }

    fn contains(&self, value: f64) -> bool {
        *self == value
    }

    fn subset(&self, other: &Self) -> bool {
        self == other
    }

    // Point values carry no width: the left operand is kept.
    fn intersection(&self, _other: &Self) -> Option<Self> {
        Some(*self)
    }

    fn hull(&self, other: &Self) -> Self {
        if f64::abs(*other) > f64::abs(*self) {
            *other
        } else {
            *self
        }
    }
}

/// One-step bound `Φ(t, x') ∈ y + jac_phi·(x' - x) + rem` for all `x'` in the input set.
#[derive(Debug, Clone)]
pub struct C0Enclosure<S: Scalar> {
    pub y: DVector<S>,
    pub rem: DVector<S>,
    /// Enclosure of the whole trajectory segment.
    pub enc: DVector<S>,
    pub jac_phi: DMatrix<S>,
}

/// C0 data plus a bound on the derivative of the flow with respect to initial conditions:
/// `DΦ ∈ jac_phi + jac_rem` over the input set.
#[derive(Debug, Clone)]
pub struct C1Enclosure<S: Scalar> {
    pub c0: C0Enclosure<S>,
    pub jac_rem: DMatrix<S>,
    pub jac_enc: DMatrix<S>,
}

/// C1 data plus second derivatives: `D²Φ ∈ lh + rh` over the input set,
/// `eh` encloses the Hessian along the whole segment.
#[derive(Debug, Clone)]
pub struct C2Enclosure<S: Scalar> {
    pub c1: C1Enclosure<S>,
    pub lh: Hessian<S>,
    pub rh: Hessian<S>,
    pub eh: Hessian<S>,
}

/// Output of a jet evaluation: the C0 bound, the linear part acting on every higher
/// jet coefficient and the nonlinear contribution for each of them.
#[derive(Debug, Clone)]
pub struct CnEnclosure<S: Scalar> {
    pub c0: C0Enclosure<S>,
    pub jacobian: DMatrix<S>,
    pub nonlinear: Vec<DVector<S>>,
}

/// Hermite-Obreshkov corrector data.
///
/// `psi_plus`/`j_plus` are the forward Taylor part (and its derivative over the set)
/// evaluated at the working point, `psi_minus`/`j_minus` the backward part evaluated at
/// the center of the predicted image (derivative over the whole predicted image).
#[derive(Debug, Clone)]
pub struct HoCorrector<S: Scalar> {
    pub psi_plus: DVector<S>,
    pub j_plus: DMatrix<S>,
    pub psi_minus: DVector<S>,
    pub j_minus: DMatrix<S>,
}

/// A dynamical system able to produce rigorous one-step bounds (flow or map).
pub trait C0EnclosureMap<S: Scalar> {
    /// Returns the dimension of the phase space.
    fn dimension(&self) -> usize;

    /// Time advanced by one call to the enclosure methods.
    fn step(&self) -> S;

    /// t: current time
    /// x: working point (thin) inside `set`
    /// set: interval hull of the current set
    fn enclose_c0_map(&mut self, t: S, x: &DVector<S>, set: &DVector<S>)
        -> Result<C0Enclosure<S>>;
}

pub trait C1EnclosureMap<S: Scalar>: C0EnclosureMap<S> {
    fn enclose_c1_map(&mut self, t: S, x: &DVector<S>, set: &DVector<S>)
        -> Result<C1Enclosure<S>>;
}

pub trait C2EnclosureMap<S: Scalar>: C1EnclosureMap<S> {
    fn enclose_c2_map(&mut self, t: S, x: &DVector<S>, set: &DVector<S>)
        -> Result<C2Enclosure<S>>;
}

pub trait CnEnclosureMap<S: Scalar>: C0EnclosureMap<S> {
    /// jet: current enclosure of every jet coefficient, value first.
    fn enclose_cn_map(
        &mut self,
        t: S,
        x: &DVector<S>,
        set: &DVector<S>,
        jet: &[DVector<S>],
    ) -> Result<CnEnclosure<S>>;
}

pub trait HoEnclosureMap<S: Scalar>: C0EnclosureMap<S> {
    /// Order `p + q` of the underlying Taylor method.
    fn order(&self) -> usize;

    /// t: time at the beginning of the step
    /// x, set: as in `enclose_c0_map`
    /// y, image: center and hull of the predicted image
    fn enclose_ho_corrector(
        &mut self,
        t: S,
        x: &DVector<S>,
        set: &DVector<S>,
        y: &DVector<S>,
        image: &DVector<S>,
    ) -> Result<HoCorrector<S>>;
}
