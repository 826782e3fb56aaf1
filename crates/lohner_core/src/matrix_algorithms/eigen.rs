use crate::error::{check_dim, Result};
use crate::interval::Interval;
use crate::traits::Scalar;
use nalgebra::DMatrix;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiagonalizationSettings {
    /// Jacobi rotations stop once the off-diagonal sum of squares drops below
    /// `rel_tolerance` times the diagonal sum of squares.
    pub rel_tolerance: f64,
}

impl Default for DiagonalizationSettings {
    fn default() -> Self {
        Self { rel_tolerance: 1e-5 }
    }
}

fn off_diagonal_squares<S: Scalar>(d: &DMatrix<S>) -> S {
    let mut s = S::zero();
    for i in 1..d.nrows() {
        for j in 0..i {
            s += d[(i, j)] * d[(i, j)];
        }
    }
    s
}

fn diagonal_squares<S: Scalar>(d: &DMatrix<S>) -> S {
    let mut s = S::zero();
    for i in 0..d.nrows() {
        s += d[(i, i)] * d[(i, i)];
    }
    s
}

/// Brings a symmetric matrix close to diagonal form by Jacobi rotations.
///
/// The returned matrix has the same eigenvalues as `a`. Every rotation zeroes the
/// off-diagonal entry with the largest `left(|a_ij|)`; the angle is computed from
/// midpoints, the rotation itself is applied in the arithmetic of `S`. Iteration stops
/// at the relative tolerance, when no entry is certainly nonzero, or when a rotation
/// fails to decrease the off-diagonal energy, in which case the last improving iterate
/// is returned.
pub fn sym_matrix_diagonalize<S: Scalar>(
    a: &DMatrix<S>,
    settings: &DiagonalizationSettings,
) -> Result<DMatrix<S>> {
    check_dim("sym_matrix_diagonalize", a.nrows(), a.ncols())?;
    let dim = a.nrows();
    let mut d = a.clone();
    if dim <= 1 {
        return Ok(d);
    }
    let tolerance = S::from_f64(settings.rel_tolerance);
    let two = S::from_f64(2.0);
    let mut last_d = d.clone();
    let mut last_s = S::from_f64(1e16);
    let mut s = off_diagonal_squares(&d);
    let mut diag = diagonal_squares(&d);

    while !(s.right() < (diag * tolerance).left()) {
        if !(s.right() < last_s.right()) {
            debug!(
                off_diagonal = s.right(),
                previous = last_s.right(),
                "jacobi rotation did not improve, keeping last iterate"
            );
            d = last_d;
            break;
        }

        let (mut p, mut q) = (1, 0);
        let mut dominant = 0.0;
        for i in 1..dim {
            for j in 0..i {
                let element = d[(i, j)].abs().left();
                if element > dominant {
                    p = i;
                    q = j;
                    dominant = element;
                }
            }
        }
        if dominant <= 0.0 {
            break;
        }

        let alpha = (d[(q, q)].mid() - d[(p, p)].mid()) / (two * d[(p, q)].mid());
        let root = (alpha * alpha + S::one()).sqrt();
        let beta = if alpha.left() > 0.0 { alpha + root } else { alpha - root };
        let norm = (beta * beta + S::one()).sqrt();
        let sin = if alpha.left() > 0.0 {
            S::one() / norm
        } else {
            -(S::one() / norm)
        };
        let cos = beta * sin;
        let (sin2, cos2, sin_cos) = (sin * sin, cos * cos, sin * cos);

        let ap: Vec<S> = d.row(p).iter().copied().collect();
        let aq: Vec<S> = d.row(q).iter().copied().collect();
        last_d = d.clone();

        d[(p, p)] = aq[q] * sin2 - two * ap[q] * sin_cos + ap[p] * cos2;
        d[(q, q)] = aq[q] * cos2 + two * ap[q] * sin_cos + ap[p] * sin2;
        let pq = ap[q] * (cos2 - sin2) + (ap[p] - aq[q]) * sin_cos;
        d[(p, q)] = pq;
        d[(q, p)] = pq;
        for j in 0..dim {
            if j != p && j != q {
                let vp = ap[j] * cos - aq[j] * sin;
                let vq = aq[j] * cos + ap[j] * sin;
                d[(p, j)] = vp;
                d[(j, p)] = vp;
                d[(q, j)] = vq;
                d[(j, q)] = vq;
            }
        }

        last_s = s;
        diag = diagonal_squares(&d);
        s = off_diagonal_squares(&d);
        if s.is_singular() {
            break;
        }
    }
    Ok(d)
}

/// Gershgorin bounds on the eigenvalues of a (nearly diagonal) matrix.
///
/// Point scalars give the fast non-rigorous estimate from the diagonal alone; intervals
/// give rigorous bounds from the discs `D(i,i) ± Σ_{j≠i} |D(i,j)|`.
pub trait SpectralBound: Scalar {
    fn spectral_radius(d: &DMatrix<Self>) -> Self;
    fn max_eigenvalue(d: &DMatrix<Self>) -> Self;
}

impl SpectralBound for f64 {
    fn spectral_radius(d: &DMatrix<f64>) -> f64 {
        (0..d.nrows()).map(|i| d[(i, i)].abs()).fold(0.0, f64::max)
    }

    fn max_eigenvalue(d: &DMatrix<f64>) -> f64 {
        (0..d.nrows()).map(|i| d[(i, i)]).fold(f64::NEG_INFINITY, f64::max)
    }
}

fn gershgorin_disc(d: &DMatrix<Interval>, i: usize) -> Interval {
    let mut radius = Interval::zero();
    for j in 0..d.ncols() {
        if j != i {
            radius += Scalar::abs(&d[(i, j)]);
        }
    }
    d[(i, i)] + Interval::symmetric(radius.hi())
}

/// Larger of two enclosures when they are ordered, their hull otherwise.
fn certain_max(a: Interval, b: Interval) -> Interval {
    if a.hi() < b.lo() {
        b
    } else if b.hi() < a.lo() {
        a
    } else {
        a.hull(&b)
    }
}

impl SpectralBound for Interval {
    fn spectral_radius(d: &DMatrix<Interval>) -> Interval {
        (0..d.nrows()).fold(Interval::zero(), |dominant, i| {
            certain_max(dominant, Scalar::abs(&gershgorin_disc(d, i)))
        })
    }

    fn max_eigenvalue(d: &DMatrix<Interval>) -> Interval {
        (1..d.nrows()).fold(gershgorin_disc(d, 0), |dominant, i| {
            certain_max(dominant, gershgorin_disc(d, i))
        })
    }
}

/// Bound on the spectral radius of a symmetric matrix: Jacobi diagonalization followed
/// by Gershgorin.
pub fn spectral_radius_of_sym_matrix<S: SpectralBound>(
    a: &DMatrix<S>,
    settings: &DiagonalizationSettings,
) -> Result<S> {
    let d = sym_matrix_diagonalize(a, settings)?;
    Ok(S::spectral_radius(&d))
}

/// Bound on the largest eigenvalue of a symmetric matrix.
pub fn max_eigenvalue_of_sym_matrix<S: SpectralBound>(
    a: &DMatrix<S>,
    settings: &DiagonalizationSettings,
) -> Result<S> {
    check_dim("max_eigenvalue_of_sym_matrix", a.nrows(), a.ncols())?;
    let d = sym_matrix_diagonalize(a, settings)?;
    if d.nrows() == 0 {
        return Ok(S::zero());
    }
    Ok(S::max_eigenvalue(&d))
}
