use super::gauss::gauss_inverse_matrix;
use crate::error::{check_dim, EnclosureError, Result};
use crate::traits::Scalar;
use crate::vectalg::{intersection, max_norm, mid};
use nalgebra::DMatrix;
use tracing::debug;

/// Rigorous enclosure of `A⁻¹` refined by one Krawczyk step.
///
/// The starting enclosure is the interval Gauss inverse of `A` (for a thin `A` this is
/// the inverse of `mid(A)`). When elimination fails on a wide `A`, the start is the
/// norm ball `||A⁻¹|| <= ||C|| / (1 - ||I - C·A||)` around zero with `C ≈ mid(A)⁻¹`.
/// With `C = mid(invA)` and `T = C·A - I` the result is `(C - T·invA) ∩ invA`.
pub fn krawczyk_inverse<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    check_dim("krawczyk_inverse", a.nrows(), a.ncols())?;
    let dim = a.nrows();
    let inv_a = match gauss_inverse_matrix(a) {
        Ok(inv) => inv,
        Err(EnclosureError::SingularMatrix(_)) if S::IS_INTERVAL => {
            debug!(dim, "interval elimination failed, starting Krawczyk from norm ball");
            norm_ball_inverse(a)?
        }
        Err(err) => return Err(err),
    };
    let c = mid(&inv_a);
    let t = &c * a - DMatrix::identity(dim, dim);
    let refined = &c - &t * &inv_a;
    intersection(&refined, &inv_a, "krawczyk_inverse")
}

/// Matrix whose entries all equal `[-δ, δ]` with `δ` bounding `||A⁻¹||_∞`.
fn norm_ball_inverse<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    let dim = a.nrows();
    let c = mid(&gauss_inverse_matrix(&mid(a))?);
    let residual = DMatrix::identity(dim, dim) - &c * a;
    let contraction = max_norm(&residual);
    if !(contraction < 1.0) {
        return Err(EnclosureError::singular(
            "krawczyk_inverse: approximate inverse does not contract",
        ));
    }
    let delta = (S::from_f64(max_norm(&c)) / (S::one() - S::from_f64(contraction))).right();
    Ok(DMatrix::from_element(dim, dim, S::from_bounds(-delta, delta)))
}
