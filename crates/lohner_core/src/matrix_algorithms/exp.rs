use crate::error::{check_dim, EnclosureError, Result};
use crate::traits::Scalar;
use crate::vectalg::max_norm;
use nalgebra::DMatrix;

/// `exp(M)` by its Taylor series.
///
/// Summation stops once the tail bound `||A_n||·||M|| / (n - ||M||)` (max-norm, `A_n`
/// the last term) drops below `tolerance`. For interval scalars the tail bound is added
/// to every entry as `[-r, r]`, which makes the result an enclosure.
pub fn matrix_exp<S: Scalar>(m: &DMatrix<S>, tolerance: f64) -> Result<DMatrix<S>> {
    check_dim("matrix_exp", m.nrows(), m.ncols())?;
    let norm_m = max_norm(m);
    if !(tolerance > 0.0) || !norm_m.is_finite() {
        return Err(EnclosureError::InvalidArgument(format!(
            "matrix_exp needs a positive tolerance and a finite matrix (tolerance {tolerance}, norm {norm_m})"
        )));
    }
    let dim = m.nrows();
    let mut sum = m + DMatrix::identity(dim, dim);
    let mut term = m.clone();
    let mut n = 2.0;
    let mut norm_term = norm_m;

    loop {
        let divisor = S::from_f64(n);
        term = (m * &term).map(|v| v / divisor);
        norm_term *= norm_m / n;
        if !norm_term.is_finite() {
            return Err(EnclosureError::InvalidArgument(format!(
                "matrix_exp: Taylor terms overflow before the series converges (norm {norm_m})"
            )));
        }
        sum += &term;
        n += 1.0;
        if norm_m < n && norm_term * norm_m / (n - norm_m) < tolerance {
            break;
        }
    }

    // The estimate above may be smaller than the actual norm of the last term.
    let tail = (S::from_f64(max_norm(&term)) * S::from_f64(norm_m)
        / (S::from_f64(n) - S::from_f64(norm_m)))
    .right();
    let remainder = S::from_bounds(-tail, tail);
    Ok(sum.map(|v| v + remainder))
}
