use crate::error::{EnclosureError, Result};
use crate::matrix_algorithms::{
    krawczyk_inverse, orthonormalize_with_weights, qr_decompose_with_pivoting,
};
use crate::traits::Scalar;
use crate::vectalg::{column_norm, identity, mid, normalize_column};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::warn;

/// Chooses the error basis `B` of a moved layer.
///
/// `b` is the image `A·B` of the old basis, `weights` one entry per column of `b`
/// (large weight: the set is wide in that direction). Implementors provide
/// [`try_compute_b_inv_b`](BasisPolicy::try_compute_b_inv_b); a failure there is logged
/// and replaced by the identity basis, which is always valid.
pub trait BasisPolicy: Debug + Clone {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)>;

    fn compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> (DMatrix<S>, DMatrix<S>) {
        match self.try_compute_b_inv_b(b, weights) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(policy = ?self, error = %err, "basis policy failed, using identity basis");
                (identity(b.nrows()), identity(b.nrows()))
            }
        }
    }
}

/// `B = invB = Id`: the error term is kept in the canonical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityBasis;

impl BasisPolicy for IdentityBasis {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        _weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)> {
        Ok((identity(b.nrows()), identity(b.nrows())))
    }
}

/// `B = mid(A·B)`, `invB` its Krawczyk inverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InverseQr;

impl BasisPolicy for InverseQr {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        _weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)> {
        let b = mid(b);
        let inv_b = krawczyk_inverse(&b)?;
        Ok((b, inv_b))
    }
}

/// Orthonormalizes `mid(A·B)` with pivoting by `weights`; `invB = Bᵀ`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FullQrWithPivoting;

impl BasisPolicy for FullQrWithPivoting {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)> {
        let mut b = mid(b);
        orthonormalize_with_weights(&mut b, weights)?;
        let inv_b = b.transpose();
        Ok((b, inv_b))
    }
}

/// Like [`FullQrWithPivoting`], but the columns from `N` on are first made lower
/// triangular, so they only mix with directions outside the leading block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialQrWithPivoting<const N: usize>;

impl<const N: usize> BasisPolicy for PartialQrWithPivoting<N> {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)> {
        let mut b = mid(b);
        for i in N..b.ncols() {
            for j in 0..i.min(b.nrows()) {
                b[(j, i)] = S::zero();
            }
        }
        orthonormalize_with_weights(&mut b, weights)?;
        let inv_b = krawczyk_inverse(&b)?;
        Ok((b, inv_b))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectiveQrSettings {
    /// A column is replaced by its orthonormalized counterpart when the part of it
    /// orthogonal to the previous columns is at most this fraction of its length.
    pub parallel_tolerance: f64,
}

impl Default for SelectiveQrSettings {
    fn default() -> Self {
        Self {
            parallel_tolerance: 1e-15,
        }
    }
}

/// Keeps the columns of `mid(A·B)` that are far from parallel to the previous ones
/// (only normalizing them) and replaces the rest by their pivoted QR counterparts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectiveQrWithPivoting {
    pub settings: SelectiveQrSettings,
}

impl SelectiveQrWithPivoting {
    pub fn new(settings: SelectiveQrSettings) -> Self {
        Self { settings }
    }
}

impl BasisPolicy for SelectiveQrWithPivoting {
    fn try_compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> Result<(DMatrix<S>, DMatrix<S>)> {
        let mut b = mid(b);
        let qr = qr_decompose_with_pivoting(&b, weights)?;
        for i in 0..b.ncols() {
            let length = column_norm(&b, i).right();
            if qr.sizes[i] > self.settings.parallel_tolerance * length {
                if !normalize_column(&mut b, i) {
                    return Err(EnclosureError::singular(
                        "selective QR: column norm contains zero",
                    ));
                }
            } else {
                b.set_column(i, &qr.q.column(i));
            }
        }
        let b = mid(&b);
        let inv_b = krawczyk_inverse(&b)?;
        Ok((b, inv_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::vectalg::subset;

    fn sheared() -> DMatrix<Interval> {
        DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 1.0]).map(Interval::point)
    }

    fn assert_inverse_pair(b: &DMatrix<Interval>, inv_b: &DMatrix<Interval>) {
        let product = inv_b * b;
        assert!(
            subset(&identity(2), &product),
            "invB·B = {product} does not contain the identity"
        );
    }

    #[test]
    fn identity_basis_ignores_input() {
        let (b, inv_b) = IdentityBasis.compute_b_inv_b(&sheared(), &[1.0, 1.0]);
        assert_eq!(b, identity(2));
        assert_eq!(inv_b, identity(2));
    }

    #[test]
    fn inverse_qr_keeps_midpoint_basis() {
        let (b, inv_b) = InverseQr.compute_b_inv_b(&sheared(), &[1.0, 1.0]);
        assert_eq!(b, sheared());
        assert_inverse_pair(&b, &inv_b);
    }

    #[test]
    fn full_qr_gives_orthonormal_basis() {
        let (b, inv_b) = FullQrWithPivoting.compute_b_inv_b(&sheared(), &[1.0, 1.0]);
        assert_inverse_pair(&b, &inv_b);
        assert!(column_norm(&b, 0).contains(1.0));
        assert!(column_norm(&b, 1).contains(1.0));
    }

    #[test]
    fn partial_qr_respects_leading_block() {
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 2.0, 1.0]).map(Interval::point);
        let (q, inv_q) = PartialQrWithPivoting::<1>.compute_b_inv_b(&b, &[1.0, 100.0]);
        assert_inverse_pair(&q, &inv_q);
        // second column was reduced to (0, 1) and is processed first
        assert!(q[(0, 1)].contains(0.0));
        assert!(q[(1, 1)].contains(1.0));
        assert!(q[(1, 0)].contains(0.0));
    }

    #[test]
    fn selective_qr_keeps_independent_columns() {
        let (b, inv_b) =
            SelectiveQrWithPivoting::default().compute_b_inv_b(&sheared(), &[1.0, 1.0]);
        assert_inverse_pair(&b, &inv_b);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((b[(0, 1)].midpoint() - expected).abs() < 1e-12);
        assert!((b[(1, 1)].midpoint() - expected).abs() < 1e-12);
    }

    #[test]
    fn selective_qr_replaces_parallel_column() {
        // second column is twice the first, so the first loses its length in the QR
        let image = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 0.0]).map(Interval::point);
        let weights = [1.0, 1.0];
        let qr = qr_decompose_with_pivoting(&mid(&image), &weights).expect("completed basis");
        assert_eq!(qr.sizes[0], 0.0);

        let (b, inv_b) = SelectiveQrWithPivoting::default().compute_b_inv_b(&image, &weights);
        for k in 0..2 {
            assert_eq!(b[(k, 0)], qr.q[(k, 0)].mid());
        }
        assert!(b[(0, 0)].contains(0.0) && b[(1, 0)].contains(1.0), "{b}");
        assert!((b[(0, 1)].midpoint() - 1.0).abs() < 1e-12, "{b}");
        assert!(b[(1, 1)].contains(0.0), "{b}");
        assert_inverse_pair(&b, &inv_b);
    }

    #[test]
    fn singular_image_falls_back_to_identity() {
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]).map(Interval::point);
        let (q, inv_q) = InverseQr.compute_b_inv_b(&b, &[1.0, 1.0]);
        assert_eq!(q, identity(2));
        assert_eq!(inv_q, identity(2));
    }
}
