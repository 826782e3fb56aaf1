use super::gauss::inv_upper_triangle_matrix;
use crate::error::{check_dim, EnclosureError, Result};
use crate::traits::Scalar;
use crate::vectalg::{column_dot, column_norm, hull_weights, matrix_weights, normalize_column, vector_weights};
use nalgebra::DMatrix;
use std::cmp::Ordering;

/// Result of [`qr_decompose_with_pivoting`].
#[derive(Debug, Clone)]
pub struct PivotedQr<S: Scalar> {
    /// Orthonormal basis, column `i` replaces input column `i`.
    pub q: DMatrix<S>,
    /// Upper triangular in the permuted order, indexed by original column indices.
    pub r: DMatrix<S>,
    /// Lower bound of `|R(i, i)|` for columns kept from the input, `0` for replaced ones.
    pub sizes: Vec<f64>,
    pub permutation: Vec<usize>,
}

/// Column order for pivoted orthonormalization.
///
/// Column `i` scores `(Σ_k right(Q[k][i]^2)) · (1e-50 + weights[i])`; columns are
/// returned by decreasing score, stable on ties.
pub fn compute_sorting_permutation<S: Scalar>(q: &DMatrix<S>, weights: &[f64]) -> Result<Vec<usize>> {
    check_dim("compute_sorting_permutation", q.ncols(), weights.len())?;
    let scores: Vec<f64> = (0..q.ncols())
        .map(|i| {
            let energy: f64 = q.column(i).iter().map(|v| v.right_sqr()).sum();
            energy * (1e-50 + weights[i])
        })
        .collect();
    let mut permutation: Vec<usize> = (0..q.ncols()).collect();
    permutation.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    Ok(permutation)
}

/// Gram-Schmidt in the given column order; every processed column is projected out of
/// all columns that follow it.
fn orthonormalize_in_order<S: Scalar>(q: &mut DMatrix<S>, order: &[usize]) -> Result<()> {
    for (pos, &i) in order.iter().enumerate() {
        if !normalize_column(q, i) {
            return Err(EnclosureError::singular("orthonormalize: column norm contains zero"));
        }
        for &j in &order[pos + 1..] {
            let product = column_dot(q, j, i);
            for k in 0..q.nrows() {
                let qi = q[(k, i)];
                q[(k, j)] -= product * qi;
            }
        }
    }
    Ok(())
}

/// Orthonormalizes the columns of `q` in place, largest columns first.
pub fn orthonormalize<S: Scalar>(q: &mut DMatrix<S>) -> Result<()> {
    let order = compute_sorting_permutation(q, &vec![1.0; q.ncols()])?;
    orthonormalize_in_order(q, &order)
}

/// Orthonormalizes `q` giving priority to directions where `weights` is large.
pub fn orthonormalize_with_weights<S: Scalar>(q: &mut DMatrix<S>, weights: &[f64]) -> Result<()> {
    let order = compute_sorting_permutation(q, weights)?;
    orthonormalize_in_order(q, &order)
}

/// Weights from the size `v` (an `n x 1` column) of the set in the coordinates `q`.
pub fn orthonormalize_by_vector<S: Scalar>(q: &mut DMatrix<S>, v: &DMatrix<S>) -> Result<()> {
    orthonormalize_with_weights(q, &vector_weights(v))
}

/// Weights from the Euclidean norms of the rows of `v`.
pub fn orthonormalize_by_matrix<S: Scalar>(q: &mut DMatrix<S>, v: &DMatrix<S>) -> Result<()> {
    orthonormalize_with_weights(q, &matrix_weights(v))
}

/// Weights from the hull of every row of a Hessian coefficient matrix.
pub fn orthonormalize_by_hessian<S: Scalar>(q: &mut DMatrix<S>, h: &DMatrix<S>) -> Result<()> {
    orthonormalize_with_weights(q, &hull_weights(h))
}

/// Classical Gram-Schmidt `A = Q·R`.
pub fn qr_decompose<S: Scalar>(a: &DMatrix<S>) -> Result<(DMatrix<S>, DMatrix<S>)> {
    let dim = a.ncols();
    let mut q = a.clone();
    let mut r = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        let diag = column_norm(&q, i);
        r[(i, i)] = diag;
        if diag.is_singular() {
            return Err(EnclosureError::singular("QR decomposition"));
        }
        for k in 0..q.nrows() {
            q[(k, i)] /= diag;
        }
        for j in i + 1..dim {
            let product = column_dot(&q, j, i);
            r[(i, j)] = product;
            for k in 0..q.nrows() {
                let qi = q[(k, i)];
                q[(k, j)] -= product * qi;
            }
        }
    }
    Ok((q, r))
}

/// Pivoted QR that survives linearly dependent columns.
///
/// A column whose projected norm is singular is replaced by the next unused canonical
/// axis `e_d` and projected again. Fails only when no unused axis remains.
pub fn qr_decompose_with_pivoting<S: Scalar>(a: &DMatrix<S>, weights: &[f64]) -> Result<PivotedQr<S>> {
    let dim = a.ncols();
    check_dim("qr_decompose_with_pivoting", dim, a.nrows())?;
    let permutation = compute_sorting_permutation(a, weights)?;
    let mut q = a.clone();
    let mut r = DMatrix::zeros(dim, dim);
    let mut sizes = vec![0.0; dim];
    let mut d = 0;

    for (pos, &i) in permutation.iter().enumerate() {
        let mut original = true;
        loop {
            for &j in &permutation[..pos] {
                let product = column_dot(&q, i, j);
                r[(j, i)] = product;
                for k in 0..dim {
                    let qj = q[(k, j)];
                    q[(k, i)] -= product * qj;
                }
            }
            let diag = column_norm(&q, i);
            r[(i, i)] = diag;
            if original {
                sizes[i] = if diag.is_singular() { 0.0 } else { diag.abs().left() };
            }
            if !diag.is_singular() {
                for k in 0..dim {
                    q[(k, i)] /= diag;
                }
                break;
            }
            if d >= dim {
                return Err(EnclosureError::singular(
                    "QR decomposition with pivoting: no canonical vector left",
                ));
            }
            for k in 0..dim {
                q[(k, i)] = if k == d { S::one() } else { S::zero() };
            }
            d += 1;
            original = false;
        }
    }

    Ok(PivotedQr {
        q,
        r,
        sizes,
        permutation,
    })
}

/// Inverse via `R⁻¹·Qᵀ`.
pub fn inverse_matrix<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    check_dim("inverse_matrix", a.nrows(), a.ncols())?;
    let (q, r) = qr_decompose(a)?;
    let inv_r = inv_upper_triangle_matrix(&r)?;
    Ok(inv_r * q.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::vectalg::subset;

    fn qr_test_matrix() -> DMatrix<Interval> {
        DMatrix::from_row_slice(3, 3, &[7.0, 63.0, 0.0, 2.0, 18.0, 10.0, 3.0, 30.0, 0.0])
            .map(Interval::point)
    }

    fn assert_orthonormal(q: &DMatrix<Interval>) {
        for i in 0..q.ncols() {
            for j in 0..q.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                let dot = column_dot(q, i, j);
                assert!(
                    (dot.mid().right() - expected).abs() < 1e-12,
                    "column product ({i}, {j}) = {dot}"
                );
            }
        }
    }

    #[test]
    fn sorting_permutation_prefers_weighted_columns() {
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 10.0, 0.0, 0.0]);
        let p = compute_sorting_permutation(&q, &[1.0, 1.0]).expect("permutation");
        assert_eq!(p, vec![1, 0]);
        let p = compute_sorting_permutation(&q, &[1e6, 1.0]).expect("permutation");
        assert_eq!(p, vec![0, 1]);
    }

    #[test]
    fn orthonormalize_produces_orthonormal_columns() {
        let mut q = qr_test_matrix();
        let v = DMatrix::from_column_slice(3, 1, &[5.0, 4.0, 3.0]).map(Interval::point);
        orthonormalize_by_vector(&mut q, &v).expect("orthonormalize");
        assert_orthonormal(&q);

        let mut q = qr_test_matrix();
        orthonormalize(&mut q).expect("orthonormalize");
        assert_orthonormal(&q);
    }

    #[test]
    fn orthonormalize_fails_on_dependent_columns() {
        // projecting (1, 0) out of (2, 0) cancels exactly in point arithmetic
        let mut q = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 0.0]);
        let err = orthonormalize(&mut q).expect_err("dependent columns");
        assert!(err.is_singular_matrix());

        let mut q = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 2.0]).map(Interval::point);
        let err = orthonormalize(&mut q).expect_err("dependent columns");
        assert!(err.is_singular_matrix());
    }

    #[test]
    fn qr_decompose_reconstructs_input() {
        let a = qr_test_matrix();
        let (q, r) = qr_decompose(&a).expect("full rank");
        assert!(subset(&a, &(&q * &r)));
        assert_orthonormal(&q);
        assert!(r[(1, 0)].contains(0.0) && r[(2, 1)].contains(0.0));
    }

    #[test]
    fn pivoting_recovers_from_dependent_columns() {
        let a = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 1.0])
            .map(Interval::point);
        let qr = qr_decompose_with_pivoting(&a, &[1.0, 1.0, 1.0]).expect("recovers");
        assert_orthonormal(&qr.q);
        assert_eq!(qr.permutation[0], 1);
        assert_eq!(qr.sizes[0], 0.0);
        assert!(qr.sizes[1] > 2.8);
        assert!(qr.sizes[2] > 0.99);
    }

    #[test]
    fn pivoting_encloses_full_rank_input() {
        let a = qr_test_matrix();
        let qr = qr_decompose_with_pivoting(&a, &[25.0, 16.0, 9.0]).expect("full rank");
        assert!(subset(&a, &(&qr.q * &qr.r)));
        assert!(qr.sizes.iter().all(|s| *s > 0.0));
    }

    #[test]
    fn pivoting_replaces_every_column_of_zero_matrix() {
        let a = DMatrix::<f64>::zeros(2, 2);
        let qr = qr_decompose_with_pivoting(&a, &[1.0, 1.0]).expect("canonical basis");
        assert_eq!(qr.q, DMatrix::identity(2, 2));
        assert_eq!(qr.sizes, vec![0.0, 0.0]);
    }

    #[test]
    fn pivoting_rejects_nonsquare_input() {
        let a = DMatrix::<f64>::zeros(3, 2);
        let err = qr_decompose_with_pivoting(&a, &[1.0, 1.0]).expect_err("not square");
        assert!(err.to_string().contains("qr_decompose_with_pivoting"));
    }

    #[test]
    fn qr_inverse_contains_identity_product() {
        let a = qr_test_matrix();
        let inv = inverse_matrix(&a).expect("invertible");
        assert!(subset(&DMatrix::identity(3, 3), &(&a * &inv)));
    }
}
