//! Interval-aware helpers over `nalgebra` dense containers.
//!
//! Set layers are stored uniformly as `DMatrix<S>`: a vector coefficient is an `n x 1`
//! matrix, a Jacobian an `n x n` matrix and a Hessian an `n x n(n+1)/2` matrix. All
//! helpers here therefore operate on `DMatrix`; `to_column`/`to_vector` convert at the
//! public API boundary.

use crate::error::{check_dim, EnclosureError, Result};
use crate::traits::Scalar;
use nalgebra::{DMatrix, DVector};

pub fn to_column<S: Scalar>(v: &DVector<S>) -> DMatrix<S> {
    DMatrix::from_column_slice(v.len(), 1, v.as_slice())
}

/// First column of `m` as a vector.
pub fn to_vector<S: Scalar>(m: &DMatrix<S>) -> DVector<S> {
    DVector::from_iterator(m.nrows(), m.column(0).iter().copied())
}

pub fn mid<S: Scalar>(m: &DMatrix<S>) -> DMatrix<S> {
    m.map(|v| v.mid())
}

/// Splits `m` into a thin center and a zero-centered remainder with `m ⊆ center + rem`.
pub fn split<S: Scalar>(m: &DMatrix<S>) -> (DMatrix<S>, DMatrix<S>) {
    let center = mid(m);
    let rem = m - &center;
    (center, rem)
}

/// Component-wise intersection. `context` names the caller in the error.
pub fn intersection<S: Scalar>(
    a: &DMatrix<S>,
    b: &DMatrix<S>,
    context: &'static str,
) -> Result<DMatrix<S>> {
    check_dim(context, a.nrows(), b.nrows())?;
    check_dim(context, a.ncols(), b.ncols())?;
    let mut out = a.clone();
    for (o, v) in out.iter_mut().zip(b.iter()) {
        *o = o
            .intersection(v)
            .ok_or_else(|| EnclosureError::empty(context))?;
    }
    Ok(out)
}

pub fn hull<S: Scalar>(a: &DMatrix<S>, b: &DMatrix<S>) -> DMatrix<S> {
    a.zip_map(b, |x, y| x.hull(&y))
}

pub fn subset<S: Scalar>(a: &DMatrix<S>, b: &DMatrix<S>) -> bool {
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| x.subset(y))
}

/// `true` when `m` lies in the interior of `b`, entry by entry.
pub fn subset_interior<S: Scalar>(a: &DMatrix<S>, b: &DMatrix<S>) -> bool {
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| y.left() < x.left() && x.right() < y.right())
}

pub fn contains_zero<S: Scalar>(m: &DMatrix<S>) -> bool {
    m.iter().all(|v| v.contains(0.0))
}

pub fn max_diam<S: Scalar>(m: &DMatrix<S>) -> f64 {
    m.iter().map(|v| v.diam()).fold(0.0, f64::max)
}

/// Euclidean norm of column `j`.
pub fn column_norm<S: Scalar>(m: &DMatrix<S>, j: usize) -> S {
    let mut s = S::zero();
    for v in m.column(j).iter() {
        s += *v * *v;
    }
    s.sqrt()
}

/// Scalar product of columns `i` and `j`.
pub fn column_dot<S: Scalar>(m: &DMatrix<S>, i: usize, j: usize) -> S {
    let mut s = S::zero();
    for k in 0..m.nrows() {
        s += m[(k, i)] * m[(k, j)];
    }
    s
}

/// Divides column `j` by its norm. Returns `false` (leaving `m` untouched) when the norm
/// is singular.
pub fn normalize_column<S: Scalar>(m: &mut DMatrix<S>, j: usize) -> bool {
    let norm = column_norm(m, j);
    if norm.is_singular() {
        return false;
    }
    for v in m.column_mut(j).iter_mut() {
        *v /= norm;
    }
    true
}

/// Max-norm of a matrix (maximal absolute row sum), as an upper bound.
pub fn max_norm<S: Scalar>(m: &DMatrix<S>) -> f64 {
    m.row_iter()
        .map(|row| row.iter().fold(S::zero(), |acc, v| acc + v.abs()).right())
        .fold(0.0, f64::max)
}

pub fn identity<S: Scalar>(dim: usize) -> DMatrix<S> {
    DMatrix::identity(dim, dim)
}

/// `right(v_i^2)` for the first column of `v`.
pub fn vector_weights<S: Scalar>(v: &DMatrix<S>) -> Vec<f64> {
    (0..v.nrows()).map(|i| v[(i, 0)].right_sqr()).collect()
}

/// `right(||row_i||)` for every row of `v`.
pub fn matrix_weights<S: Scalar>(v: &DMatrix<S>) -> Vec<f64> {
    v.row_iter()
        .map(|row| {
            let mut s = S::zero();
            for x in row.iter() {
                s += *x * *x;
            }
            s.sqrt().right()
        })
        .collect()
}

/// `right(hull_i^2)` where `hull_i` is the hull of zero and every entry of row `i`.
pub fn hull_weights<S: Scalar>(v: &DMatrix<S>) -> Vec<f64> {
    v.row_iter()
        .map(|row| row.iter().fold(S::zero(), |acc, x| acc.hull(x)).right_sqr())
        .collect()
}
