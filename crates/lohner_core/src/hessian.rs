use crate::error::{check_dim, Result};
use crate::traits::Scalar;
use nalgebra::DMatrix;

/// Second order partial derivatives `∂²f_i/∂x_j∂x_k` of a map `R^n -> R^m`.
///
/// Only `j >= k` is stored. Coefficients live in an `m x n(n+1)/2` matrix whose
/// column `j(j+1)/2 + k` holds the derivative with respect to the pair `(j, k)`, so that
/// left multiplication by a Jacobian is an ordinary matrix product.
#[derive(Debug, Clone, PartialEq)]
pub struct Hessian<S: Scalar> {
    dim: usize,
    coeffs: DMatrix<S>,
}

/// Number of stored pairs `(j, k)`, `j >= k`, for a domain of dimension `dim`.
pub fn pair_count(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Column of the pair `(j, k)`; the order of the arguments is irrelevant.
pub fn pair_index(j: usize, k: usize) -> usize {
    let (hi, lo) = if j >= k { (j, k) } else { (k, j) };
    hi * (hi + 1) / 2 + lo
}

impl<S: Scalar> Hessian<S> {
    /// Zero Hessian of a map `R^dim -> R^dim`.
    pub fn zeros(dim: usize) -> Self {
        Self::with_image(dim, dim)
    }

    pub fn with_image(image: usize, dim: usize) -> Self {
        Self {
            dim,
            coeffs: DMatrix::zeros(image, pair_count(dim)),
        }
    }

    pub fn from_matrix(dim: usize, coeffs: DMatrix<S>) -> Result<Self> {
        check_dim("Hessian::from_matrix", pair_count(dim), coeffs.ncols())?;
        Ok(Self { dim, coeffs })
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn image_dimension(&self) -> usize {
        self.coeffs.nrows()
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> S {
        self.coeffs[(i, pair_index(j, k))]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: S) {
        self.coeffs[(i, pair_index(j, k))] = value;
    }

    pub fn as_matrix(&self) -> &DMatrix<S> {
        &self.coeffs
    }

    pub fn into_matrix(self) -> DMatrix<S> {
        self.coeffs
    }

    /// `H ∘ (V, V)`: the second derivative of `f ∘ g` coming from `D²f` when `V = Dg`.
    ///
    /// `(H ∘ V)(i, j, k) = Σ_{a,b} H(i, a, b) V(a, j) V(b, k)`.
    pub fn compose(&self, v: &DMatrix<S>) -> Result<Self> {
        check_dim("Hessian::compose", self.dim, v.nrows())?;
        let dim = v.ncols();
        let mut out = Self::with_image(self.image_dimension(), dim);
        for i in 0..self.image_dimension() {
            for j in 0..dim {
                for k in 0..=j {
                    let mut s = S::zero();
                    for a in 0..self.dim {
                        for b in 0..self.dim {
                            s += self.get(i, a, b) * v[(a, j)] * v[(b, k)];
                        }
                    }
                    out.set(i, j, k, s);
                }
            }
        }
        Ok(out)
    }
}

impl<S: Scalar> std::ops::Add for &Hessian<S> {
    type Output = Hessian<S>;

    fn add(self, rhs: Self) -> Hessian<S> {
        Hessian {
            dim: self.dim,
            coeffs: &self.coeffs + &rhs.coeffs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    #[test]
    fn pair_index_is_symmetric() {
        assert_eq!(pair_index(0, 0), 0);
        assert_eq!(pair_index(1, 0), 1);
        assert_eq!(pair_index(0, 1), 1);
        assert_eq!(pair_index(1, 1), 2);
        assert_eq!(pair_index(2, 1), 4);
        assert_eq!(pair_count(3), 6);
    }

    #[test]
    fn compose_with_identity_is_identity() {
        let mut h = Hessian::<f64>::zeros(2);
        h.set(0, 0, 0, 2.0);
        h.set(1, 1, 0, -1.0);
        let out = h.compose(&DMatrix::identity(2, 2)).expect("compose");
        assert_eq!(out, h);
    }

    #[test]
    fn compose_applies_chain_rule() {
        // f(x, y) = x^2, g(u, v) = (u + v, v): (f∘g)_uv = 2, (f∘g)_vv = 2.
        let mut h = Hessian::<Interval>::with_image(1, 2);
        h.set(0, 0, 0, Interval::point(2.0));
        let v = DMatrix::from_row_slice(
            2,
            2,
            &[
                Interval::point(1.0),
                Interval::point(1.0),
                Interval::point(0.0),
                Interval::point(1.0),
            ],
        );
        let out = h.compose(&v).expect("compose");
        assert!(out.get(0, 0, 0).contains(2.0));
        assert!(out.get(0, 0, 1).contains(2.0));
        assert!(out.get(0, 1, 1).contains(2.0));
    }

    #[test]
    fn from_matrix_checks_pair_count() {
        let err = Hessian::<f64>::from_matrix(2, DMatrix::zeros(2, 2)).expect_err("3 columns needed");
        assert!(err.to_string().contains("Hessian::from_matrix"));
    }
}
