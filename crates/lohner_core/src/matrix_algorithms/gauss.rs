use crate::error::{check_dim, EnclosureError, Result};
use crate::traits::Scalar;
use crate::vectalg::{to_column, to_vector};
use nalgebra::{DMatrix, DVector};

fn check_square<S: Scalar>(a: &DMatrix<S>, context: &'static str) -> Result<usize> {
    check_dim(context, a.nrows(), a.ncols())?;
    Ok(a.nrows())
}

/// Index (into `p[j..]`) of the row whose entry in column `j` has the largest
/// `right(|a|)`. First found wins on ties.
fn pivot_row<S: Scalar>(a: &DMatrix<S>, p: &[usize], j: usize) -> usize {
    let mut i_max = j;
    let mut a_max = a[(p[j], j)].abs().right();
    for (i, &row) in p.iter().enumerate().skip(j + 1) {
        let candidate = a[(row, j)].abs().right();
        if candidate > a_max {
            a_max = candidate;
            i_max = i;
        }
    }
    i_max
}

/// Determinant by elimination with row pivoting.
///
/// Fails with `SingularMatrix` when a pivot contains zero: in that case the sign of the
/// determinant cannot be validated.
pub fn det<S: Scalar>(a: &DMatrix<S>) -> Result<S> {
    let dim = check_square(a, "det")?;
    let mut a = a.clone();
    let mut p: Vec<usize> = (0..dim).collect();
    let mut negative = false;

    for j in 0..dim.saturating_sub(1) {
        let i_max = pivot_row(&a, &p, j);
        if i_max != j {
            negative = !negative;
            p.swap(j, i_max);
        }
        let divisor = a[(p[j], j)];
        if divisor.is_singular() {
            return Err(EnclosureError::singular("det: pivot contains zero"));
        }
        for i in j + 1..dim {
            let factor = a[(p[i], j)] / divisor;
            a[(p[i], j)] = S::zero();
            for k in j + 1..dim {
                let v = a[(p[j], k)];
                a[(p[i], k)] -= factor * v;
            }
        }
    }

    if dim > 0 && a[(p[dim - 1], dim - 1)].is_singular() {
        return Err(EnclosureError::singular("det: pivot contains zero"));
    }

    let mut determinant = S::one();
    for (i, &row) in p.iter().enumerate() {
        determinant *= a[(row, i)];
    }
    Ok(if negative { -determinant } else { determinant })
}

/// Solves `A·X = B` for a matrix right-hand side by Gauss elimination with partial
/// pivoting on `right(|a|)`.
pub fn gauss_matrix<S: Scalar>(a: &DMatrix<S>, b: &DMatrix<S>) -> Result<DMatrix<S>> {
    let dim = check_square(a, "gauss")?;
    check_dim("gauss", dim, b.nrows())?;
    let mut a = a.clone();
    let mut b = b.clone();
    let cols = b.ncols();
    if dim == 0 {
        return Ok(b);
    }
    let mut p: Vec<usize> = (0..dim).collect();

    for j in 0..dim - 1 {
        let i_max = pivot_row(&a, &p, j);
        p.swap(j, i_max);
        let divisor = a[(p[j], j)];
        if divisor.is_singular() {
            return Err(EnclosureError::singular("gauss elimination"));
        }
        for i in j + 1..dim {
            let factor = a[(p[i], j)] / divisor;
            a[(p[i], j)] = S::zero();
            for c in 0..cols {
                let v = b[(p[j], c)];
                b[(p[i], c)] -= factor * v;
            }
            for k in j + 1..dim {
                let v = a[(p[j], k)];
                a[(p[i], k)] -= factor * v;
            }
        }
    }

    if a[(p[dim - 1], dim - 1)].is_singular() {
        return Err(EnclosureError::singular("gauss elimination"));
    }

    let mut result = DMatrix::zeros(dim, cols);
    for i in (0..dim).rev() {
        for c in 0..cols {
            let mut v = b[(p[i], c)];
            for j in i + 1..dim {
                v -= a[(p[i], j)] * result[(j, c)];
            }
            result[(i, c)] = v / a[(p[i], i)];
        }
    }
    Ok(result)
}

/// Solves `A·x = b`.
pub fn gauss<S: Scalar>(a: &DMatrix<S>, b: &DVector<S>) -> Result<DVector<S>> {
    let x = gauss_matrix(a, &to_column(b))?;
    Ok(to_vector(&x))
}

/// Inverse of `A` by elimination against the identity.
pub fn gauss_inverse_matrix<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    let dim = check_square(a, "gauss_inverse_matrix")?;
    gauss_matrix(a, &DMatrix::identity(dim, dim))
}

/// Crout decomposition `A = D·G` with `D` lower triangular and `G` upper triangular with
/// unit diagonal.
pub fn crout_decomposition<S: Scalar>(a: &DMatrix<S>) -> Result<(DMatrix<S>, DMatrix<S>)> {
    let dim = check_square(a, "crout_decomposition")?;
    let mut d = DMatrix::zeros(dim, dim);
    let mut g = DMatrix::zeros(dim, dim);
    for j in 0..dim {
        for i in j..dim {
            let mut v = a[(i, j)];
            for k in 0..j {
                v -= d[(i, k)] * g[(k, j)];
            }
            d[(i, j)] = v;
        }
        g[(j, j)] = S::one();
        for i in j + 1..dim {
            let mut v = a[(j, i)];
            for k in 0..j {
                v -= d[(j, k)] * g[(k, i)];
            }
            if d[(j, j)].is_singular() {
                return Err(EnclosureError::singular("crout decomposition"));
            }
            g[(j, i)] = v / d[(j, j)];
        }
    }
    Ok((d, g))
}

pub fn inv_lower_triangle_matrix<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    let dim = check_square(a, "inv_lower_triangle_matrix")?;
    let mut result = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        if a[(i, i)].is_singular() {
            return Err(EnclosureError::singular(
                "inverse of lower triangle matrix: zero at diagonal",
            ));
        }
        result[(i, i)] = S::one() / a[(i, i)];
        for j in 0..i {
            let mut v = S::zero();
            for k in j..i {
                v += a[(i, k)] * result[(k, j)];
            }
            result[(i, j)] = -(v * result[(i, i)]);
        }
    }
    Ok(result)
}

pub fn inv_upper_triangle_matrix<S: Scalar>(a: &DMatrix<S>) -> Result<DMatrix<S>> {
    let dim = check_square(a, "inv_upper_triangle_matrix")?;
    let mut result = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        if a[(i, i)].is_singular() {
            return Err(EnclosureError::singular(
                "inverse of upper triangle matrix: zero at diagonal",
            ));
        }
        result[(i, i)] = S::one() / a[(i, i)];
        for j in 0..i {
            let mut v = S::zero();
            for k in j..i {
                v += a[(k, i)] * result[(j, k)];
            }
            result[(j, i)] = -(v * result[(i, i)]);
        }
    }
    Ok(result)
}
