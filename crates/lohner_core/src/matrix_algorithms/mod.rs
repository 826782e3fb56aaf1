//! Matrix algorithms written once for point and interval scalars.
//!
//! Every function is pure: inputs are borrowed, results are fresh matrices. A divisor
//! that contains zero is reported as `SingularMatrix`; callers that can live with a
//! weaker result (basis policies) match on it and fall back.

mod eigen;
mod exp;
mod gauss;
mod krawczyk;
mod qr;

pub use eigen::{
    max_eigenvalue_of_sym_matrix, spectral_radius_of_sym_matrix, sym_matrix_diagonalize,
    DiagonalizationSettings, SpectralBound,
};
pub use exp::matrix_exp;
pub use gauss::{
    crout_decomposition, det, gauss, gauss_inverse_matrix, gauss_matrix,
    inv_lower_triangle_matrix, inv_upper_triangle_matrix,
};
pub use krawczyk::krawczyk_inverse;
pub use qr::{
    compute_sorting_permutation, inverse_matrix, orthonormalize, orthonormalize_by_hessian,
    orthonormalize_by_matrix, orthonormalize_by_vector, orthonormalize_with_weights,
    qr_decompose, qr_decompose_with_pivoting, PivotedQr,
};
