pub mod dynset;
pub mod error;
pub mod hessian;
pub mod interval;
pub mod matrix_algorithms;
pub mod policy;
/// The `lohner_core` crate provides rigorous enclosures of trajectories of dynamical
/// systems. Algorithms are generic over the scalar: point `f64` for fast estimates and
/// outward-rounded `Interval`s for computer-assisted proofs.
///
/// Key components:
/// - **Traits**: `Scalar` (point/interval abstraction) and the enclosure oracle traits
///   (`C0EnclosureMap` .. `HoEnclosureMap`) a solver implements to drive the sets.
/// - **Matrix Algorithms**: Gauss elimination, QR with pivoting, Krawczyk inverse,
///   Jacobi diagonalization with Gershgorin bounds, matrix exponential.
/// - **Dynset**: doubleton `x + C·r0 + B·r` and tripleton sets for values, Jacobians,
///   Hessians and jets, plus the Hermite-Obreshkov predictor/corrector set.
/// - **Policy**: basis and reorganization strategies steering the representation.
pub mod traits;
pub mod vectalg;

pub use dynset::{
    evolve, C0DoubletonSet, C0HoSet, C0TripletonSet, C1DoubletonSet, C2DoubletonSet,
    CnDoubletonSet, DoubletonLayer, DynSet, LayerKind, SetState,
};
pub use error::{EnclosureError, Result};
pub use hessian::Hessian;
pub use interval::Interval;
pub use policy::{CuboidPolicies, Policies, PpedPolicies, QrPolicies};
pub use traits::Scalar;
