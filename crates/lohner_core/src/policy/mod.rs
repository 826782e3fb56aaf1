//! Policies steering the representation of doubleton sets.
//!
//! A [`BasisPolicy`] picks the new error basis `B` (and an enclosure of its inverse)
//! after every move. A [`Reorganization`] decides when the two error terms of a layer
//! are folded together. [`Policies`] pairs one of each and is what the sets carry.

mod basis;
mod reorganization;

pub use basis::{
    BasisPolicy, FullQrWithPivoting, IdentityBasis, InverseQr, PartialQrWithPivoting,
    SelectiveQrSettings, SelectiveQrWithPivoting,
};
pub use reorganization::{
    CoordWiseReorganization, FactorReorganization, InvBByCFactorReorganization,
    NoReorganization, QrReorganization, Reorganization, ReorganizationSettings,
    SwapReorganization,
};

use crate::dynset::DoubletonLayer;
use crate::traits::Scalar;
use crate::vectalg::max_diam;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// Everything a set needs from its policies.
pub trait SetPolicy: Debug + Clone {
    fn compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> (DMatrix<S>, DMatrix<S>);

    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool;

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>);

    /// Reorganizes `layer` when the strategy asks for it. Returns whether it did.
    fn reorganize_if_needed<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) -> bool {
        if !self.is_reorganization_needed(layer) {
            return false;
        }
        debug!(
            layer = ?layer.kind(),
            r = max_diam(layer.r()),
            r0 = max_diam(layer.r0()),
            "reorganizing doubleton layer"
        );
        self.reorganize(layer);
        true
    }
}

/// One basis policy and one reorganization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Policies<B = FullQrWithPivoting, R = FactorReorganization> {
    pub basis: B,
    pub reorganization: R,
}

impl<B, R> Policies<B, R> {
    pub fn new(basis: B, reorganization: R) -> Self {
        Self {
            basis,
            reorganization,
        }
    }
}

impl<B: BasisPolicy, R: Reorganization> SetPolicy for Policies<B, R> {
    fn compute_b_inv_b<S: Scalar>(
        &self,
        b: &DMatrix<S>,
        weights: &[f64],
    ) -> (DMatrix<S>, DMatrix<S>) {
        self.basis.compute_b_inv_b(b, weights)
    }

    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        self.reorganization.is_reorganization_needed(layer)
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        self.reorganization.reorganize(layer)
    }
}

/// Orthonormal basis with pivoting and factor-triggered folding.
pub type QrPolicies = Policies<FullQrWithPivoting, FactorReorganization>;

/// Parallelepiped basis `B = mid(A·B)`, folded by the same factor rule.
pub type PpedPolicies = Policies<InverseQr, FactorReorganization>;

/// Lohner's original scheme: `B` and `r` are never used.
pub type CuboidPolicies = Policies<IdentityBasis, FactorReorganization>;
