use crate::dynset::DoubletonLayer;
use crate::error::Result;
use crate::matrix_algorithms::{krawczyk_inverse, orthonormalize};
use crate::traits::Scalar;
use crate::vectalg::{identity, max_diam, mid};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorganizationSettings {
    /// Reorganize once the error term is this many times wider than the Lipschitz term.
    pub factor: f64,
}

impl Default for ReorganizationSettings {
    fn default() -> Self {
        Self { factor: 20.0 }
    }
}

/// Decides when and how the error part `B·r` of a layer is merged into `C·r0`.
///
/// `reorganize` never changes the point set `x + C·r0 + B·r` nor the layer's
/// `current` enclosure; only the coordinates change.
pub trait Reorganization: Debug + Clone {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool;

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>);
}

/// `r0 := r + (invB·C)·r0`, `C := B`, `B = invB = Id`, `r = 0`.
pub(crate) fn fold<S: Scalar>(layer: &mut DoubletonLayer<S>) {
    let dim = layer.dimension();
    layer.r0 = &layer.r + (&layer.inv_b * &layer.c) * &layer.r0;
    layer.c = std::mem::replace(&mut layer.b, identity(dim));
    layer.inv_b = identity(dim);
    layer.r = DMatrix::zeros(dim, layer.r.ncols());
}

fn lipschitz_part_in_error_coordinates<S: Scalar>(layer: &DoubletonLayer<S>) -> DMatrix<S> {
    (&layer.inv_b * &layer.c) * &layer.r0
}

fn exceeds<S: Scalar>(r: &DMatrix<S>, reference: &DMatrix<S>, factor: f64) -> bool {
    max_diam(r) > factor * max_diam(reference)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NoReorganization;

impl Reorganization for NoReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, _layer: &DoubletonLayer<S>) -> bool {
        false
    }

    fn reorganize<S: Scalar>(&self, _layer: &mut DoubletonLayer<S>) {}
}

/// Folds when `max_diam(r) > factor · max_diam(r0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorReorganization {
    pub settings: ReorganizationSettings,
}

impl FactorReorganization {
    pub fn new(settings: ReorganizationSettings) -> Self {
        Self { settings }
    }
}

impl Reorganization for FactorReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        exceeds(&layer.r, &layer.r0, self.settings.factor)
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        fold(layer)
    }
}

/// Same trigger as [`FactorReorganization`]; replaces `B` by its orthonormalization and
/// re-expresses `r` in the new basis instead of folding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QrReorganization {
    pub settings: ReorganizationSettings,
}

impl QrReorganization {
    pub fn new(settings: ReorganizationSettings) -> Self {
        Self { settings }
    }

    fn rotate<S: Scalar>(layer: &mut DoubletonLayer<S>) -> Result<()> {
        let mut q = mid(&layer.b);
        orthonormalize(&mut q)?;
        let inv_q = krawczyk_inverse(&q)?;
        layer.r = (&inv_q * &layer.b) * &layer.r;
        layer.b = q;
        layer.inv_b = inv_q;
        Ok(())
    }
}

impl Reorganization for QrReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        exceeds(&layer.r, &layer.r0, self.settings.factor)
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        if let Err(err) = Self::rotate(layer) {
            warn!(error = %err, "QR reorganization failed, folding instead");
            fold(layer);
        }
    }
}

/// Folds when `r` outgrows the Lipschitz term seen in the error coordinates,
/// `max_diam(r) > factor · max_diam(invB·C·r0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvBByCFactorReorganization {
    pub settings: ReorganizationSettings,
}

impl InvBByCFactorReorganization {
    pub fn new(settings: ReorganizationSettings) -> Self {
        Self { settings }
    }
}

impl Reorganization for InvBByCFactorReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        let reference = lipschitz_part_in_error_coordinates(layer);
        exceeds(&layer.r, &reference, self.settings.factor)
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        fold(layer)
    }
}

/// Folds as soon as a single coordinate of `r` outgrows the same coordinate of
/// `invB·C·r0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordWiseReorganization {
    pub settings: ReorganizationSettings,
}

impl CoordWiseReorganization {
    pub fn new(settings: ReorganizationSettings) -> Self {
        Self { settings }
    }
}

impl Reorganization for CoordWiseReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        let reference = lipschitz_part_in_error_coordinates(layer);
        layer
            .r
            .iter()
            .zip(reference.iter())
            .any(|(r, c)| r.diam() > self.settings.factor * c.diam())
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        fold(layer)
    }
}

/// Same trigger as [`FactorReorganization`]; exchanges `(B, r)` with `(C, r0)`.
/// Folds when the old `C` cannot be inverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapReorganization {
    pub settings: ReorganizationSettings,
}

impl SwapReorganization {
    pub fn new(settings: ReorganizationSettings) -> Self {
        Self { settings }
    }
}

impl Reorganization for SwapReorganization {
    fn is_reorganization_needed<S: Scalar>(&self, layer: &DoubletonLayer<S>) -> bool {
        exceeds(&layer.r, &layer.r0, self.settings.factor)
    }

    fn reorganize<S: Scalar>(&self, layer: &mut DoubletonLayer<S>) {
        match krawczyk_inverse(&layer.c) {
            Ok(inv_c) => {
                std::mem::swap(&mut layer.b, &mut layer.c);
                std::mem::swap(&mut layer.r, &mut layer.r0);
                layer.inv_b = inv_c;
            }
            Err(err) => {
                warn!(error = %err, "cannot invert C for swap, folding instead");
                fold(layer);
            }
        }
    }
}
