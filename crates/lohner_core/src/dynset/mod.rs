//! Doubleton and tripleton sets and their one-step evolution.
//!
//! Every set is made of [`DoubletonLayer`]s: one for the values and, for the C1/C2/Cn
//! sets, one per derivative. A move asks the enclosure oracle for one-step bounds,
//! pushes each layer through the linear part of the step and reorganizes it. Moves are
//! computed on fresh values, so a failed move leaves the original set untouched.

mod c1_doubleton;
mod c2_doubleton;
mod cn_doubleton;
mod doubleton;
mod ho;
mod layer;
mod tripleton;

pub use c1_doubleton::C1DoubletonSet;
pub use c2_doubleton::C2DoubletonSet;
pub use cn_doubleton::{multi_indices, CnDoubletonSet};
pub use doubleton::C0DoubletonSet;
pub use ho::C0HoSet;
pub use layer::{DoubletonLayer, LayerKind};
pub use tripleton::C0TripletonSet;

pub(crate) use layer::{move_affine_layer, move_layer, move_layer_with};

use crate::error::{check_dim, Result};
use crate::traits::{C0Enclosure, C0EnclosureMap, Scalar};
use crate::vectalg::{split, subset, to_column, to_vector};
use nalgebra::{DMatrix, DVector};

/// Read access to a set, independent of the system that moves it.
pub trait SetState<S: Scalar> {
    /// Interval hull of the set.
    fn current_set(&self) -> DVector<S>;

    fn current_time(&self) -> S;
}

/// A set that can be moved by a dynamical system of type `D`.
pub trait DynSet<S: Scalar, D: ?Sized>: SetState<S> {
    /// Image of the set after one step of `dynsys`. `self` is not modified.
    fn move_set(&self, dynsys: &mut D) -> Result<Self>
    where
        Self: Sized;

    /// Replaces `self` by its image; on failure `self` keeps its previous value.
    fn move_in_place(&mut self, dynsys: &mut D) -> Result<()>
    where
        Self: Sized,
    {
        *self = self.move_set(dynsys)?;
        Ok(())
    }
}

/// Applies `steps` moves to a copy of `set`.
///
/// Returns the final set and the hull after every step. Stops at the first failing
/// move; the error is returned and `set` is left untouched.
pub fn evolve<S, D, T>(set: &T, dynsys: &mut D, steps: usize) -> Result<(T, Vec<DVector<S>>)>
where
    S: Scalar,
    D: ?Sized,
    T: DynSet<S, D> + Clone,
{
    let mut current = set.clone();
    let mut hulls = Vec::with_capacity(steps);
    for _ in 0..steps {
        current = current.move_set(dynsys)?;
        hulls.push(current.current_set());
    }
    Ok((current, hulls))
}

/// Value-layer data for one move: the working point, the oracle output and the two
/// inputs of the generic layer move.
pub(crate) struct C0Step<S: Scalar> {
    pub enclosure: C0Enclosure<S>,
    pub center: DMatrix<S>,
    pub bound: DMatrix<S>,
}

/// Chooses the working point of a value layer.
///
/// The representation center is used when it lies in the hull, otherwise the midpoint
/// of the hull. Returns the point and the hull minus the point.
pub(crate) fn working_point<S: Scalar>(
    layer: &DoubletonLayer<S>,
) -> (DMatrix<S>, DMatrix<S>) {
    if subset(layer.x(), layer.current()) {
        let delta = layer.current() - layer.x();
        (layer.x().clone(), delta)
    } else {
        split(layer.current())
    }
}

/// Validates the oracle output and builds `center = y + rem + J·(x - x_work)` and
/// `bound = y + rem + J·(current - x_work)`.
pub(crate) fn c0_step<S: Scalar>(
    layer: &DoubletonLayer<S>,
    x_work: &DMatrix<S>,
    delta_x: &DMatrix<S>,
    enclosure: C0Enclosure<S>,
) -> Result<C0Step<S>> {
    let dim = layer.dimension();
    check_dim("C0 oracle (y)", dim, enclosure.y.len())?;
    check_dim("C0 oracle (rem)", dim, enclosure.rem.len())?;
    check_dim("C0 oracle (jacobian rows)", dim, enclosure.jac_phi.nrows())?;
    check_dim("C0 oracle (jacobian columns)", dim, enclosure.jac_phi.ncols())?;
    check_dim("C0 oracle (enclosure)", dim, enclosure.enc.len())?;
    let y_rem = to_column(&enclosure.y) + to_column(&enclosure.rem);
    let center = &y_rem + &enclosure.jac_phi * (layer.x() - x_work);
    let bound = &y_rem + &enclosure.jac_phi * delta_x;
    Ok(C0Step {
        enclosure,
        center,
        bound,
    })
}

/// Calls the oracle for a value layer and prepares the generic move.
pub(crate) fn c0_oracle_step<S, D>(
    layer: &DoubletonLayer<S>,
    t: S,
    dynsys: &mut D,
) -> Result<C0Step<S>>
where
    S: Scalar,
    D: C0EnclosureMap<S> + ?Sized,
{
    check_dim("C0 move (oracle dimension)", layer.dimension(), dynsys.dimension())?;
    let (x_work, delta_x) = working_point(layer);
    let enclosure =
        dynsys.enclose_c0_map(t, &to_vector(&x_work), &to_vector(layer.current()))?;
    c0_step(layer, &x_work, &delta_x, enclosure)
}
