use super::{c0_oracle_step, move_layer, DoubletonLayer, DynSet, LayerKind, SetState};
use crate::error::Result;
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{C0EnclosureMap, Scalar};
use crate::vectalg::{identity, max_diam, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Enclosure of a set of points as `x + C·r0 + B·r`, moved by a C0 oracle.
#[derive(Debug, Clone)]
pub struct C0DoubletonSet<S: Scalar, P: SetPolicy = QrPolicies> {
    layer: DoubletonLayer<S>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    policies: P,
}

impl<S: Scalar, P: SetPolicy> C0DoubletonSet<S, P> {
    /// The box `x` as `mid(x) + Id·(x - mid(x))`.
    pub fn from_box(x: &DVector<S>, policies: P) -> Self {
        Self::from_layer(DoubletonLayer::from_box(LayerKind::C0, &to_column(x)), policies)
    }

    /// `x + r0`.
    pub fn with_r0(x: &DVector<S>, r0: &DVector<S>, policies: P) -> Result<Self> {
        Self::with_lipschitz(x, &identity(x.len()), r0, policies)
    }

    /// `x + C·r0`.
    pub fn with_lipschitz(
        x: &DVector<S>,
        c: &DMatrix<S>,
        r0: &DVector<S>,
        policies: P,
    ) -> Result<Self> {
        let zero = DVector::zeros(x.len());
        Self::with_bases(x, c, r0, &identity(x.len()), &zero, policies)
    }

    /// `x + C·r0 + r`.
    pub fn with_error(
        x: &DVector<S>,
        c: &DMatrix<S>,
        r0: &DVector<S>,
        r: &DVector<S>,
        policies: P,
    ) -> Result<Self> {
        Self::with_bases(x, c, r0, &identity(x.len()), r, policies)
    }

    /// `x + C·r0 + B·r`. The representation is re-centered, see [`DoubletonLayer::new`].
    pub fn with_bases(
        x: &DVector<S>,
        c: &DMatrix<S>,
        r0: &DVector<S>,
        b: &DMatrix<S>,
        r: &DVector<S>,
        policies: P,
    ) -> Result<Self> {
        let layer = DoubletonLayer::new(
            LayerKind::C0,
            to_column(x),
            c.clone(),
            to_column(r0),
            b.clone(),
            to_column(r),
        )?;
        Ok(Self::from_layer(layer, policies))
    }

    pub fn from_layer(layer: DoubletonLayer<S>, policies: P) -> Self {
        Self {
            layer,
            time: S::zero(),
            last_enclosure: None,
            policies,
        }
    }

    pub fn with_time(mut self, time: S) -> Self {
        self.time = time;
        self
    }

    pub fn layer(&self) -> &DoubletonLayer<S> {
        &self.layer
    }

    pub fn policies(&self) -> &P {
        &self.policies
    }

    /// Enclosure of the trajectory over the last step, `None` before the first move.
    pub fn last_enclosure(&self) -> Option<&DVector<S>> {
        self.last_enclosure.as_ref()
    }

    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        self.layer.eval_affine_functional(gradient, x0)
    }

    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        self.layer.affine_transformation(m, c)
    }
}

impl<S, P, D> DynSet<S, D> for C0DoubletonSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: C0EnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        let step = c0_oracle_step(&self.layer, self.time, dynsys)?;
        let mut layer = move_layer(
            &self.layer,
            &step.center,
            &step.enclosure.jac_phi,
            &step.bound,
            &self.policies,
        )?;
        self.policies.reorganize_if_needed(&mut layer);
        let time = self.time + dynsys.step();
        trace!(time = %time, width = max_diam(layer.current()), "moved C0 doubleton");
        Ok(Self {
            layer,
            time,
            last_enclosure: Some(step.enclosure.enc),
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for C0DoubletonSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(self.layer.current())
    }

    fn current_time(&self) -> S {
        self.time
    }
}
