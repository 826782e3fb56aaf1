use super::{c0_oracle_step, move_layer_with, DoubletonLayer, DynSet, LayerKind, SetState};
use crate::error::Result;
use crate::matrix_algorithms::krawczyk_inverse;
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{C0EnclosureMap, Scalar};
use crate::vectalg::{intersection, max_diam, mid, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::{trace, warn};

/// Doubleton with a second error basis: the error term is enclosed by both `B·r` and
/// `Q·q`, and the two images are intersected on every move.
///
/// `B` follows the set policy while `Q` is always the parallelepiped basis
/// `mid(A·Q)`, so the two enclosures wrap in different directions.
#[derive(Debug, Clone)]
pub struct C0TripletonSet<S: Scalar, P: SetPolicy = QrPolicies> {
    layer: DoubletonLayer<S>,
    q_basis: DMatrix<S>,
    inv_q: DMatrix<S>,
    q: DMatrix<S>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    policies: P,
}

impl<S: Scalar, P: SetPolicy> C0TripletonSet<S, P> {
    pub fn from_box(x: &DVector<S>, policies: P) -> Self {
        Self::from_layer(DoubletonLayer::from_box(LayerKind::C0, &to_column(x)), policies)
    }

    /// `x + C·r0 + B·r`, with `Q = B` and `q = r` at the start.
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

    fn from_layer(layer: DoubletonLayer<S>, policies: P) -> Self {
        Self {
            q_basis: layer.b.clone(),
            inv_q: layer.inv_b.clone(),
            q: layer.r.clone(),
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

    pub fn q_basis(&self) -> &DMatrix<S> {
        &self.q_basis
    }

    pub fn inv_q(&self) -> &DMatrix<S> {
        &self.inv_q
    }

    pub fn q(&self) -> &DMatrix<S> {
        &self.q
    }

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

impl<S, P, D> DynSet<S, D> for C0TripletonSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: C0EnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        let step = c0_oracle_step(&self.layer, self.time, dynsys)?;
        let a = &step.enclosure.jac_phi;
        let q_image = a * &self.q_basis;
        let image = move_layer_with(
            &self.layer,
            &step.center,
            a,
            &step.bound,
            &self.policies,
            |b_image| {
                intersection(
                    &(b_image * &self.layer.r),
                    &(&q_image * &self.q),
                    "tripleton move: the two error enclosures are disjoint",
                )
            },
        )?;

        let q_mid = mid(&q_image);
        let mut layer = image.layer;
        let (mut q_basis, mut inv_q, mut q) = match krawczyk_inverse(&q_mid) {
            Ok(inv_q) => {
                let q = (&inv_q * &q_image) * &self.q + &inv_q * &image.y_err;
                (q_mid, inv_q, q)
            }
            Err(err) => {
                warn!(error = %err, "cannot invert second error basis, copying B");
                (layer.b.clone(), layer.inv_b.clone(), layer.r.clone())
            }
        };
        if self.policies.reorganize_if_needed(&mut layer) {
            q_basis = layer.b.clone();
            inv_q = layer.inv_b.clone();
            q = layer.r.clone();
        }

        let time = self.time + dynsys.step();
        trace!(time = %time, width = max_diam(layer.current()), "moved C0 tripleton");
        Ok(Self {
            layer,
            q_basis,
            inv_q,
            q,
            time,
            last_enclosure: Some(step.enclosure.enc),
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for C0TripletonSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(self.layer.current())
    }

    fn current_time(&self) -> S {
        self.time
    }
}

impl<S: Scalar> C0TripletonSet<S, QrPolicies> {
    /// Box with the default policies.
    pub fn new(x: &DVector<S>) -> Self {
        Self::from_box(x, QrPolicies::default())
    }
}
