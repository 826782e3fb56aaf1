use super::{
    c0_step, move_affine_layer, move_layer, working_point, DoubletonLayer, DynSet, LayerKind,
    SetState,
};
use crate::error::{check_dim, Result};
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{C1Enclosure, C1EnclosureMap, Scalar};
use crate::vectalg::{identity, max_diam, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Doubleton enclosure of a set together with the derivative of the flow with respect
/// to initial conditions. The derivative is a second doubleton layer of `n x n`
/// matrices, starting from the identity.
#[derive(Debug, Clone)]
pub struct C1DoubletonSet<S: Scalar, P: SetPolicy = QrPolicies> {
    c0: DoubletonLayer<S>,
    c1: DoubletonLayer<S>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    last_matrix_enclosure: Option<DMatrix<S>>,
    policies: P,
}

pub(crate) fn check_c1_enclosure<S: Scalar>(dim: usize, enclosure: &C1Enclosure<S>) -> Result<()> {
    check_dim("C1 oracle (jac_rem rows)", dim, enclosure.jac_rem.nrows())?;
    check_dim("C1 oracle (jac_rem columns)", dim, enclosure.jac_rem.ncols())?;
    check_dim("C1 oracle (jac_enc rows)", dim, enclosure.jac_enc.nrows())?;
    check_dim("C1 oracle (jac_enc columns)", dim, enclosure.jac_enc.ncols())
}

/// Moves the value and Jacobian layers with one C1 oracle output.
pub(crate) fn move_c1_layers<S: Scalar, P: SetPolicy>(
    c0: &DoubletonLayer<S>,
    c1: &DoubletonLayer<S>,
    x_work: &DMatrix<S>,
    delta_x: &DMatrix<S>,
    enclosure: &C1Enclosure<S>,
    policies: &P,
) -> Result<(DoubletonLayer<S>, DoubletonLayer<S>)> {
    check_c1_enclosure(c0.dimension(), enclosure)?;
    let step = c0_step(c0, x_work, delta_x, enclosure.c0.clone())?;
    let moved_c0 = move_layer(c0, &step.center, &enclosure.c0.jac_phi, &step.bound, policies)?;
    let jacobian = &enclosure.c0.jac_phi + &enclosure.jac_rem;
    let zero = DMatrix::zeros(c1.dimension(), c1.x().ncols());
    let moved_c1 = move_affine_layer(c1, &jacobian, &zero, policies)?;
    Ok((moved_c0, moved_c1))
}

impl<S: Scalar, P: SetPolicy> C1DoubletonSet<S, P> {
    pub fn from_box(x: &DVector<S>, policies: P) -> Self {
        let c0 = DoubletonLayer::from_box(LayerKind::C0, &to_column(x));
        Self::from_c0_layer(c0, policies)
    }

    /// `x + C·r0 + B·r` with the identity as derivative.
    pub fn with_bases(
        x: &DVector<S>,
        c: &DMatrix<S>,
        r0: &DVector<S>,
        b: &DMatrix<S>,
        r: &DVector<S>,
        policies: P,
    ) -> Result<Self> {
        let c0 = DoubletonLayer::new(
            LayerKind::C0,
            to_column(x),
            c.clone(),
            to_column(r0),
            b.clone(),
            to_column(r),
        )?;
        Ok(Self::from_c0_layer(c0, policies))
    }

    fn from_c0_layer(c0: DoubletonLayer<S>, policies: P) -> Self {
        let dim = c0.dimension();
        Self {
            c0,
            c1: DoubletonLayer::from_box(LayerKind::C1, &identity(dim)),
            time: S::zero(),
            last_enclosure: None,
            last_matrix_enclosure: None,
            policies,
        }
    }

    pub fn with_time(mut self, time: S) -> Self {
        self.time = time;
        self
    }

    pub fn c0(&self) -> &DoubletonLayer<S> {
        &self.c0
    }

    pub fn c1(&self) -> &DoubletonLayer<S> {
        &self.c1
    }

    /// Enclosure of the derivative of the flow over the initial set.
    pub fn current_matrix(&self) -> &DMatrix<S> {
        self.c1.current()
    }

    pub fn last_enclosure(&self) -> Option<&DVector<S>> {
        self.last_enclosure.as_ref()
    }

    pub fn last_matrix_enclosure(&self) -> Option<&DMatrix<S>> {
        self.last_matrix_enclosure.as_ref()
    }

    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        self.c0.eval_affine_functional(gradient, x0)
    }

    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        self.c0.affine_transformation(m, c)
    }
}

impl<S, P, D> DynSet<S, D> for C1DoubletonSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: C1EnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        check_dim("C1 move (oracle dimension)", self.c0.dimension(), dynsys.dimension())?;
        let (x_work, delta_x) = working_point(&self.c0);
        let enclosure =
            dynsys.enclose_c1_map(self.time, &to_vector(&x_work), &to_vector(self.c0.current()))?;
        let (mut c0, mut c1) =
            move_c1_layers(&self.c0, &self.c1, &x_work, &delta_x, &enclosure, &self.policies)?;
        self.policies.reorganize_if_needed(&mut c0);
        self.policies.reorganize_if_needed(&mut c1);

        let time = self.time + dynsys.step();
        trace!(
            time = %time,
            width = max_diam(c0.current()),
            jacobian_width = max_diam(c1.current()),
            "moved C1 doubleton"
        );
        Ok(Self {
            c0,
            c1,
            time,
            last_enclosure: Some(enclosure.c0.enc),
            last_matrix_enclosure: Some(enclosure.jac_enc),
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for C1DoubletonSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(self.c0.current())
    }

    fn current_time(&self) -> S {
        self.time
    }
}
