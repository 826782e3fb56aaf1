use super::c1_doubleton::move_c1_layers;
use super::{move_affine_layer, working_point, DoubletonLayer, DynSet, LayerKind, SetState};
use crate::error::{check_dim, Result};
use crate::hessian::{pair_count, Hessian};
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{C2EnclosureMap, Scalar};
use crate::vectalg::{identity, max_diam, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// [`C1DoubletonSet`](super::C1DoubletonSet) extended by a third layer carrying the
/// second derivatives of the flow. The Hessian layer stores `n x n(n+1)/2` coefficient
/// matrices (see [`Hessian`]) and starts from zero.
#[derive(Debug, Clone)]
pub struct C2DoubletonSet<S: Scalar, P: SetPolicy = QrPolicies> {
    c0: DoubletonLayer<S>,
    c1: DoubletonLayer<S>,
    c2: DoubletonLayer<S>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    last_matrix_enclosure: Option<DMatrix<S>>,
    last_hessian_enclosure: Option<Hessian<S>>,
    policies: P,
}

impl<S: Scalar, P: SetPolicy> C2DoubletonSet<S, P> {
    pub fn from_box(x: &DVector<S>, policies: P) -> Self {
        let dim = x.len();
        Self {
            c0: DoubletonLayer::from_box(LayerKind::C0, &to_column(x)),
            c1: DoubletonLayer::from_box(LayerKind::C1, &identity(dim)),
            c2: DoubletonLayer::from_box(LayerKind::C2, &DMatrix::zeros(dim, pair_count(dim))),
            time: S::zero(),
            last_enclosure: None,
            last_matrix_enclosure: None,
            last_hessian_enclosure: None,
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

    pub fn c2(&self) -> &DoubletonLayer<S> {
        &self.c2
    }

    pub fn current_matrix(&self) -> &DMatrix<S> {
        self.c1.current()
    }

    /// Enclosure of the second derivatives of the flow over the initial set.
    pub fn current_hessian(&self) -> Result<Hessian<S>> {
        Hessian::from_matrix(self.c0.dimension(), self.c2.current().clone())
    }

    pub fn last_enclosure(&self) -> Option<&DVector<S>> {
        self.last_enclosure.as_ref()
    }

    pub fn last_matrix_enclosure(&self) -> Option<&DMatrix<S>> {
        self.last_matrix_enclosure.as_ref()
    }

    pub fn last_hessian_enclosure(&self) -> Option<&Hessian<S>> {
        self.last_hessian_enclosure.as_ref()
    }

    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        self.c0.eval_affine_functional(gradient, x0)
    }

    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        self.c0.affine_transformation(m, c)
    }
}

impl<S, P, D> DynSet<S, D> for C2DoubletonSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: C2EnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        let dim = self.c0.dimension();
        check_dim("C2 move (oracle dimension)", dim, dynsys.dimension())?;
        let (x_work, delta_x) = working_point(&self.c0);
        let enclosure =
            dynsys.enclose_c2_map(self.time, &to_vector(&x_work), &to_vector(self.c0.current()))?;
        for h in [&enclosure.lh, &enclosure.rh, &enclosure.eh] {
            check_dim("C2 oracle (hessian domain)", dim, h.dimension())?;
            check_dim("C2 oracle (hessian image)", dim, h.image_dimension())?;
        }

        let (mut c0, mut c1) = move_c1_layers(
            &self.c0,
            &self.c1,
            &x_work,
            &delta_x,
            &enclosure.c1,
            &self.policies,
        )?;

        // chain rule: D²(Φ∘g) = DΦ·D²g + D²Φ∘(Dg, Dg), with Dg the old Jacobian enclosure
        let jacobian = &enclosure.c1.c0.jac_phi + &enclosure.c1.jac_rem;
        let alpha = (&enclosure.lh + &enclosure.rh).compose(self.c1.current())?;
        let mut c2 = move_affine_layer(&self.c2, &jacobian, alpha.as_matrix(), &self.policies)?;

        self.policies.reorganize_if_needed(&mut c0);
        self.policies.reorganize_if_needed(&mut c1);
        self.policies.reorganize_if_needed(&mut c2);

        let time = self.time + dynsys.step();
        trace!(
            time = %time,
            width = max_diam(c0.current()),
            hessian_width = max_diam(c2.current()),
            "moved C2 doubleton"
        );
        Ok(Self {
            c0,
            c1,
            c2,
            time,
            last_enclosure: Some(enclosure.c1.c0.enc),
            last_matrix_enclosure: Some(enclosure.c1.jac_enc),
            last_hessian_enclosure: Some(enclosure.eh),
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for C2DoubletonSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(self.c0.current())
    }

    fn current_time(&self) -> S {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynset::evolve;
    use crate::interval::Interval;
    use crate::traits::{C0Enclosure, C0EnclosureMap, C1Enclosure, C1EnclosureMap, C2Enclosure};
    use num_traits::{One, Zero};

    /// `(x, y) -> (x + 0.2·y², 0.5·y)`.
    ///
    /// Φ is a polynomial of degree two, so the expansion around the working point is
    /// exact: `rh` carries the Hessian over the set and `lh` is zero.
    struct QuadraticMap;

    impl QuadraticMap {
        fn value(x: &DVector<Interval>) -> DVector<Interval> {
            DVector::from_vec(vec![
                x[0] + Interval::point(0.2) * x[1] * x[1],
                Interval::point(0.5) * x[1],
            ])
        }

        fn jacobian(x: &DVector<Interval>) -> DMatrix<Interval> {
            DMatrix::from_row_slice(
                2,
                2,
                &[
                    Interval::one(),
                    Interval::point(0.4) * x[1],
                    Interval::zero(),
                    Interval::point(0.5),
                ],
            )
        }
    }

    impl C0EnclosureMap<Interval> for QuadraticMap {
        fn dimension(&self) -> usize {
            2
        }

        fn step(&self) -> Interval {
            Interval::point(1.0)
        }

        fn enclose_c0_map(
            &mut self,
            _t: Interval,
            x: &DVector<Interval>,
            set: &DVector<Interval>,
        ) -> Result<C0Enclosure<Interval>> {
            // exact Taylor expansion: Φ(x + d) = Φ(x) + DΦ(x)·d + 0.2·d_y²
            let d = set - x;
            let rem = DVector::from_vec(vec![Interval::point(0.2) * d[1].sqr(), Interval::zero()]);
            Ok(C0Enclosure {
                y: Self::value(x),
                rem,
                enc: set.clone(),
                jac_phi: Self::jacobian(x),
            })
        }
    }

    impl C1EnclosureMap<Interval> for QuadraticMap {
        fn enclose_c1_map(
            &mut self,
            t: Interval,
            x: &DVector<Interval>,
            set: &DVector<Interval>,
        ) -> Result<C1Enclosure<Interval>> {
            let c0 = self.enclose_c0_map(t, x, set)?;
            let jac_set = Self::jacobian(set);
            Ok(C1Enclosure {
                jac_rem: &jac_set - &c0.jac_phi,
                jac_enc: jac_set,
                c0,
            })
        }
    }

    impl C2EnclosureMap<Interval> for QuadraticMap {
        fn enclose_c2_map(
            &mut self,
            t: Interval,
            x: &DVector<Interval>,
            set: &DVector<Interval>,
        ) -> Result<C2Enclosure<Interval>> {
            let c1 = self.enclose_c1_map(t, x, set)?;
            let mut rh = Hessian::zeros(2);
            rh.set(0, 1, 1, Interval::point(0.4));
            Ok(C2Enclosure {
                c1,
                lh: Hessian::zeros(2),
                eh: rh.clone(),
                rh,
            })
        }
    }

    #[test]
    fn first_step_hessian_is_the_map_hessian() {
        let x = DVector::from_vec(vec![Interval::new(-0.1, 0.1), Interval::new(0.9, 1.1)]);
        let set = C2DoubletonSet::from_box(&x, QrPolicies::default());
        let moved = set.move_set(&mut QuadraticMap).expect("polynomial map");
        let h = moved.current_hessian().expect("pair layout");
        assert!(h.get(0, 1, 1).contains(0.4));
        assert!(h.get(0, 0, 0).contains(0.0) && h.get(1, 1, 1).contains(0.0));
        assert!(h.get(0, 1, 1).diam() < 1e-12);
        assert!(moved.last_hessian_enclosure().is_some());
    }

    #[test]
    fn second_step_applies_chain_rule() {
        let x = DVector::from_vec(vec![Interval::new(-0.1, 0.1), Interval::new(0.9, 1.1)]);
        let set = C2DoubletonSet::from_box(&x, QrPolicies::default());
        let (moved, _) = evolve(&set, &mut QuadraticMap, 2).expect("polynomial map");
        // Φ²(x, y) = (x + 0.2·y² + 0.05·y², 0.25·y): ∂²/∂y² of the first component is 0.5
        let h = moved.current_hessian().expect("pair layout");
        assert!(h.get(0, 1, 1).contains(0.5), "{}", h.get(0, 1, 1));
        assert!(h.get(1, 1, 1).contains(0.0));
        let jac = moved.current_matrix();
        assert!(jac[(1, 1)].contains(0.25));
        assert!(jac[(0, 1)].contains(0.5 * 0.9) && jac[(0, 1)].contains(0.5 * 1.1));
    }
}
