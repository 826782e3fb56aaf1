use super::{
    c0_step, move_affine_layer, move_layer, working_point, DoubletonLayer, DynSet, LayerKind,
    SetState,
};
use crate::error::{check_dim, EnclosureError, Result};
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{CnEnclosureMap, Scalar};
use crate::vectalg::{max_diam, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Exponent vectors of all monomials in `dim` variables of degree at most `degree`.
///
/// Ordered by degree; within a degree, exponents of earlier variables come first
/// (`x0² , x0·x1, x1²`). Index `0` is the constant term, indices `1..=dim` the
/// first-order terms in coordinate order.
pub fn multi_indices(dim: usize, degree: usize) -> Vec<Vec<usize>> {
    fn fill(prefix: &mut Vec<usize>, dim: usize, remaining: usize, out: &mut Vec<Vec<usize>>) {
        if prefix.len() + 1 == dim {
            prefix.push(remaining);
            out.push(prefix.clone());
            prefix.pop();
            return;
        }
        for k in (0..=remaining).rev() {
            prefix.push(k);
            fill(prefix, dim, remaining - k, out);
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    if dim == 0 {
        out.push(Vec::new());
        return out;
    }
    for d in 0..=degree {
        fill(&mut Vec::with_capacity(dim), dim, d, &mut out);
    }
    out
}

/// Doubleton enclosure of a jet: the set itself and the normalized Taylor coefficients
/// `∂^α Φ / α!` of the flow up to a fixed degree, one doubleton layer per multi-index.
#[derive(Debug, Clone)]
pub struct CnDoubletonSet<S: Scalar, P: SetPolicy = QrPolicies> {
    degree: usize,
    indices: Vec<Vec<usize>>,
    layers: Vec<DoubletonLayer<S>>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    policies: P,
}

impl<S: Scalar, P: SetPolicy> CnDoubletonSet<S, P> {
    /// Box `x` with the identity as first-order part and zero higher coefficients.
    pub fn from_box(x: &DVector<S>, degree: usize, policies: P) -> Result<Self> {
        let dim = x.len();
        if degree == 0 {
            return Err(EnclosureError::InvalidArgument(
                "Cn doubleton needs degree at least 1".to_string(),
            ));
        }
        let indices = multi_indices(dim, degree);
        let layers = indices
            .iter()
            .enumerate()
            .map(|(slot, alpha)| {
                if slot == 0 {
                    return DoubletonLayer::from_box(LayerKind::C0, &to_column(x));
                }
                let mut value = DMatrix::zeros(dim, 1);
                if alpha.iter().sum::<usize>() == 1 {
                    if let Some(j) = alpha.iter().position(|&e| e == 1) {
                        value[(j, 0)] = S::one();
                    }
                }
                DoubletonLayer::from_box(LayerKind::Jet, &value)
            })
            .collect();
        Ok(Self {
            degree,
            indices,
            layers,
            time: S::zero(),
            last_enclosure: None,
            policies,
        })
    }

    pub fn with_time(mut self, time: S) -> Self {
        self.time = time;
        self
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn dimension(&self) -> usize {
        self.layers[0].dimension()
    }

    pub fn multi_indices(&self) -> &[Vec<usize>] {
        &self.indices
    }

    /// Layer of the coefficient with exponent vector `alpha`.
    pub fn layer(&self, alpha: &[usize]) -> Option<&DoubletonLayer<S>> {
        self.indices
            .iter()
            .position(|index| index.as_slice() == alpha)
            .map(|slot| &self.layers[slot])
    }

    /// Enclosure of the coefficient with exponent vector `alpha`.
    pub fn coefficient(&self, alpha: &[usize]) -> Option<DVector<S>> {
        self.layer(alpha).map(|layer| to_vector(layer.current()))
    }

    /// Hulls of every coefficient, in the order of [`multi_indices`](Self::multi_indices).
    pub fn jet(&self) -> Vec<DVector<S>> {
        self.layers.iter().map(|layer| to_vector(layer.current())).collect()
    }

    /// First-order coefficients as columns, i.e. the derivative of the flow.
    pub fn current_matrix(&self) -> DMatrix<S> {
        let dim = self.dimension();
        let mut m = DMatrix::zeros(dim, dim);
        for j in 0..dim {
            m.set_column(j, &self.layers[j + 1].current().column(0));
        }
        m
    }

    pub fn last_enclosure(&self) -> Option<&DVector<S>> {
        self.last_enclosure.as_ref()
    }

    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        self.layers[0].eval_affine_functional(gradient, x0)
    }

    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        self.layers[0].affine_transformation(m, c)
    }
}

impl<S, P, D> DynSet<S, D> for CnDoubletonSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: CnEnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        let dim = self.dimension();
        check_dim("Cn move (oracle dimension)", dim, dynsys.dimension())?;
        let value = &self.layers[0];
        let (x_work, delta_x) = working_point(value);
        let jet = self.jet();
        let enclosure = dynsys.enclose_cn_map(
            self.time,
            &to_vector(&x_work),
            &to_vector(value.current()),
            &jet,
        )?;
        check_dim("Cn oracle (jacobian rows)", dim, enclosure.jacobian.nrows())?;
        check_dim("Cn oracle (jacobian columns)", dim, enclosure.jacobian.ncols())?;
        check_dim(
            "Cn oracle (nonlinear terms)",
            self.layers.len() - 1,
            enclosure.nonlinear.len(),
        )?;

        let step = c0_step(value, &x_work, &delta_x, enclosure.c0)?;
        let mut layers = Vec::with_capacity(self.layers.len());
        layers.push(move_layer(
            value,
            &step.center,
            &step.enclosure.jac_phi,
            &step.bound,
            &self.policies,
        )?);
        for (layer, nonlinear) in self.layers[1..].iter().zip(&enclosure.nonlinear) {
            check_dim("Cn oracle (nonlinear term length)", dim, nonlinear.len())?;
            layers.push(move_affine_layer(
                layer,
                &enclosure.jacobian,
                &to_column(nonlinear),
                &self.policies,
            )?);
        }
        for layer in &mut layers {
            self.policies.reorganize_if_needed(layer);
        }

        let time = self.time + dynsys.step();
        trace!(
            time = %time,
            width = max_diam(layers[0].current()),
            slots = layers.len(),
            "moved Cn doubleton"
        );
        Ok(Self {
            degree: self.degree,
            indices: self.indices.clone(),
            layers,
            time,
            last_enclosure: Some(step.enclosure.enc),
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for CnDoubletonSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(self.layers[0].current())
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
    use crate::traits::{C0Enclosure, C0EnclosureMap, CnEnclosure};
    use num_traits::One;

    #[test]
    fn multi_indices_are_graded() {
        assert_eq!(
            multi_indices(2, 2),
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2],
            ]
        );
        assert_eq!(multi_indices(3, 3).len(), 20);
        assert_eq!(multi_indices(1, 4), vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    /// `x -> x + c·x²` in one dimension.
    struct Logistic {
        c: f64,
    }

    impl Logistic {
        fn c(&self) -> Interval {
            Interval::point(self.c)
        }

        fn value(&self, x: Interval) -> Interval {
            x + self.c() * x.sqr()
        }

        fn derivative(&self, x: Interval) -> Interval {
            Interval::one() + Interval::point(2.0) * self.c() * x
        }
    }

    impl C0EnclosureMap<Interval> for Logistic {
        fn dimension(&self) -> usize {
            1
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
            let d = set[0] - x[0];
            Ok(C0Enclosure {
                y: DVector::from_element(1, self.value(x[0])),
                rem: DVector::from_element(1, self.c() * d.sqr()),
                enc: set.clone(),
                jac_phi: DMatrix::from_element(1, 1, self.derivative(x[0])),
            })
        }
    }

    impl CnEnclosureMap<Interval> for Logistic {
        fn enclose_cn_map(
            &mut self,
            t: Interval,
            x: &DVector<Interval>,
            set: &DVector<Interval>,
            jet: &[DVector<Interval>],
        ) -> Result<CnEnclosure<Interval>> {
            let c0 = self.enclose_c0_map(t, x, set)?;
            // (Φ∘g)' = Φ'(g)·g',  (Φ∘g)''/2 = Φ'(g)·g''/2 + c·(g')²
            Ok(CnEnclosure {
                c0,
                jacobian: DMatrix::from_element(1, 1, self.derivative(set[0])),
                nonlinear: vec![
                    DVector::zeros(1),
                    DVector::from_element(1, self.c() * jet[1][0].sqr()),
                ],
            })
        }
    }

    #[test]
    fn jet_of_quadratic_map_is_enclosed() {
        let x = DVector::from_element(1, Interval::new(0.1, 0.2));
        let set = CnDoubletonSet::from_box(&x, 2, QrPolicies::default()).expect("degree 2");
        let mut map = Logistic { c: 0.1 };
        let (moved, _) = evolve(&set, &mut map, 2).expect("polynomial map");

        for x0 in [0.1, 0.15, 0.2] {
            let c = 0.1;
            let phi = x0 + c * x0 * x0;
            let d1 = 1.0 + 2.0 * c * x0;
            let first = (1.0 + 2.0 * c * phi) * d1;
            let second = (1.0 + 2.0 * c * phi) * c + c * d1 * d1;
            let value = phi + c * phi * phi;
            assert!(moved.current_set()[0].contains(value));
            assert!(moved.coefficient(&[1]).expect("slot")[0].contains(first));
            assert!(moved.coefficient(&[2]).expect("slot")[0].contains(second));
        }
        assert_eq!(moved.current_matrix()[(0, 0)], moved.jet()[1][0]);
    }

    #[test]
    fn zero_degree_is_rejected() {
        let x = DVector::from_element(1, Interval::new(0.1, 0.2));
        let err = CnDoubletonSet::from_box(&x, 0, QrPolicies::default()).expect_err("degree 0");
        assert!(err.to_string().contains("degree at least 1"));
    }

    #[test]
    fn initial_first_order_part_is_identity() {
        let x = DVector::from_element(3, Interval::new(-1.0, 1.0));
        let set = CnDoubletonSet::from_box(&x, 2, QrPolicies::default()).expect("degree 2");
        assert_eq!(set.current_matrix(), DMatrix::identity(3, 3));
        assert_eq!(set.coefficient(&[1, 1, 0]), Some(DVector::zeros(3)));
        assert!(set.coefficient(&[3, 0, 0]).is_none());
    }
}
