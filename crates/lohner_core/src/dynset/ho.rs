use super::{c0_step, move_layer, DoubletonLayer, DynSet, LayerKind, SetState};
use crate::error::{check_dim, EnclosureError, Result};
use crate::matrix_algorithms::gauss_inverse_matrix;
use crate::policy::{QrPolicies, SetPolicy};
use crate::traits::{HoEnclosureMap, Scalar};
use crate::vectalg::{identity, intersection, max_diam, mid, split, subset, to_column, to_vector};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// `binom(n, k)` as a float; exact for the orders used by Taylor solvers.
fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Doubleton moved by a Hermite-Obreshkov predictor/corrector pair.
///
/// The predictor is an ordinary C0 doubleton move. The corrector solves the implicit
/// HO relation `psi_minus(x1) = psi_plus(x0) + E` by one Newton-like step around the
/// center of the predicted image, and is moved with the resulting linear part. The hull
/// is the intersection of both images.
#[derive(Debug, Clone)]
pub struct C0HoSet<S: Scalar, P: SetPolicy = QrPolicies> {
    corrector: DoubletonLayer<S>,
    predictor: DoubletonLayer<S>,
    current: DMatrix<S>,
    time: S,
    last_enclosure: Option<DVector<S>>,
    policies: P,
}

impl<S: Scalar, P: SetPolicy> C0HoSet<S, P> {
    pub fn from_box(x: &DVector<S>, policies: P) -> Self {
        Self::from_layer(DoubletonLayer::from_box(LayerKind::C0, &to_column(x)), policies)
    }

    pub fn from_layer(layer: DoubletonLayer<S>, policies: P) -> Self {
        Self {
            current: layer.current.clone(),
            predictor: layer.clone(),
            corrector: layer,
            time: S::zero(),
            last_enclosure: None,
            policies,
        }
    }

    pub fn with_time(mut self, time: S) -> Self {
        self.time = time;
        self
    }

    pub fn predictor(&self) -> &DoubletonLayer<S> {
        &self.predictor
    }

    pub fn corrector(&self) -> &DoubletonLayer<S> {
        &self.corrector
    }

    pub fn last_enclosure(&self) -> Option<&DVector<S>> {
        self.last_enclosure.as_ref()
    }

    /// Intersection of the values given by both representations.
    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        let by_corrector = self.corrector.eval_affine_functional(gradient, x0)?;
        let by_predictor = self.predictor.eval_affine_functional(gradient, x0)?;
        by_corrector
            .intersection(&by_predictor)
            .ok_or_else(|| EnclosureError::empty("HO eval_affine_functional"))
    }

    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        let by_corrector = to_column(&self.corrector.affine_transformation(m, c)?);
        let by_predictor = to_column(&self.predictor.affine_transformation(m, c)?);
        let result = intersection(&by_corrector, &by_predictor, "HO affine_transformation")?;
        Ok(to_vector(&result))
    }
}

impl<S, P, D> DynSet<S, D> for C0HoSet<S, P>
where
    S: Scalar,
    P: SetPolicy,
    D: HoEnclosureMap<S> + ?Sized,
{
    fn move_set(&self, dynsys: &mut D) -> Result<Self> {
        let dim = self.corrector.dimension();
        check_dim("HO move (oracle dimension)", dim, dynsys.dimension())?;
        let x = self.predictor.x().clone();
        let delta_x = &self.current - &x;
        let enclosure =
            dynsys.enclose_c0_map(self.time, &to_vector(&x), &to_vector(&self.current))?;
        let step = c0_step(&self.predictor, &x, &delta_x, enclosure)?;
        let mut predictor = move_layer(
            &self.predictor,
            &step.center,
            &step.enclosure.jac_phi,
            &step.bound,
            &self.policies,
        )?;
        self.policies.reorganize_if_needed(&mut predictor);

        let (y, delta_y) = split(predictor.current());
        let ho = dynsys.enclose_ho_corrector(
            self.time,
            &to_vector(&x),
            &to_vector(&self.current),
            &to_vector(&y),
            &to_vector(predictor.current()),
        )?;
        check_dim("HO oracle (psi_plus)", dim, ho.psi_plus.len())?;
        check_dim("HO oracle (psi_minus)", dim, ho.psi_minus.len())?;
        check_dim("HO oracle (j_plus)", dim, ho.j_plus.nrows())?;
        check_dim("HO oracle (j_minus)", dim, ho.j_minus.nrows())?;

        let order = dynsys.order();
        let q = order / 2;
        let p = order - q;
        let sign = if q % 2 == 1 { -S::one() } else { S::one() };
        let weight = sign / S::from_f64(binomial(p + q, q));
        let rem_ho = to_column(&ho.psi_plus) - to_column(&ho.psi_minus)
            + to_column(&step.enclosure.rem).map(|v| v * weight);

        let m = mid(&gauss_inverse_matrix(&mid(&ho.j_minus))?);
        let jac = &m * &ho.j_plus;
        let residual = identity::<S>(dim) - &m * &ho.j_minus;
        let z = &y + &m * &rem_ho + &residual * &delta_y;

        let time = self.time + dynsys.step();
        let last_enclosure = Some(step.enclosure.enc);
        let corrector_bound = &z + &jac * &delta_x;
        if subset(predictor.current(), &corrector_bound) {
            trace!(
                time = %time,
                width = max_diam(predictor.current()),
                "HO corrector not sharper"
            );
            return Ok(Self {
                current: predictor.current.clone(),
                corrector: predictor.clone(),
                predictor,
                time,
                last_enclosure,
                policies: self.policies.clone(),
            });
        }

        let center = &z + &jac * (self.corrector.x() - &x);
        let mut corrector = move_layer(
            &self.corrector,
            &center,
            &jac,
            &corrector_bound,
            &self.policies,
        )?;
        self.policies.reorganize_if_needed(&mut corrector);
        let current = intersection(
            predictor.current(),
            corrector.current(),
            "HO move: predictor and corrector are disjoint",
        )?;

        if subset(corrector.current(), predictor.current()) {
            predictor = corrector.clone();
        } else {
            corrector.current = current.clone();
            predictor.current = current.clone();
            if !subset(predictor.x(), &current) {
                predictor = corrector.clone();
            }
        }

        trace!(time = %time, width = max_diam(&current), "moved C0 HO set");
        Ok(Self {
            corrector,
            predictor,
            current,
            time,
            last_enclosure,
            policies: self.policies.clone(),
        })
    }
}

impl<S: Scalar, P: SetPolicy> SetState<S> for C0HoSet<S, P> {
    fn current_set(&self) -> DVector<S> {
        to_vector(&self.current)
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
    use crate::traits::{C0Enclosure, C0EnclosureMap, HoCorrector};
    use num_traits::{One, Zero};

    /// `x' = -x` with a second order Taylor predictor and the trapezoidal corrector.
    struct Decay {
        h: f64,
    }

    impl Decay {
        fn h(&self) -> Interval {
            Interval::point(self.h)
        }

        fn scalar(&self, value: Interval) -> DMatrix<Interval> {
            DMatrix::from_element(1, 1, value)
        }
    }

    impl C0EnclosureMap<Interval> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn step(&self) -> Interval {
            self.h()
        }

        fn enclose_c0_map(
            &mut self,
            _t: Interval,
            x: &DVector<Interval>,
            set: &DVector<Interval>,
        ) -> Result<C0Enclosure<Interval>> {
            let h = self.h();
            let taylor = Interval::one() - h + h * h / Interval::point(2.0);
            let enc = set.map(|v| v * Interval::new((-self.h).exp() * 0.99, 1.0));
            let h3 = h * h * h / Interval::point(6.0);
            Ok(C0Enclosure {
                y: x.map(|v| v * taylor),
                rem: enc.map(|v| -(v * h3)),
                enc,
                jac_phi: self.scalar(taylor),
            })
        }
    }

    impl HoEnclosureMap<Interval> for Decay {
        fn order(&self) -> usize {
            2
        }

        fn enclose_ho_corrector(
            &mut self,
            _t: Interval,
            x: &DVector<Interval>,
            _set: &DVector<Interval>,
            y: &DVector<Interval>,
            _image: &DVector<Interval>,
        ) -> Result<HoCorrector<Interval>> {
            let half = self.h() / Interval::point(2.0);
            let plus = Interval::one() - half;
            let minus = Interval::one() + half;
            Ok(HoCorrector {
                psi_plus: x.map(|v| v * plus),
                j_plus: self.scalar(plus),
                psi_minus: y.map(|v| v * minus),
                j_minus: self.scalar(minus),
            })
        }
    }

    #[test]
    fn binomial_matches_pascal() {
        assert_eq!(binomial(4, 2), 6.0);
        assert_eq!(binomial(6, 3), 20.0);
        assert_eq!(binomial(5, 0), 1.0);
    }

    #[test]
    fn decay_stays_enclosed() {
        let x = DVector::from_element(1, Interval::new(0.9, 1.1));
        let set = C0HoSet::from_box(&x, QrPolicies::default());
        let mut decay = Decay { h: 0.1 };
        let (moved, hulls) = evolve(&set, &mut decay, 10).expect("small step");
        let hull = moved.current_set()[0];
        let e = (-1.0_f64).exp();
        assert!(hull.contains(0.9 * e) && hull.contains(1.1 * e), "{hull}");
        assert!(hull.diam() < 0.2 * e + 2e-3, "{hull}");
        assert_eq!(hulls.len(), 10);
        assert!(moved.current_time().contains(1.0));
        assert!(moved.last_enclosure().is_some());
    }

    #[test]
    fn representations_stay_consistent() {
        let x = DVector::from_element(1, Interval::new(-0.5, 0.5));
        let set = C0HoSet::from_box(&x, QrPolicies::default());
        let mut decay = Decay { h: 0.05 };
        let moved = set.move_set(&mut decay).expect("small step");
        assert!(subset(
            &to_column(&moved.current_set()),
            moved.predictor().current()
        ));
        let gradient = DVector::from_element(1, Interval::one());
        let x0 = DVector::from_element(1, Interval::zero());
        let value = moved
            .eval_affine_functional(&gradient, &x0)
            .expect("consistent representations");
        let e = (-0.05_f64).exp();
        assert!(value.contains(0.5 * e) && value.contains(-0.5 * e));
    }
}
