use lohner_core::matrix_algorithms::{gauss, gauss_inverse_matrix, krawczyk_inverse, qr_decompose};
use lohner_core::policy::{
    CoordWiseReorganization, FactorReorganization, InvBByCFactorReorganization, QrReorganization,
    Reorganization, ReorganizationSettings, SwapReorganization,
};
use lohner_core::vectalg::subset;
use lohner_core::{DoubletonLayer, Interval, LayerKind, Scalar};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

fn point_matrix(dim: usize, entries: &[f64]) -> DMatrix<Interval> {
    DMatrix::from_row_slice(dim, dim, entries).map(Interval::point)
}

/// Entries in `[-1, 1]` with the diagonal shifted by `dim + 1`, so the matrix is
/// strictly diagonally dominant.
fn dominant_matrix(dim: usize) -> impl Strategy<Value = DMatrix<f64>> {
    prop::collection::vec(-1.0..1.0_f64, dim * dim).prop_map(move |entries| {
        let mut a = DMatrix::from_row_slice(dim, dim, &entries);
        for i in 0..dim {
            a[(i, i)] += if a[(i, i)] < 0.0 { -(dim as f64 + 1.0) } else { dim as f64 + 1.0 };
        }
        a
    })
}

fn reorganized<R: Reorganization>(
    strategy: R,
    layer: &DoubletonLayer<Interval>,
) -> DoubletonLayer<Interval> {
    let mut layer = layer.clone();
    strategy.reorganize(&mut layer);
    layer
}

fn slack(v: &Interval, p: f64) -> bool {
    let tol = 1e-9 * (1.0 + p.abs());
    v.lo() - tol <= p && p <= v.hi() + tol
}

#[test]
fn gauss_reports_singular_matrix() {
    let a = point_matrix(2, &[1.0, 2.0, 2.0, 4.0]);
    let b = DVector::from_vec(vec![Interval::point(1.0), Interval::point(2.0)]);
    let err = gauss(&a, &b).expect_err("rank one");
    assert!(err.is_singular_matrix(), "{err}");
    assert!(gauss_inverse_matrix(&a).expect_err("rank one").is_singular_matrix());
}

proptest! {
    #[test]
    fn gauss_solution_contains_point_solution(a in dominant_matrix(3), b in prop::collection::vec(-5.0..5.0_f64, 3)) {
        let b = DVector::from_vec(b);
        let x = gauss(&a.map(Interval::point), &b.map(Interval::point)).unwrap();
        let expected = a.clone().lu().solve(&b).unwrap();
        for i in 0..3 {
            prop_assert!(slack(&x[i], expected[i]));
            prop_assert!(x[i].diam() < 1e-9);
        }
    }

    #[test]
    fn krawczyk_inverse_encloses_identity_product(a in dominant_matrix(4)) {
        let expected = a.clone().try_inverse().unwrap();
        let a = a.map(Interval::point);
        let inv = krawczyk_inverse(&a).unwrap();
        prop_assert!(subset(&DMatrix::identity(4, 4), &(&inv * &a)));
        prop_assert!(subset(&DMatrix::identity(4, 4), &(&a * gauss_inverse_matrix(&a).unwrap())));
        for (k, e) in inv.iter().zip(expected.iter()) {
            prop_assert!(slack(k, *e));
            prop_assert!(k.diam() < 1e-9);
        }
    }

    #[test]
    fn qr_factors_reproduce_matrix(a in dominant_matrix(3)) {
        let a = a.map(Interval::point);
        let (q, r) = qr_decompose(&a).unwrap();
        prop_assert!(subset(&a, &(&q * &r)));
        prop_assert!(subset(&DMatrix::identity(3, 3), &(q.transpose() * &q)));
    }

    #[test]
    fn reorganizations_keep_the_represented_set(
        c in prop::collection::vec(-2.0..2.0_f64, 4),
        angle in 0.0..std::f64::consts::PI,
        r0 in 0.01..1.0_f64,
        r in 0.01..5.0_f64,
    ) {
        let (s, co) = angle.sin_cos();
        let b = point_matrix(2, &[co, -s, s, co]);
        let c = point_matrix(2, &[c[0] + 3.0, c[1], c[2], c[3] + 3.0]);
        let layer = DoubletonLayer::new(
            LayerKind::C0,
            DMatrix::from_element(2, 1, Interval::point(0.25)),
            c.clone(),
            DMatrix::from_element(2, 1, Interval::symmetric(r0)),
            b.clone(),
            DMatrix::from_element(2, 1, Interval::symmetric(r)),
        ).unwrap();

        let mut vertices = Vec::new();
        for u in [[-r0, -r0], [-r0, r0], [r0, -r0], [r0, r0]] {
            for v in [[-r, -r], [-r, r], [r, -r], [r, r]] {
                let cm = c.map(|x| x.midpoint());
                let bm = b.map(|x| x.midpoint());
                let p = DVector::from_element(2, 0.25)
                    + cm * DVector::from_column_slice(&u)
                    + bm * DVector::from_column_slice(&v);
                vertices.push(p);
            }
        }

        let settings = ReorganizationSettings::default();
        let moved_layers = [
            reorganized(FactorReorganization::new(settings), &layer),
            reorganized(QrReorganization::new(settings), &layer),
            reorganized(InvBByCFactorReorganization::new(settings), &layer),
            reorganized(CoordWiseReorganization::new(settings), &layer),
            reorganized(SwapReorganization::new(settings), &layer),
        ];
        for moved in moved_layers {
            prop_assert_eq!(moved.current(), layer.current());
            prop_assert!(moved.is_centered());
            let image = moved.evaluate();
            for p in &vertices {
                prop_assert!(slack(&image[(0, 0)], p[0]) && slack(&image[(1, 0)], p[1]));
            }
        }
    }
}
