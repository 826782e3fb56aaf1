use crate::error::{check_dim, EnclosureError, Result};
use crate::matrix_algorithms::krawczyk_inverse;
use crate::policy::SetPolicy;
use crate::traits::Scalar;
use crate::vectalg::{
    contains_zero, hull_weights, identity, intersection, matrix_weights, split, to_column,
    to_vector, vector_weights,
};
use nalgebra::{DMatrix, DVector};

/// Which derivative a layer carries. Decides how the policy weights the error basis and
/// names the layer in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Values, `n x 1`.
    C0,
    /// First derivatives, `n x n`.
    C1,
    /// Second derivatives, `n x n(n+1)/2`.
    C2,
    /// One jet coefficient, `n x 1`.
    Jet,
}

impl LayerKind {
    pub(crate) fn weights<S: Scalar>(self, v: &DMatrix<S>) -> Vec<f64> {
        match self {
            LayerKind::C0 | LayerKind::Jet => vector_weights(v),
            LayerKind::C1 => matrix_weights(v),
            LayerKind::C2 => hull_weights(v),
        }
    }

    pub(crate) fn move_context(self) -> &'static str {
        match self {
            LayerKind::C0 => "C0 move: two enclosures of the set are disjoint",
            LayerKind::C1 => "C1 move: two enclosures of the Jacobian are disjoint",
            LayerKind::C2 => "C2 move: two enclosures of the Hessian are disjoint",
            LayerKind::Jet => "Cn move: two enclosures of a jet coefficient are disjoint",
        }
    }
}

/// One doubleton `x + C·r0 + B·r` together with an independent enclosure `current`.
///
/// `x`, `r0`, `r` and `current` share the shape `n x k`; `C`, `B` and `inv_b` are
/// `n x n`. Vector data uses `k = 1`, Jacobians `k = n` and Hessians
/// `k = n(n+1)/2`. `x` is thin and `r0`, `r` contain zero. `C` and `B` start thin
/// but may widen by a few ulps after orthonormalization or a fold.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubletonLayer<S: Scalar> {
    pub(crate) kind: LayerKind,
    pub(crate) x: DMatrix<S>,
    pub(crate) c: DMatrix<S>,
    pub(crate) r0: DMatrix<S>,
    pub(crate) b: DMatrix<S>,
    pub(crate) inv_b: DMatrix<S>,
    pub(crate) r: DMatrix<S>,
    pub(crate) current: DMatrix<S>,
}

/// Output of [`move_layer_with`]: the new layer and the error term folded into its `r`.
#[derive(Debug, Clone)]
pub(crate) struct LayerImage<S: Scalar> {
    pub layer: DoubletonLayer<S>,
    pub y_err: DMatrix<S>,
}

impl<S: Scalar> DoubletonLayer<S> {
    /// Builds a centered layer from `x + C·r0 + B·r`.
    ///
    /// Midpoints of `r0` and `r` are moved into `x`, then the width of `x` is moved into
    /// `r` through `B⁻¹`. Fails when `B` cannot be inverted.
    pub fn new(
        kind: LayerKind,
        x: DMatrix<S>,
        c: DMatrix<S>,
        r0: DMatrix<S>,
        b: DMatrix<S>,
        r: DMatrix<S>,
    ) -> Result<Self> {
        let dim = x.nrows();
        check_dim("DoubletonLayer::new (C)", dim, c.nrows())?;
        check_dim("DoubletonLayer::new (B)", dim, b.nrows())?;
        check_dim("DoubletonLayer::new (r0)", c.ncols(), r0.nrows())?;
        check_dim("DoubletonLayer::new (r)", b.ncols(), r.nrows())?;
        check_dim("DoubletonLayer::new (r0 columns)", x.ncols(), r0.ncols())?;
        check_dim("DoubletonLayer::new (r columns)", x.ncols(), r.ncols())?;

        let current = &x + &c * &r0 + &b * &r;
        let inv_b = krawczyk_inverse(&b)?;
        let mut x = x;
        let mut r0 = r0;
        let mut r = r;
        if !contains_zero(&r0) {
            let (m, rem) = split(&r0);
            x += &c * &m;
            r0 = rem;
        }
        if !contains_zero(&r) {
            let (m, rem) = split(&r);
            x += &b * &m;
            r = rem;
        }
        let (x, x_rem) = split(&x);
        r += &inv_b * &x_rem;

        Ok(Self {
            kind,
            x,
            c,
            r0,
            b,
            inv_b,
            r,
            current,
        })
    }

    /// Box `x` stored as `mid(x) + Id·(x - mid(x))`.
    pub fn from_box(kind: LayerKind, x: &DMatrix<S>) -> Self {
        let dim = x.nrows();
        let (center, r0) = split(x);
        Self {
            kind,
            x: center,
            c: identity(dim),
            r0,
            b: identity(dim),
            inv_b: identity(dim),
            r: DMatrix::zeros(dim, x.ncols()),
            current: x.clone(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn dimension(&self) -> usize {
        self.x.nrows()
    }

    pub fn x(&self) -> &DMatrix<S> {
        &self.x
    }

    pub fn c(&self) -> &DMatrix<S> {
        &self.c
    }

    pub fn r0(&self) -> &DMatrix<S> {
        &self.r0
    }

    pub fn b(&self) -> &DMatrix<S> {
        &self.b
    }

    pub fn inv_b(&self) -> &DMatrix<S> {
        &self.inv_b
    }

    pub fn r(&self) -> &DMatrix<S> {
        &self.r
    }

    /// Enclosure carried alongside the representation.
    pub fn current(&self) -> &DMatrix<S> {
        &self.current
    }

    /// Interval evaluation of `x + C·r0 + B·r`.
    pub fn evaluate(&self) -> DMatrix<S> {
        &self.x + &self.c * &self.r0 + &self.b * &self.r
    }

    pub fn is_centered(&self) -> bool {
        contains_zero(&self.r0) && contains_zero(&self.r)
    }

    /// Enclosure of `gradient · (X - x0)` for a vector layer.
    pub fn eval_affine_functional(&self, gradient: &DVector<S>, x0: &DVector<S>) -> Result<S> {
        let dim = self.dimension();
        check_dim("eval_affine_functional (gradient)", dim, gradient.len())?;
        check_dim("eval_affine_functional (x0)", dim, x0.len())?;
        let gc = gradient.transpose() * &self.c;
        let gb = gradient.transpose() * &self.b;
        let mut value = S::zero();
        for i in 0..dim {
            value += gradient[i] * (self.x[(i, 0)] - x0[i]);
            value += gb[(0, i)] * self.r[(i, 0)];
            value += gc[(0, i)] * self.r0[(i, 0)];
        }
        let mut by_hull = S::zero();
        for i in 0..dim {
            by_hull += gradient[i] * (self.current[(i, 0)] - x0[i]);
        }
        value
            .intersection(&by_hull)
            .ok_or_else(|| EnclosureError::empty("eval_affine_functional"))
    }

    /// Enclosure of `M·(X - c)` for a vector layer.
    pub fn affine_transformation(&self, m: &DMatrix<S>, c: &DVector<S>) -> Result<DVector<S>> {
        check_dim("affine_transformation", self.dimension(), m.ncols())?;
        check_dim("affine_transformation", self.dimension(), c.len())?;
        let shift = to_column(c);
        let by_representation =
            m * (&self.x - &shift) + (m * &self.c) * &self.r0 + (m * &self.b) * &self.r;
        let by_hull = m * (&self.current - &shift);
        let result = intersection(&by_representation, &by_hull, "affine_transformation")?;
        Ok(to_vector(&result))
    }
}

/// Moves a layer through the linear part `a`.
///
/// `center` is the image of `x`, `bound` a first enclosure of the image of the whole
/// layer. `error_image` receives `a·B` and returns an enclosure of `a·B·r`; doubletons
/// evaluate it directly, tripletons intersect it with their second error basis.
pub(crate) fn move_layer_with<S, P, F>(
    layer: &DoubletonLayer<S>,
    center: &DMatrix<S>,
    a: &DMatrix<S>,
    bound: &DMatrix<S>,
    policy: &P,
    error_image: F,
) -> Result<LayerImage<S>>
where
    S: Scalar,
    P: SetPolicy,
    F: FnOnce(&DMatrix<S>) -> Result<DMatrix<S>>,
{
    let dim = layer.dimension();
    check_dim("layer move (linear part)", dim, a.ncols())?;
    check_dim("layer move (linear part)", dim, a.nrows())?;
    check_dim("layer move (center)", layer.x.ncols(), center.ncols())?;
    check_dim("layer move (bound)", layer.x.ncols(), bound.ncols())?;

    let c_image = a * &layer.c;
    let b_image = a * &layer.b;
    let second = center + &c_image * &layer.r0 + error_image(&b_image)?;
    let current = intersection(bound, &second, layer.kind.move_context())?;

    let (c, delta_c) = split(&c_image);
    let (x, mut y_err) = split(center);
    y_err += &delta_c * &layer.r0;

    let weights = layer.kind.weights(&(&layer.r + &y_err));
    let (b, inv_b) = policy.compute_b_inv_b(&b_image, &weights);
    let r = (&inv_b * &b_image) * &layer.r + &inv_b * &y_err;

    Ok(LayerImage {
        layer: DoubletonLayer {
            kind: layer.kind,
            x,
            c,
            r0: layer.r0.clone(),
            b,
            inv_b,
            r,
            current,
        },
        y_err,
    })
}

pub(crate) fn move_layer<S: Scalar, P: SetPolicy>(
    layer: &DoubletonLayer<S>,
    center: &DMatrix<S>,
    a: &DMatrix<S>,
    bound: &DMatrix<S>,
    policy: &P,
) -> Result<DoubletonLayer<S>> {
    let image = move_layer_with(layer, center, a, bound, policy, |b_image| {
        Ok(b_image * &layer.r)
    })?;
    Ok(image.layer)
}

/// Moves a layer through `X -> a·X + offset`.
pub(crate) fn move_affine_layer<S: Scalar, P: SetPolicy>(
    layer: &DoubletonLayer<S>,
    a: &DMatrix<S>,
    offset: &DMatrix<S>,
    policy: &P,
) -> Result<DoubletonLayer<S>> {
    check_dim("layer move (offset rows)", layer.dimension(), offset.nrows())?;
    check_dim("layer move (offset columns)", layer.x.ncols(), offset.ncols())?;
    check_dim("layer move (linear part)", layer.dimension(), a.ncols())?;
    let center = a * &layer.x + offset;
    let bound = a * &layer.current + offset;
    move_layer(layer, &center, a, &bound, policy)
}
