//! Reflection-factorized linear layer.
//!
//! Same decomposition as [`crate::rotation::RotationLayer`], `W = U · diag(sigma) · Vᵗ`, but
//! each orthogonal factor is a product of Householder reflections `I - 2 c cᵗ`. All
//! reflection vectors and `sigma` share one buffer; [`ReflectionLayout`] maps each
//! piece to an index range.
//!
//! After every [`ReflectionLayer::update`] each reflection vector is renormalized to unit
//! length and every singular value is squashed towards 1 with
//! `sigma <- 2 * SIGMA_SQUASH * (sigmoid(sigma) - 0.5) + 1`.

use rand::Rng;

use crate::decompose::{ReflectionLayout, decompose_to_reflections, reflection_param_count};
use crate::rotation::check_sizes;
use crate::vector::{axpy_neg, dot, normalize, reflect};
use crate::{Error, Init, Result};

/// Half-width of the band singular values are squashed into after an update.
pub const SIGMA_SQUASH: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionLayer {
    /// Input size including the bias slot.
    n: usize,
    m: usize,
    k: usize,
    params: Vec<f64>,
    layout: ReflectionLayout,
}

impl ReflectionLayer {
    /// Build the layer from a dense row-major `(size_out, size_in + 1)` matrix whose last
    /// column is the bias.
    pub fn from_weights(weights: &[f64], size_in: usize, size_out: usize) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let params = decompose_to_reflections(weights, size_out, size_in + 1)?;
        Self::from_parts(size_in, size_out, params)
    }

    /// Build the layer from a flat `[u_0, .., u_{k-1}, sigma, v_0, .., v_{k-1}]` buffer.
    ///
    /// Reflection vectors are normalized on construction; a zero vector is rejected.
    pub fn from_parts(size_in: usize, size_out: usize, mut params: Vec<f64>) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let n = size_in + 1;
        let m = size_out;
        let expected = reflection_param_count(m, n);
        if params.len() != expected {
            return Err(Error::InvalidShape(format!(
                "reflection parameter length {} does not match expected {expected} for {size_in}->{size_out}",
                params.len()
            )));
        }
        if params.iter().any(|p| !p.is_finite()) {
            return Err(Error::InvalidData(
                "reflection parameters must be finite".to_owned(),
            ));
        }

        let layout = ReflectionLayout::new(m, n);
        for r in layout.u.iter().chain(&layout.v) {
            let c = &mut params[r.clone()];
            if c.iter().all(|x| *x == 0.0) {
                return Err(Error::InvalidData(
                    "reflection vectors must be non-zero".to_owned(),
                ));
            }
            normalize(c);
        }

        Ok(Self {
            n,
            m,
            k: n.min(m),
            params,
            layout,
        })
    }

    /// Draw a dense matrix with `init` and decompose it.
    pub fn random<R: Rng + ?Sized>(
        size_in: usize,
        size_out: usize,
        init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let weights = init.dense_weights(size_in, size_out, rng);
        Self::from_weights(&weights, size_in, size_out)
    }

    #[inline]
    pub fn size_in(&self) -> usize {
        self.n - 1
    }

    #[inline]
    pub fn size_out(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    #[inline]
    pub fn layout(&self) -> &ReflectionLayout {
        &self.layout
    }

    /// Output-side reflection vector `c` (length `size_out() - c`).
    pub fn u(&self, c: usize) -> &[f64] {
        &self.params[self.layout.u[c].clone()]
    }

    /// Input-side reflection vector `c` (length `size_in() + 1 - c`).
    pub fn v(&self, c: usize) -> &[f64] {
        &self.params[self.layout.v[c].clone()]
    }

    pub fn sigma(&self) -> &[f64] {
        &self.params[self.layout.sigma.clone()]
    }

    #[inline]
    pub fn train_len(&self) -> usize {
        self.m + self.n - self.k
    }

    /// Panics if `x.len() != size_in()`.
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.transform(self.with_bias(x), self.m)
    }

    /// Forward pass keeping `m + n - k` coordinates for the backward pass.
    pub fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
        self.transform(self.with_bias(x), self.train_len())
    }

    /// Gradient w.r.t. the parameter buffer, in the same layout as [`Self::parameters`].
    ///
    /// `u` (upstream gradient, length `size_out()`) and `z` (output of
    /// [`Self::forward_on_train`]) are consumed as scratch. On return `u` holds the gradient
    /// w.r.t. `[x; 1]` and `z` holds `[x; 1]`.
    ///
    /// For a reflection vector `c` the per-coordinate term is
    /// `u_j z_j - 2 (u_j (c·z) + (c·u) z_j + 2 (c·z)(c·u) c_j)`.
    pub fn backward_calc_gradient(&self, u: &mut Vec<f64>, x: &[f64], z: &mut Vec<f64>) -> Vec<f64> {
        assert_eq!(
            u.len(),
            self.m,
            "gradient len {} does not match size_out {}",
            u.len(),
            self.m
        );
        assert_eq!(
            z.len(),
            self.train_len(),
            "train output len {} does not match expected {}",
            z.len(),
            self.train_len()
        );
        debug_assert_eq!(x.len(), self.n - 1);

        let mut grad = vec![0.0; self.params.len()];

        for c in 0..self.k {
            let r = self.layout.u[c].clone();
            self.reflection_step(r, c, u, z, &mut grad);
        }

        let sigma = self.sigma();
        let g_sigma = &mut grad[self.layout.sigma.clone()];
        // A zero singular value erases its coordinate, so rebuild `Vᵗ [x; 1]` from `x`.
        if sigma.iter().any(|s| !s.is_normal()) {
            *z = self.input_side(x);
            for i in 0..self.k {
                g_sigma[i] = u[i] * z[i];
                u[i] *= sigma[i];
            }
        } else {
            for i in 0..self.k {
                z[i] /= sigma[i];
                g_sigma[i] = u[i] * z[i];
                u[i] *= sigma[i];
            }
            z.resize(self.n, 0.0);
        }

        u.resize(self.n, 0.0);

        for c in (0..self.k).rev() {
            let r = self.layout.v[c].clone();
            self.reflection_step(r, c, u, z, &mut grad);
        }

        grad
    }

    /// Undo one reflection on `z`, record its gradient and pass `u` through it.
    fn reflection_step(
        &self,
        r: std::ops::Range<usize>,
        offset: usize,
        u: &mut [f64],
        z: &mut [f64],
        grad: &mut [f64],
    ) {
        let c = &self.params[r.clone()];
        reflect(c, z, offset);

        let uw = &u[offset..offset + c.len()];
        let zw = &z[offset..offset + c.len()];
        let cu = dot(c, uw);
        let cz = dot(c, zw);
        for (((g, &ci), &uj), &zj) in grad[r].iter_mut().zip(c).zip(uw).zip(zw) {
            *g = uj * zj - 2.0 * (uj * cz + cu * zj + cz * cu * 2.0 * ci);
        }

        reflect(c, u, offset);
    }

    /// Gradient step followed by reflection renormalization and sigma squashing.
    pub fn update(&mut self, grad: &[f64], step: f64) {
        assert_eq!(
            grad.len(),
            self.params.len(),
            "gradient len {} does not match parameter count {}",
            grad.len(),
            self.params.len()
        );
        axpy_neg(&mut self.params, step, grad);

        for r in self.layout.u.iter().chain(&self.layout.v) {
            let c = &mut self.params[r.clone()];
            if c.iter().all(|x| *x == 0.0) {
                // A cancelled vector restarts as the first axis of its window.
                c[0] = 1.0;
            }
            normalize(c);
        }
        for s in &mut self.params[self.layout.sigma.clone()] {
            *s = 2.0 * SIGMA_SQUASH * (sigmoid(*s) - 0.5) + 1.0;
        }
    }

    /// Recompose the dense row-major `(size_out, size_in + 1)` matrix.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.m * self.n];
        for j in 0..self.n {
            let mut e = vec![0.0; self.n];
            e[j] = 1.0;
            for (i, v) in self.transform(e, self.m).into_iter().enumerate() {
                dense[i * self.n + j] = v;
            }
        }
        dense
    }

    fn with_bias(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.n - 1,
            "input len {} does not match size_in {}",
            x.len(),
            self.n - 1
        );
        let mut t = Vec::with_capacity(self.n.max(self.m) + 1);
        t.extend_from_slice(x);
        t.push(1.0);
        t
    }

    /// `Vᵗ [x; 1]`, the state just before scaling by `sigma`.
    fn input_side(&self, x: &[f64]) -> Vec<f64> {
        let mut t = self.with_bias(x);
        self.reflect_input(&mut t);
        t
    }

    fn reflect_input(&self, t: &mut [f64]) {
        for c in 0..self.k {
            reflect(self.v(c), t, c);
        }
    }

    fn transform(&self, mut t: Vec<f64>, out_len: usize) -> Vec<f64> {
        self.reflect_input(&mut t);
        t.resize(out_len, 0.0);
        for (ti, s) in t.iter_mut().zip(self.sigma()) {
            *ti *= s;
        }
        for c in (0..self.k).rev() {
            reflect(self.u(c), &mut t, c);
        }
        t
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
