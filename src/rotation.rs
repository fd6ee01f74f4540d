//! Rotation-factorized linear layer.
//!
//! The layer stores `W = U(alpha) · diag(sigma) · Vᵗ(beta)` for a map from `n - 1` inputs
//! (plus a constant bias slot) to `m` outputs. `U` and `V` are never materialized: they
//! are chains of plane rotations whose angles live in one contiguous parameter buffer
//! laid out as `[alpha, sigma, beta]`.
//!
//! With `k = min(n, m)`:
//!
//! - `alpha` has one angle per sub-diagonal entry eliminated from the `(m, k)` factor,
//! - `beta` the same for the `(n, k)` factor,
//! - `sigma` has `k` entries and is not constrained in sign or order.

use std::ops::Range;

use rand::Rng;

use crate::decompose::{decompose_to_rotations, rotation_count, rotation_rows};
use crate::vector::{axpy_neg, plane_rotate, row_reverse_rotate};
use crate::{Error, Init, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RotationLayer {
    /// Input size including the bias slot.
    n: usize,
    m: usize,
    k: usize,
    params: Vec<f64>,
    alpha: Range<usize>,
    sigma: Range<usize>,
    beta: Range<usize>,
    alpha_rows: Vec<usize>,
    beta_rows: Vec<usize>,
}

impl RotationLayer {
    /// Build the layer from a dense row-major `(size_out, size_in + 1)` matrix whose last
    /// column is the bias.
    pub fn from_weights(weights: &[f64], size_in: usize, size_out: usize) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let f = decompose_to_rotations(weights, size_out, size_in + 1)?;
        Self::from_parts(size_in, size_out, f.alpha, f.sigma, f.beta)
    }

    /// Build the layer from explicit angles and singular values.
    pub fn from_parts(
        size_in: usize,
        size_out: usize,
        alpha: Vec<f64>,
        sigma: Vec<f64>,
        beta: Vec<f64>,
    ) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let n = size_in + 1;
        let m = size_out;
        let k = n.min(m);

        let expected = [
            ("alpha", alpha.len(), rotation_count(m, k)),
            ("sigma", sigma.len(), k),
            ("beta", beta.len(), rotation_count(n, k)),
        ];
        for (name, got, want) in expected {
            if got != want {
                return Err(Error::InvalidShape(format!(
                    "{name} length {got} does not match expected {want} for {size_in}->{size_out}"
                )));
            }
        }

        let mut params = Vec::with_capacity(alpha.len() + sigma.len() + beta.len());
        params.extend(alpha);
        params.extend(sigma);
        params.extend(beta);
        if params.iter().any(|p| !p.is_finite()) {
            return Err(Error::InvalidData(
                "rotation parameters must be finite".to_owned(),
            ));
        }

        let a = rotation_count(m, k);
        Ok(Self {
            n,
            m,
            k,
            alpha: 0..a,
            sigma: a..a + k,
            beta: a + k..params.len(),
            params,
            alpha_rows: rotation_rows(m, k),
            beta_rows: rotation_rows(n, k),
        })
    }

    /// Build the layer from a flat `[alpha, sigma, beta]` buffer, as returned by
    /// [`RotationLayer::parameters`].
    pub fn from_params(size_in: usize, size_out: usize, mut params: Vec<f64>) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let n = size_in + 1;
        let k = n.min(size_out);
        let a = rotation_count(size_out, k);
        let expected = a + k + rotation_count(n, k);
        if params.len() != expected {
            return Err(Error::InvalidShape(format!(
                "parameter length {} does not match expected {expected} for {size_in}->{size_out}",
                params.len()
            )));
        }

        let beta = params.split_off(a + k);
        let sigma = params.split_off(a);
        Self::from_parts(size_in, size_out, params, sigma, beta)
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

    /// Flat `[alpha, sigma, beta]` buffer.
    #[inline]
    pub fn parameters(&self) -> &[f64] {
        &self.params
    }

    #[inline]
    pub fn alpha(&self) -> &[f64] {
        &self.params[self.alpha.clone()]
    }

    #[inline]
    pub fn sigma(&self) -> &[f64] {
        &self.params[self.sigma.clone()]
    }

    #[inline]
    pub fn beta(&self) -> &[f64] {
        &self.params[self.beta.clone()]
    }

    /// Length of the vector returned by [`Self::forward_on_train`].
    #[inline]
    pub fn train_len(&self) -> usize {
        self.m + self.n - self.k
    }

    /// `U · diag(sigma) · Vᵗ · [x; 1]`.
    ///
    /// Panics if `x.len() != size_in()`.
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.transform(self.with_bias(x), self.m)
    }

    /// Same transform as [`Self::forward`] but keeps `m + n - k` coordinates so that the
    /// coordinates dropped at inference stay available to the backward pass.
    ///
    /// The first `size_out()` entries equal the inference output.
    pub fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
        self.transform(self.with_bias(x), self.train_len())
    }

    /// Gradient of the loss w.r.t. the parameter buffer.
    ///
    /// - `u`: upstream gradient w.r.t. the output, length `size_out()`.
    /// - `z`: the vector returned by [`Self::forward_on_train`] for this sample.
    ///
    /// Both buffers are consumed as scratch: on return `u` holds the gradient w.r.t.
    /// `[x; 1]` and `z` holds `[x; 1]` (both of length `size_in() + 1`).
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
        let alpha = self.alpha();
        let sigma = self.sigma();
        let beta = self.beta();

        let (g_alpha, rest) = grad.split_at_mut(self.alpha.len());
        let (g_sigma, g_beta) = rest.split_at_mut(self.k);

        for ((g, &theta), &row) in g_alpha.iter_mut().zip(alpha).zip(&self.alpha_rows) {
            *g = z[row] * u[row - 1] - z[row - 1] * u[row];
            plane_rotate(theta, row, u);
            plane_rotate(theta, row, z);
        }

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

        for ((g, &theta), &row) in g_beta
            .iter_mut()
            .zip(beta)
            .zip(&self.beta_rows)
            .rev()
        {
            *g = z[row - 1] * u[row] - z[row] * u[row - 1];
            row_reverse_rotate(theta, row, u);
            row_reverse_rotate(theta, row, z);
        }

        grad
    }

    /// `params -= step * grad`.
    pub fn update(&mut self, grad: &[f64], step: f64) {
        assert_eq!(
            grad.len(),
            self.params.len(),
            "gradient len {} does not match parameter count {}",
            grad.len(),
            self.params.len()
        );
        axpy_neg(&mut self.params, step, grad);
    }

    /// Recompose the dense row-major `(size_out, size_in + 1)` matrix.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.m * self.n];
        for j in 0..self.n {
            let mut e = vec![0.0; self.n];
            e[j] = 1.0;
            let col = self.transform(e, self.m);
            for (i, v) in col.into_iter().enumerate() {
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
        self.rotate_input(&mut t);
        t
    }

    fn rotate_input(&self, t: &mut [f64]) {
        for (&theta, &row) in self.beta().iter().zip(&self.beta_rows) {
            plane_rotate(theta, row, t);
        }
    }

    fn transform(&self, mut t: Vec<f64>, out_len: usize) -> Vec<f64> {
        self.rotate_input(&mut t);
        t.resize(out_len, 0.0);
        for (ti, s) in t.iter_mut().zip(self.sigma()) {
            *ti *= s;
        }
        for (&theta, &row) in self.alpha().iter().zip(&self.alpha_rows).rev() {
            row_reverse_rotate(theta, row, &mut t);
        }
        t
    }
}

/// A layer may have no inputs (bias only) but must have outputs.
pub(crate) fn check_sizes(size_in: usize, size_out: usize) -> Result<()> {
    if size_out == 0 {
        return Err(Error::InvalidShape(format!(
            "layer size_out must be > 0, got size_in={size_in} size_out={size_out}"
        )));
    }
    Ok(())
}
