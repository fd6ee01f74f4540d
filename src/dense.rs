//! Dense linear layer.
//!
//! The plain `W · [x; 1]` baseline the factorized layers are checked against.

use rand::Rng;

use crate::matmul::gemv_f64;
use crate::rotation::check_sizes;
use crate::vector::axpy_neg;
use crate::{Error, Init, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    /// Input size including the bias slot.
    n: usize,
    m: usize,
    /// Row-major `(m, n)`, bias in the last column.
    weights: Vec<f64>,
}

impl DenseLayer {
    pub fn new(weights: Vec<f64>, size_in: usize, size_out: usize) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        let n = size_in + 1;
        if weights.len() != size_out * n {
            return Err(Error::InvalidShape(format!(
                "weights length {} does not match size_out * (size_in + 1) ({size_out} * {n})",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }
        Ok(Self {
            n,
            m: size_out,
            weights,
        })
    }

    pub fn random<R: Rng + ?Sized>(
        size_in: usize,
        size_out: usize,
        init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        check_sizes(size_in, size_out)?;
        Self::new(init.dense_weights(size_in, size_out, rng), size_in, size_out)
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
        self.weights.len()
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn train_len(&self) -> usize {
        self.m
    }

    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.n - 1,
            "input len {} does not match size_in {}",
            x.len(),
            self.n - 1
        );
        let mut xb = Vec::with_capacity(self.n);
        xb.extend_from_slice(x);
        xb.push(1.0);

        let mut y = vec![0.0; self.m];
        gemv_f64(self.m, self.n, 1.0, &self.weights, false, &xb, 0.0, &mut y);
        y
    }

    /// Dense layers keep nothing beyond the output.
    #[inline]
    pub fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
        self.forward(x)
    }

    /// Outer-product gradient `grad[i, j] = u[i] * [x; 1][j]`.
    ///
    /// On return `u` holds `Wᵗ u` (the gradient w.r.t. `[x; 1]`) and `z` holds `[x; 1]`.
    pub fn backward_calc_gradient(&self, u: &mut Vec<f64>, x: &[f64], z: &mut Vec<f64>) -> Vec<f64> {
        assert_eq!(
            u.len(),
            self.m,
            "gradient len {} does not match size_out {}",
            u.len(),
            self.m
        );
        assert_eq!(
            x.len(),
            self.n - 1,
            "input len {} does not match size_in {}",
            x.len(),
            self.n - 1
        );

        z.clear();
        z.extend_from_slice(x);
        z.push(1.0);

        let mut grad = vec![0.0; self.weights.len()];
        for (row, &ui) in grad.chunks_exact_mut(self.n).zip(u.iter()) {
            for (g, &xj) in row.iter_mut().zip(z.iter()) {
                *g = ui * xj;
            }
        }

        let mut d_input = vec![0.0; self.n];
        gemv_f64(self.m, self.n, 1.0, &self.weights, true, u, 0.0, &mut d_input);
        *u = d_input;

        grad
    }

    pub fn update(&mut self, grad: &[f64], step: f64) {
        assert_eq!(
            grad.len(),
            self.weights.len(),
            "gradient len {} does not match parameter count {}",
            grad.len(),
            self.weights.len()
        );
        axpy_neg(&mut self.weights, step, grad);
    }

    #[inline]
    pub fn to_dense(&self) -> Vec<f64> {
        self.weights.clone()
    }
}
