//! Feed-forward network over heterogeneous layers.
//!
//! A [`Network`] is an ordered list of `(layer, activation)` stages. Each stage maps
//! `y = activation(layer.forward(x))`. Training is plain backprop through the
//! layer contract in [`crate::layer`]: the network keeps every stage input and every
//! training-mode output, then walks the stages in reverse.

use crate::layer::check_chain;
use crate::{Activation, AnyLayer, Dataset, Error, Layer, Loss, Result, vector};

#[derive(Debug, Clone)]
struct Stage {
    layer: AnyLayer,
    activation: Activation,
}

#[derive(Debug, Clone)]
pub struct Network {
    size_in: usize,
    size_out: usize,
    stages: Vec<Stage>,
}

impl Network {
    /// Start a network from its first layer.
    pub fn new(layer: impl Into<AnyLayer>, activation: Activation) -> Result<Self> {
        activation.validate()?;
        let layer = layer.into();
        Ok(Self {
            size_in: layer.size_in(),
            size_out: layer.size_out(),
            stages: vec![Stage { layer, activation }],
        })
    }

    /// Append a layer.
    ///
    /// Returns [`Error::InvalidShape`] if `layer.size_in()` differs from the current
    /// output size. The network is left unchanged on error.
    pub fn add_layer(&mut self, layer: impl Into<AnyLayer>, activation: Activation) -> Result<()> {
        activation.validate()?;
        let layer = layer.into();
        check_chain(self.size_out, &layer, self.stages.len())?;
        self.size_out = layer.size_out();
        self.stages.push(Stage { layer, activation });
        Ok(())
    }

    /// Builder-style [`Network::add_layer`].
    pub fn with_layer(mut self, layer: impl Into<AnyLayer>, activation: Activation) -> Result<Self> {
        self.add_layer(layer, activation)?;
        Ok(self)
    }

    #[inline]
    pub fn size_in(&self) -> usize {
        self.size_in
    }

    #[inline]
    pub fn size_out(&self) -> usize {
        self.size_out
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.stages.len()
    }

    /// Total number of trainable scalars across all layers.
    pub fn num_parameters(&self) -> usize {
        self.stages.iter().map(|s| s.layer.num_parameters()).sum()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&AnyLayer> {
        self.stages.get(idx).map(|s| &s.layer)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut AnyLayer> {
        self.stages.get_mut(idx).map(|s| &mut s.layer)
    }

    #[inline]
    pub fn activation(&self, idx: usize) -> Option<Activation> {
        self.stages.get(idx).map(|s| s.activation)
    }

    /// Iterate over `(layer, activation)` pairs in forward order.
    pub fn stages(&self) -> impl ExactSizeIterator<Item = (&AnyLayer, Activation)> + '_ {
        self.stages.iter().map(|s| (&s.layer, s.activation))
    }

    /// Inference for a single sample.
    ///
    /// Panics if `x.len() != self.size_in()`.
    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.size_in,
            "input len {} does not match network size_in {}",
            x.len(),
            self.size_in
        );

        let mut out = x.to_vec();
        for stage in &self.stages {
            out = stage.activation.evaluate(&stage.layer.forward(&out));
        }
        out
    }

    /// Backprop one sample.
    ///
    /// Returns one flat gradient per layer, last layer first. Each gradient has the
    /// layout of that layer's parameter buffer.
    ///
    /// Panics on shape mismatch.
    pub fn train_one_unit(&self, x: &[f64], y: &[f64], loss: Loss) -> Vec<Vec<f64>> {
        assert_eq!(
            x.len(),
            self.size_in,
            "input len {} does not match network size_in {}",
            x.len(),
            self.size_in
        );
        assert_eq!(
            y.len(),
            self.size_out,
            "target len {} does not match network size_out {}",
            y.len(),
            self.size_out
        );

        let mut inputs = Vec::with_capacity(self.stages.len());
        let mut trains = Vec::with_capacity(self.stages.len());

        let mut out = x.to_vec();
        for stage in &self.stages {
            let train = stage.layer.forward_on_train(&out);
            let next = stage
                .activation
                .evaluate(&train[..stage.layer.size_out()]);
            inputs.push(std::mem::replace(&mut out, next));
            trains.push(train);
        }

        let mut u = loss.gradient(&out, y);
        let mut grads = Vec::with_capacity(self.stages.len());
        for (idx, stage) in self.stages.iter().enumerate().rev() {
            let size_out = stage.layer.size_out();
            let mut z = std::mem::take(&mut trains[idx]);

            u.resize(size_out, 0.0);
            let d = stage.activation.derivative(&z[..size_out]);
            vector::mul_assign(&mut u, &d);

            grads.push(stage.layer.backward_calc_gradient(&mut u, &inputs[idx], &mut z));
        }
        grads
    }

    /// Apply one descent step to layer `idx`.
    pub(crate) fn update_layer(&mut self, idx: usize, grad: &[f64], step: f64) {
        self.stages[idx].layer.update(grad, step);
    }

    /// Mean loss over `data`.
    pub fn loss(&self, data: &Dataset, loss: Loss) -> Result<f64> {
        self.check_dataset(data)?;
        let total: f64 = data
            .iter()
            .map(|(x, y)| loss.value(&self.predict(x), y))
            .sum();
        Ok(total / data.len() as f64)
    }

    /// Fraction of samples whose predicted argmax matches the target argmax.
    pub fn accuracy(&self, data: &Dataset) -> Result<f64> {
        self.check_dataset(data)?;
        let correct = data
            .iter()
            .filter(|(x, y)| {
                let pred = self.predict(x);
                vector::argmax(&pred) == vector::argmax(y)
            })
            .count();
        Ok(correct as f64 / data.len() as f64)
    }

    pub(crate) fn check_dataset(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidData("dataset must not be empty".to_owned()));
        }
        if data.input_dim() != self.size_in {
            return Err(Error::InvalidData(format!(
                "dataset input_dim {} does not match network size_in {}",
                data.input_dim(),
                self.size_in
            )));
        }
        if data.target_dim() != self.size_out {
            return Err(Error::InvalidData(format!(
                "dataset target_dim {} does not match network size_out {}",
                data.target_dim(),
                self.size_out
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DenseLayer, LayerKind, RotationLayer};

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{a} vs {b} (tol {tol})");
    }

    fn sum_network() -> Network {
        let first = RotationLayer::from_weights(&[0.3, 0.2, 0.1], 2, 1).unwrap();
        Network::new(first, Activation::Identity).unwrap()
    }

    #[test]
    fn add_layer_rejects_mismatched_size_in() {
        let mut net = sum_network();
        let bad = DenseLayer::new(vec![1.0; 6], 2, 2).unwrap();
        let err = net.add_layer(bad, Activation::Identity).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
        assert_eq!(net.num_layers(), 1);
        assert_eq!(net.size_out(), 1);
    }

    #[test]
    fn add_layer_tracks_running_output_size() {
        let mut net = sum_network();
        let next = DenseLayer::new(vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0], 1, 3).unwrap();
        net.add_layer(next, Activation::ReLU).unwrap();
        assert_eq!(net.size_in(), 2);
        assert_eq!(net.size_out(), 3);
        assert_eq!(net.layer(1).and_then(AnyLayer::kind), Some(LayerKind::Dense));
        assert_eq!(net.predict(&[1.0, 1.0]).len(), 3);
    }

    #[test]
    fn predict_matches_dense_recomposition() {
        let w = [0.5, -1.0, 0.25, 2.0, 1.5, -0.5];
        let rot = RotationLayer::from_weights(&w, 2, 2).unwrap();
        let dense = DenseLayer::new(w.to_vec(), 2, 2).unwrap();
        let a = Network::new(rot, Activation::Tanh).unwrap();
        let b = Network::new(dense, Activation::Tanh).unwrap();

        let x = [0.3, -0.7];
        let pa = a.predict(&x);
        let pb = b.predict(&x);
        for (p, q) in pa.iter().zip(&pb) {
            assert_close(*p, *q, 1e-8);
        }
    }

    #[test]
    fn train_one_unit_returns_last_layer_first() {
        let first = DenseLayer::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 2).unwrap();
        let second = RotationLayer::from_weights(&[0.4, 0.3, 0.2], 2, 1).unwrap();
        let net = Network::new(first, Activation::Tanh)
            .unwrap()
            .with_layer(second, Activation::Identity)
            .unwrap();

        let grads = net.train_one_unit(&[1.0, -1.0], &[0.5], Loss::Euclid);
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[0].len(), net.layer(1).unwrap().num_parameters());
        assert_eq!(grads[1].len(), net.layer(0).unwrap().num_parameters());
    }

    #[test]
    fn train_one_unit_matches_finite_differences_for_dense_stack() {
        let w0 = vec![0.1, -0.2, 0.3, 0.4, 0.5, -0.6];
        let w1 = vec![0.7, -0.3, 0.2];
        let build = |w0: &[f64], w1: &[f64]| {
            Network::new(DenseLayer::new(w0.to_vec(), 2, 2).unwrap(), Activation::Tanh)
                .unwrap()
                .with_layer(DenseLayer::new(w1.to_vec(), 2, 1).unwrap(), Activation::Identity)
                .unwrap()
        };

        let x = [0.6, -0.4];
        let y = [0.25];
        let grads = build(&w0, &w1).train_one_unit(&x, &y, Loss::Euclid);

        let eps = 1e-6;
        let value = |w0: &[f64], w1: &[f64]| Loss::Euclid.value(&build(w0, w1).predict(&x), &y);
        for i in 0..w0.len() {
            let mut hi = w0.clone();
            hi[i] += eps;
            let mut lo = w0.clone();
            lo[i] -= eps;
            let numeric = (value(&hi, &w1) - value(&lo, &w1)) / (2.0 * eps);
            assert_close(grads[1][i], numeric, 1e-6);
        }
        for i in 0..w1.len() {
            let mut hi = w1.clone();
            hi[i] += eps;
            let mut lo = w1.clone();
            lo[i] -= eps;
            let numeric = (value(&w0, &hi) - value(&w0, &lo)) / (2.0 * eps);
            assert_close(grads[0][i], numeric, 1e-6);
        }
    }

    #[test]
    fn rotation_stack_gradient_matches_finite_differences() {
        let first = RotationLayer::from_weights(&[0.3, 0.2, 0.1, -0.2, 0.4, 0.1, 0.5, 0.3, -0.1], 2, 3)
            .unwrap();
        let second = RotationLayer::from_weights(&[0.4, 0.3, 0.2, 0.1], 3, 1).unwrap();
        let net = Network::new(first, Activation::Tanh)
            .unwrap()
            .with_layer(second, Activation::Identity)
            .unwrap();

        let x = [0.8, -0.5];
        let y = [0.3];
        let grads = net.train_one_unit(&x, &y, Loss::Euclid);

        let eps = 1e-6;
        for (layer_idx, grad) in [(1, &grads[0]), (0, &grads[1])] {
            for (i, &g) in grad.iter().enumerate() {
                let mut one_hot = vec![0.0; grad.len()];
                one_hot[i] = 1.0;

                let mut hi = net.clone();
                hi.update_layer(layer_idx, &one_hot, -eps);
                let mut lo = net.clone();
                lo.update_layer(layer_idx, &one_hot, eps);

                let numeric = (Loss::Euclid.value(&hi.predict(&x), &y)
                    - Loss::Euclid.value(&lo.predict(&x), &y))
                    / (2.0 * eps);
                assert_close(g, numeric, 1e-5);
            }
        }
    }

    #[test]
    fn loss_and_accuracy_reject_empty_dataset() {
        let net = sum_network();
        let empty = Dataset::empty(2, 1).unwrap();
        assert!(matches!(net.loss(&empty, Loss::Euclid), Err(Error::InvalidData(_))));
        assert!(matches!(net.accuracy(&empty), Err(Error::InvalidData(_))));
    }

    #[test]
    fn accuracy_counts_argmax_matches() {
        let identity = DenseLayer::new(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 2, 2).unwrap();
        let net = Network::new(identity, Activation::Identity).unwrap();
        let data = Dataset::from_rows(
            &[vec![0.9, 0.1], vec![0.2, 0.8], vec![0.7, 0.3], vec![0.4, 0.6]],
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]],
        )
        .unwrap();
        assert_close(net.accuracy(&data).unwrap(), 0.5, 0.0);
    }

    #[test]
    fn loss_is_mean_over_samples() {
        let identity = DenseLayer::new(vec![1.0, 0.0], 1, 1).unwrap();
        let net = Network::new(identity, Activation::Identity).unwrap();
        let data = Dataset::from_rows(&[vec![1.0], vec![2.0]], &[vec![0.0], vec![0.0]]).unwrap();
        assert_close(net.loss(&data, Loss::Euclid).unwrap(), 2.5, 1e-12);
    }

    #[test]
    #[should_panic]
    fn predict_panics_on_wrong_input_len() {
        sum_network().predict(&[1.0]);
    }
}
