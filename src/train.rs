//! Mini-batch training loop.
//!
//! Each epoch walks the dataset in contiguous batches (the last one may be shorter).
//! Per-sample gradients from [`Network::train_one_unit`] are summed over the batch and
//! each layer is updated once, with the step scaled by `1 / batch_len`.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::optim::OptimizerState;
use crate::{Dataset, Error, Layer, Loss, Network, Optimizer, Result, vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Sample order within an epoch.
pub enum Shuffle {
    /// Dataset order.
    #[default]
    None,
    /// A fresh permutation every epoch, drawn from a generator seeded once per `fit`.
    Seeded(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub step: f64,
    pub loss: Loss,
    pub optimizer: Optimizer,
    pub shuffle: Shuffle,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 1,
            step: 1e-2,
            loss: Loss::Euclid,
            optimizer: Optimizer::Sgd,
            shuffle: Shuffle::None,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        check_batch(self.batch_size, self.step)?;
        self.optimizer.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Summary of one training epoch.
pub struct EpochReport {
    pub epoch: usize,
    /// Per layer (forward order): sum over batches of `‖batch gradient‖²`.
    pub grad_sq_norms: Vec<f64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
    /// Mean training loss after the last epoch.
    pub final_loss: f64,
}

impl Network {
    /// Train with plain SGD over contiguous batches.
    pub fn fit(
        &mut self,
        train: &Dataset,
        loss: Loss,
        epochs: usize,
        batch_size: usize,
        step: f64,
    ) -> Result<FitReport> {
        self.fit_with(
            train,
            &FitConfig {
                epochs,
                batch_size,
                step,
                loss,
                ..FitConfig::default()
            },
        )
    }

    /// Train with an explicit configuration.
    pub fn fit_with(&mut self, train: &Dataset, cfg: &FitConfig) -> Result<FitReport> {
        cfg.validate()?;
        self.check_dataset(train)?;

        let mut opt = cfg.optimizer.state(self)?;
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut rng = match cfg.shuffle {
            Shuffle::None => None,
            Shuffle::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
        };

        let mut epochs = Vec::with_capacity(cfg.epochs);
        for epoch in 0..cfg.epochs {
            if let Some(rng) = rng.as_mut() {
                order.shuffle(rng);
            }
            let report = self.run_epoch(train, &order, cfg, &mut opt, epoch);
            tracing::debug!(
                epoch,
                grad_sq_norms = ?report.grad_sq_norms,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "epoch finished"
            );
            epochs.push(report);
        }

        let final_loss = self.loss(train, cfg.loss)?;
        tracing::info!(epochs = cfg.epochs, final_loss, "fit finished");
        Ok(FitReport { epochs, final_loss })
    }

    /// One SGD epoch in dataset order.
    pub fn train_one_epoch(
        &mut self,
        train: &Dataset,
        loss: Loss,
        batch_size: usize,
        step: f64,
    ) -> Result<EpochReport> {
        check_batch(batch_size, step)?;
        self.check_dataset(train)?;

        let cfg = FitConfig {
            epochs: 1,
            batch_size,
            step,
            loss,
            ..FitConfig::default()
        };
        let order: Vec<usize> = (0..train.len()).collect();
        let mut opt = OptimizerState::Sgd;
        Ok(self.run_epoch(train, &order, &cfg, &mut opt, 0))
    }

    fn run_epoch(
        &mut self,
        train: &Dataset,
        order: &[usize],
        cfg: &FitConfig,
        opt: &mut OptimizerState,
        epoch: usize,
    ) -> EpochReport {
        let start = Instant::now();
        let mut grad_sq_norms = vec![0.0; self.num_layers()];

        for batch in order.chunks(cfg.batch_size) {
            let mut sums: Vec<Vec<f64>> = self
                .stages()
                .map(|(layer, _)| vec![0.0; layer.num_parameters()])
                .collect();

            for &idx in batch {
                let grads = self.train_one_unit(train.input(idx), train.target(idx), cfg.loss);
                // `grads` is last-layer-first.
                for (sum, g) in sums.iter_mut().rev().zip(&grads) {
                    vector::add_assign(sum, g);
                }
            }

            for (acc, sum) in grad_sq_norms.iter_mut().zip(&sums) {
                *acc += vector::squared_norm(sum);
            }
            opt.step(self, &mut sums, cfg.step, batch.len());
        }

        EpochReport {
            epoch,
            grad_sq_norms,
            elapsed: start.elapsed(),
        }
    }
}

fn check_batch(batch_size: usize, step: f64) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "step must be finite and > 0, got {step}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, DenseLayer, RotationLayer};

    fn echo_data() -> Dataset {
        let xs: Vec<Vec<f64>> = (1..=8).map(|i| vec![i as f64]).collect();
        Dataset::from_rows(&xs, &xs).unwrap()
    }

    fn echo_net() -> Network {
        let layer = RotationLayer::from_weights(&[0.5, 0.2], 1, 1).unwrap();
        Network::new(layer, Activation::leaky_relu()).unwrap()
    }

    #[test]
    fn fit_validates_config() {
        let data = echo_data();
        let mut net = echo_net();
        assert!(matches!(
            net.fit(&data, Loss::Euclid, 1, 0, 0.1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            net.fit(&data, Loss::Euclid, 0, 1, 0.1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            net.fit(&data, Loss::Euclid, 1, 1, f64::NAN),
            Err(Error::InvalidConfig(_))
        ));
        assert!(net.train_one_epoch(&data, Loss::Euclid, 0, 0.1).is_err());
    }

    #[test]
    fn fit_rejects_mismatched_dataset() {
        let data = Dataset::from_rows(&[vec![1.0, 2.0]], &[vec![3.0]]).unwrap();
        let mut net = echo_net();
        assert!(matches!(
            net.fit(&data, Loss::Euclid, 1, 1, 0.1),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn fit_reports_every_epoch() {
        let data = echo_data();
        let mut net = echo_net();
        let report = net.fit(&data, Loss::Euclid, 3, 3, 0.01).unwrap();
        assert_eq!(report.epochs.len(), 3);
        for (i, e) in report.epochs.iter().enumerate() {
            assert_eq!(e.epoch, i);
            assert_eq!(e.grad_sq_norms.len(), 1);
            assert!(e.grad_sq_norms[0] > 0.0);
        }
        let direct = net.loss(&data, Loss::Euclid).unwrap();
        assert!((report.final_loss - direct).abs() < 1e-12);
    }

    #[test]
    fn batch_update_uses_summed_gradient_and_scaled_step() {
        let data = Dataset::from_rows(&[vec![1.0], vec![2.0], vec![3.0]], &[vec![0.0], vec![1.0], vec![1.0]])
            .unwrap();
        let layer = DenseLayer::new(vec![0.5, 0.1], 1, 1).unwrap();
        let mut net = Network::new(layer, Activation::Identity).unwrap();

        // Expected: first batch of two, then a batch of one.
        let mut expected = net.clone();
        for batch in [&[0usize, 1][..], &[2][..]] {
            let mut sum = vec![0.0; 2];
            for &i in batch {
                let g = expected.train_one_unit(data.input(i), data.target(i), Loss::Euclid);
                vector::add_assign(&mut sum, &g[0]);
            }
            expected.update_layer(0, &sum, 0.1 / batch.len() as f64);
        }

        net.train_one_epoch(&data, Loss::Euclid, 2, 0.1).unwrap();
        let a = net.layer(0).unwrap().parameters().unwrap();
        let b = expected.layer(0).unwrap().parameters().unwrap();
        for (p, q) in a.iter().zip(b) {
            assert!((p - q).abs() < 1e-12, "{p} vs {q}");
        }
    }

    #[test]
    fn seeded_shuffle_is_deterministic() {
        let data = echo_data();
        let cfg = FitConfig {
            epochs: 3,
            batch_size: 2,
            step: 0.01,
            shuffle: Shuffle::Seeded(7),
            ..FitConfig::default()
        };

        let mut a = echo_net();
        let mut b = echo_net();
        a.fit_with(&data, &cfg).unwrap();
        b.fit_with(&data, &cfg).unwrap();
        assert_eq!(
            a.layer(0).unwrap().parameters(),
            b.layer(0).unwrap().parameters()
        );
    }

    #[test]
    fn echo_loss_decreases() {
        let data = echo_data();
        let mut net = echo_net();
        let before = net.loss(&data, Loss::Euclid).unwrap();
        let report = net.fit(&data, Loss::Euclid, 100, 1, 0.02).unwrap();
        assert!(report.final_loss < before);
        assert!(report.final_loss < 1e-3, "final loss {}", report.final_loss);
    }

    #[test]
    fn momentum_and_adam_also_train() {
        let data = echo_data();
        for optimizer in [
            Optimizer::SgdMomentum { momentum: 0.5 },
            Optimizer::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
        ] {
            let mut net = echo_net();
            let before = net.loss(&data, Loss::Euclid).unwrap();
            let cfg = FitConfig {
                epochs: 50,
                batch_size: 4,
                step: 0.01,
                optimizer,
                ..FitConfig::default()
            };
            let report = net.fit_with(&data, &cfg).unwrap();
            assert!(report.final_loss < before, "{optimizer:?}");
        }
    }
}
