//! Optimizers.
//!
//! The training loop sums per-sample gradients over a batch and hands the sums to an
//! [`OptimizerState`], which turns them into one [`crate::Layer::update`] call per
//! layer.
//!
//! - `Sgd` calls `update(sum, step / batch_len)` directly.
//! - `SgdMomentum` keeps a velocity per parameter and steps along it with the same
//!   scaled step.
//! - `Adam` works on the batch mean and steps with `step`.
//!
//! Optimizer state lives outside the network and is reused across batches.

use crate::{Error, Layer, Network, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Optimizer choice for training.
pub enum Optimizer {
    /// Plain SGD.
    #[default]
    Sgd,
    /// SGD with momentum.
    SgdMomentum { momentum: f64 },
    /// Adam (bias-corrected).
    Adam { beta1: f64, beta2: f64, eps: f64 },
}

impl Optimizer {
    /// Validate optimizer hyperparameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Optimizer::Sgd => Ok(()),
            Optimizer::SgdMomentum { momentum } => check_unit_interval("momentum", momentum),
            Optimizer::Adam { beta1, beta2, eps } => {
                check_unit_interval("adam beta1", beta1)?;
                check_unit_interval("adam beta2", beta2)?;
                if !(eps.is_finite() && eps > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "adam eps must be finite and > 0, got {eps}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Allocate optimizer state for `net`.
    pub fn state(self, net: &Network) -> Result<OptimizerState> {
        self.validate()?;

        match self {
            Optimizer::Sgd => Ok(OptimizerState::Sgd),
            Optimizer::SgdMomentum { momentum } => Ok(OptimizerState::SgdMomentum {
                momentum,
                velocity: zeros_like_params(net),
            }),
            Optimizer::Adam { beta1, beta2, eps } => Ok(OptimizerState::Adam {
                beta1,
                beta2,
                eps,
                t: 0,
                beta1_pow: 1.0,
                beta2_pow: 1.0,
                m: zeros_like_params(net),
                v: zeros_like_params(net),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Owned optimizer state, one buffer per layer.
pub enum OptimizerState {
    /// Plain SGD (no state).
    #[default]
    Sgd,
    /// SGD with momentum state.
    SgdMomentum {
        momentum: f64,
        velocity: Vec<Vec<f64>>,
    },
    /// Adam state.
    Adam {
        beta1: f64,
        beta2: f64,
        eps: f64,
        t: u64,
        beta1_pow: f64,
        beta2_pow: f64,
        m: Vec<Vec<f64>>,
        v: Vec<Vec<f64>>,
    },
}

impl OptimizerState {
    /// Apply one optimizer step.
    ///
    /// `grads[i]` is the gradient of layer `i` summed over a batch of `batch_len`
    /// samples. It may be overwritten.
    pub fn step(&mut self, net: &mut Network, grads: &mut [Vec<f64>], step: f64, batch_len: usize) {
        assert!(step.is_finite() && step > 0.0, "step must be finite and > 0");
        assert!(batch_len > 0, "batch_len must be > 0");
        assert_eq!(
            grads.len(),
            net.num_layers(),
            "got {} gradients for {} layers",
            grads.len(),
            net.num_layers()
        );

        let scaled = step / batch_len as f64;
        match self {
            OptimizerState::Sgd => {
                for (idx, g) in grads.iter().enumerate() {
                    net.update_layer(idx, g, scaled);
                }
            }
            OptimizerState::SgdMomentum { momentum, velocity } => {
                debug_assert_eq!(velocity.len(), grads.len());
                for (idx, (vel, g)) in velocity.iter_mut().zip(grads.iter()).enumerate() {
                    debug_assert_eq!(vel.len(), g.len());
                    for (v, &gi) in vel.iter_mut().zip(g) {
                        *v = (*momentum) * *v + gi;
                    }
                    net.update_layer(idx, vel, scaled);
                }
            }
            OptimizerState::Adam {
                beta1,
                beta2,
                eps,
                t,
                beta1_pow,
                beta2_pow,
                m,
                v,
            } => {
                *t += 1;
                *beta1_pow *= *beta1;
                *beta2_pow *= *beta2;

                let one_minus_beta1 = 1.0 - *beta1;
                let one_minus_beta2 = 1.0 - *beta2;
                let corr1 = 1.0 - *beta1_pow;
                let corr2 = 1.0 - *beta2_pow;
                let inv_batch = 1.0 / batch_len as f64;

                // Overwrite `grads` with the Adam update direction, then step along it.
                for (idx, g) in grads.iter_mut().enumerate() {
                    let (ml, vl) = (&mut m[idx], &mut v[idx]);
                    debug_assert_eq!(ml.len(), g.len());
                    debug_assert_eq!(vl.len(), g.len());

                    for i in 0..g.len() {
                        let gi = g[i] * inv_batch;
                        ml[i] = (*beta1) * ml[i] + one_minus_beta1 * gi;
                        vl[i] = (*beta2) * vl[i] + one_minus_beta2 * (gi * gi);

                        let m_hat = ml[i] / corr1;
                        let v_hat = vl[i] / corr2;
                        g[i] = m_hat / (v_hat.sqrt() + *eps);
                    }
                    net.update_layer(idx, g, step);
                }
            }
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && (0.0..1.0).contains(&value)) {
        return Err(Error::InvalidConfig(format!(
            "{name} must be finite and in [0,1), got {value}"
        )));
    }
    Ok(())
}

fn zeros_like_params(net: &Network) -> Vec<Vec<f64>> {
    net.stages()
        .map(|(layer, _)| vec![0.0; layer.num_parameters()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, DenseLayer};

    fn single_weight_net() -> Network {
        // y = 1.0 * x + 2.0
        let layer = DenseLayer::new(vec![1.0, 2.0], 1, 1).unwrap();
        Network::new(layer, Activation::Identity).unwrap()
    }

    fn params(net: &Network) -> Vec<f64> {
        net.layer(0).unwrap().parameters().unwrap().to_vec()
    }

    #[test]
    fn optimizer_validation_rejects_bad_hyperparams() {
        assert!(Optimizer::SgdMomentum { momentum: 1.0 }.validate().is_err());
        assert!(
            Optimizer::SgdMomentum { momentum: -0.1 }
                .validate()
                .is_err()
        );
        assert!(
            Optimizer::Adam {
                beta1: 1.0,
                beta2: 0.999,
                eps: 1e-8
            }
            .validate()
            .is_err()
        );
        assert!(
            Optimizer::Adam {
                beta1: 0.9,
                beta2: 1.0,
                eps: 1e-8
            }
            .validate()
            .is_err()
        );
        assert!(
            Optimizer::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 0.0
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn sgd_scales_step_by_batch_len() {
        let mut net = single_weight_net();
        let mut opt = Optimizer::Sgd.state(&net).unwrap();
        let mut grads = vec![vec![3.0, 4.0]];
        opt.step(&mut net, &mut grads, 0.2, 2);

        let p = params(&net);
        assert!((p[0] - (1.0 - 0.1 * 3.0)).abs() < 1e-12);
        assert!((p[1] - (2.0 - 0.1 * 4.0)).abs() < 1e-12);
    }

    #[test]
    fn sgd_momentum_updates_like_sgd_on_first_step() {
        let mut net = single_weight_net();
        let mut opt = Optimizer::SgdMomentum { momentum: 0.9 }
            .state(&net)
            .unwrap();
        let mut grads = vec![vec![3.0, 4.0]];
        opt.step(&mut net, &mut grads, 0.1, 1);

        let p = params(&net);
        assert!((p[0] - (1.0 - 0.1 * 3.0)).abs() < 1e-12);
        assert!((p[1] - (2.0 - 0.1 * 4.0)).abs() < 1e-12);

        // Second step moves along 0.9 * v + g.
        let mut grads = vec![vec![1.0, 0.0]];
        opt.step(&mut net, &mut grads, 0.1, 1);
        let p2 = params(&net);
        assert!((p2[0] - (p[0] - 0.1 * (0.9 * 3.0 + 1.0))).abs() < 1e-12);
        assert!((p2[1] - (p[1] - 0.1 * (0.9 * 4.0))).abs() < 1e-12);
    }

    #[test]
    fn adam_first_step_matches_expected_direction_for_unit_grad() {
        let mut net = single_weight_net();
        let mut opt = Optimizer::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1.0,
        }
        .state(&net)
        .unwrap();

        // Batch of two unit gradients: the mean is 1.
        let mut grads = vec![vec![2.0, 2.0]];
        opt.step(&mut net, &mut grads, 0.1, 2);

        // With eps=1.0 and unit mean grad, the first bias-corrected step is 1/(1+eps) = 0.5.
        let p = params(&net);
        assert!((p[0] - (1.0 - 0.1 * 0.5)).abs() < 1e-12);
        assert!((p[1] - (2.0 - 0.1 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn validation_errors_name_the_hyperparameter() {
        let bad = Optimizer::Adam {
            beta1: 0.9,
            beta2: f64::NAN,
            eps: 1e-8,
        };
        match bad.validate() {
            Err(Error::InvalidConfig(msg)) => assert!(msg.starts_with("adam beta2"), "{msg}"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
        assert!(Optimizer::SgdMomentum { momentum: 0.0 }.validate().is_ok());
    }

    #[test]
    fn state_buffers_follow_layer_parameter_counts() {
        let net = single_weight_net();
        let optimizer = Optimizer::SgdMomentum { momentum: 0.5 };
        match optimizer.state(&net).unwrap() {
            OptimizerState::SgdMomentum { velocity, .. } => {
                assert_eq!(velocity.len(), 1);
                assert_eq!(velocity[0].len(), net.layer(0).unwrap().num_parameters());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
