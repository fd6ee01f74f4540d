//! Activation functions.
//!
//! Every layer in a [`crate::Network`] is followed by an element-wise activation
//! `y = activation(z)`. The network keeps the pre-activation `z` of each layer for the
//! backward pass, so derivatives here are evaluated at `z`, not at `y`.

use crate::{Error, Result};

/// Negative-side slope used by [`Activation::leaky_relu`].
pub const DEFAULT_LEAKY_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Element-wise activation function.
pub enum Activation {
    Tanh,
    ReLU,
    LeakyReLU { alpha: f64 },
    Sigmoid,
    Identity,
}

impl Activation {
    /// Leaky ReLU with the default slope of `0.1`.
    pub const fn leaky_relu() -> Self {
        Activation::LeakyReLU {
            alpha: DEFAULT_LEAKY_ALPHA,
        }
    }

    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyReLU { alpha } => {
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "leaky ReLU alpha must be finite and >= 0, got {alpha}"
                    )));
                }
            }
            Activation::Tanh | Activation::ReLU | Activation::Sigmoid | Activation::Identity => {}
        }

        Ok(())
    }

    /// Apply the activation to every coordinate of `z`.
    pub fn evaluate(self, z: &[f64]) -> Vec<f64> {
        z.iter().map(|&v| self.apply(v)).collect()
    }

    /// Element-wise derivative, evaluated at the pre-activation `z`.
    pub fn derivative(self, z: &[f64]) -> Vec<f64> {
        z.iter().map(|&v| self.grad_at(v)).collect()
    }

    #[inline]
    pub(crate) fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::Sigmoid => sigmoid(x),
            Activation::Identity => x,
        }
    }

    #[inline]
    pub(crate) fn grad_at(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyReLU { alpha } => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Identity => 1.0,
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaky_relu_alpha_must_be_finite_and_non_negative() {
        assert!(
            Activation::LeakyReLU { alpha: f64::NAN }
                .validate()
                .is_err()
        );
        assert!(Activation::LeakyReLU { alpha: -0.1 }.validate().is_err());
        assert!(Activation::leaky_relu().validate().is_ok());
    }

    #[test]
    fn sigmoid_basic_values() {
        let y = Activation::Sigmoid.evaluate(&[0.0, 10.0, -10.0]);
        assert!((y[0] - 0.5).abs() < 1e-12);
        assert!(y[1] > 0.999);
        assert!(y[2] < 0.001);
    }

    #[test]
    fn relu_family_values_and_derivatives() {
        assert_eq!(Activation::ReLU.evaluate(&[-2.0, 3.0]), vec![0.0, 3.0]);
        assert_eq!(Activation::ReLU.derivative(&[-2.0, 3.0]), vec![0.0, 1.0]);

        let act = Activation::leaky_relu();
        assert_eq!(act.evaluate(&[-2.0, 3.0]), vec![-0.2, 3.0]);
        assert_eq!(act.derivative(&[-2.0, 3.0]), vec![0.1, 1.0]);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let eps = 1e-6;
        for act in [Activation::Tanh, Activation::Sigmoid, Activation::Identity] {
            for x in [-1.3, -0.2, 0.4, 2.0] {
                let numeric = (act.apply(x + eps) - act.apply(x - eps)) / (2.0 * eps);
                assert!((numeric - act.grad_at(x)).abs() < 1e-8, "{act:?} at {x}");
            }
        }
    }
}
