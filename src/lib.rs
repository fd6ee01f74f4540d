//! Feed-forward networks with factorized linear layers.
//!
//! `givens-nn` trains small feed-forward networks whose linear layers keep their weight
//! matrix `W = U·Σ·Vᵗ` in factorized form:
//!
//! - [`RotationLayer`]: `U` and `V` as chains of Givens (plane) rotations, one angle each.
//! - [`ReflectionLayer`]: `U` and `V` as chains of Householder reflections.
//! - [`DenseLayer`]: the plain matrix, used as a baseline.
//!
//! All three share the [`Layer`] contract and can be mixed freely in one [`Network`]
//! through the value-semantic [`AnyLayer`] wrapper. Gradients are taken directly with
//! respect to the angles, reflection vectors and singular values, so the orthogonal
//! factors stay orthogonal throughout training.
//!
//! # Panics vs `Result`
//!
//! This crate exposes two layers of API:
//!
//! - Low-level hot path (panics on misuse):
//!   - [`Layer::forward`], [`Layer::forward_on_train`], [`Layer::backward_calc_gradient`],
//!     [`Layer::update`]
//!   - [`Network::predict`], [`Network::train_one_unit`]
//!     Shape mismatches are treated as programmer error and will panic via `assert!`.
//!
//! - High-level convenience APIs (shape-checked):
//!   - [`Network::add_layer`], [`Network::fit`], [`Network::loss`], [`Network::accuracy`]
//!   - layer constructors, [`Dataset`] constructors, [`data::read_idx`]
//!     These validate inputs and return [`Result`].
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - A layer with `size_in` inputs and `size_out` outputs corresponds to a row-major
//!   `(size_out, size_in + 1)` matrix whose last column is the bias.
//! - Gradients are flat and use the same layout as the layer's parameter buffer.
//!
//! # Quick start
//!
//! ```rust
//! use givens_nn::{Activation, Dataset, LayerKind, Loss, NetworkBuilder};
//!
//! # fn main() -> givens_nn::Result<()> {
//! let xs: Vec<Vec<f64>> = (1..=8).map(|i| vec![i as f64, (9 - i) as f64]).collect();
//! let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![x[0] + x[1]]).collect();
//! let train = Dataset::from_rows(&xs, &ys)?;
//!
//! let mut net = NetworkBuilder::new(2)?
//!     .add_layer(LayerKind::Rotation, 1, Activation::Identity)?
//!     .build_with_seed(0)?;
//!
//! let report = net.fit(&train, Loss::Euclid, 200, 4, 0.005)?;
//! assert_eq!(report.epochs.len(), 200);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving training by hand
//!
//! ```rust
//! use givens_nn::{Activation, Layer, Loss, Network, RotationLayer};
//!
//! # fn main() -> givens_nn::Result<()> {
//! let layer = RotationLayer::from_weights(&[0.3, 0.2, 0.1], 2, 1)?;
//! let mut net = Network::new(layer, Activation::Identity)?;
//!
//! // One gradient per layer, last layer first.
//! let grads = net.train_one_unit(&[1.0, 2.0], &[3.0], Loss::Euclid);
//! if let Some(layer) = net.layer_mut(0) {
//!     layer.update(&grads[0], 0.01);
//! }
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod data;
pub mod decompose;
pub mod dense;
pub mod error;
pub mod layer;
pub mod loss;
pub(crate) mod matmul;
pub mod metrics;
pub mod network;
pub mod optim;
pub mod reflection;
pub mod rotation;
pub mod train;
pub mod vector;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use data::{Dataset, TrainUnit};
pub use decompose::{RotationFactors, decompose_to_reflections, decompose_to_rotations};
pub use dense::DenseLayer;
pub use error::{Error, Result};
pub use layer::{AnyLayer, CloneLayer, Init, Layer, LayerKind};
pub use loss::Loss;
pub use metrics::ClassificationReport;
pub use network::Network;
pub use optim::{Optimizer, OptimizerState};
pub use reflection::ReflectionLayer;
pub use rotation::RotationLayer;
pub use train::{EpochReport, FitConfig, FitReport, Shuffle};
