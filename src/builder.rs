//! Network builder.
//!
//! `NetworkBuilder` is the recommended way to get a randomly initialized network.
//!
//! It makes the structure explicit (layer kind, output size and activation per layer)
//! and chooses a reasonable default initializer for each activation:
//!
//! - `tanh` / `sigmoid` / `identity`: Xavier/Glorot
//! - `relu` / `leaky relu`: He/Kaiming
//!
//! Rotation and reflection layers are seeded by decomposing a dense draw from that
//! initializer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, AnyLayer, Error, Init, LayerKind, Network, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    kind: LayerKind,
    size_out: usize,
    activation: Activation,
}

#[derive(Debug, Clone)]
/// Builder for a [`Network`].
///
/// Example:
///
/// ```rust
/// use givens_nn::{Activation, LayerKind, NetworkBuilder};
///
/// # fn main() -> givens_nn::Result<()> {
/// let net = NetworkBuilder::new(2)?
///     .add_layer(LayerKind::Rotation, 8, Activation::ReLU)?
///     .add_layer(LayerKind::Reflection, 1, Activation::Sigmoid)?
///     .build_with_seed(0)?;
/// assert_eq!(net.size_out(), 1);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    size_in: usize,
    layers: Vec<LayerSpec>,
}

impl NetworkBuilder {
    /// Start building a network that accepts inputs of length `size_in`.
    pub fn new(size_in: usize) -> Result<Self> {
        if size_in == 0 {
            return Err(Error::InvalidConfig("size_in must be > 0".to_owned()));
        }
        Ok(Self {
            size_in,
            layers: Vec::new(),
        })
    }

    /// Convenience constructor from a sizes list + activations, all of one kind.
    ///
    /// `sizes` includes input and output dimensions, so its length must be at least 2.
    /// `activations` must have length `sizes.len() - 1`.
    pub fn from_sizes(kind: LayerKind, sizes: &[usize], activations: &[Activation]) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output dims".to_owned(),
            ));
        }
        if activations.len() != sizes.len() - 1 {
            return Err(Error::InvalidConfig(format!(
                "activations length {} does not match sizes.len() - 1 ({})",
                activations.len(),
                sizes.len() - 1
            )));
        }

        let mut b = Self::new(sizes[0])?;
        for (&size_out, &act) in sizes[1..].iter().zip(activations) {
            b = b.add_layer(kind, size_out, act)?;
        }
        Ok(b)
    }

    /// Add a layer with `size_out` outputs followed by `activation`.
    pub fn add_layer(mut self, kind: LayerKind, size_out: usize, activation: Activation) -> Result<Self> {
        if size_out == 0 {
            return Err(Error::InvalidConfig("layer size_out must be > 0".to_owned()));
        }
        activation.validate()?;

        self.layers.push(LayerSpec {
            kind,
            size_out,
            activation,
        });
        Ok(self)
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        let mut specs = self.layers.into_iter();
        let Some(first) = specs.next() else {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        };

        let mut net = Network::new(build_layer(first, self.size_in, 0, rng)?, first.activation)?;
        for (idx, spec) in specs.enumerate() {
            let layer = build_layer(spec, net.size_out(), idx + 1, rng)?;
            net.add_layer(layer, spec.activation)?;
        }
        Ok(net)
    }
}

fn build_layer<R: Rng + ?Sized>(
    spec: LayerSpec,
    size_in: usize,
    idx: usize,
    rng: &mut R,
) -> Result<AnyLayer> {
    let init = default_init_for_activation(spec.activation);
    tracing::debug!(
        layer = idx,
        kind = %spec.kind,
        size_in,
        size_out = spec.size_out,
        ?init,
        "building layer"
    );
    AnyLayer::random(spec.kind, size_in, spec.size_out, init, rng)
}

#[inline]
fn default_init_for_activation(act: Activation) -> Init {
    match act {
        Activation::Tanh | Activation::Sigmoid | Activation::Identity => Init::Xavier,
        Activation::ReLU | Activation::LeakyReLU { .. } => Init::He,
    }
}
