//! The linear layer contract and its value-semantic wrapper.
//!
//! Every layer maps `size_in()` inputs to `size_out()` outputs through an affine
//! transform with an implicit bias slot, and supports:
//!
//! - `forward(x)`: inference output, length `size_out()`.
//! - `forward_on_train(x)`: training output. Its first `size_out()` entries equal the
//!   inference output; the rest are whatever the layer needs to rebuild its input.
//! - `backward_calc_gradient(u, x, z)`: flat gradient w.r.t. the layer parameters.
//!   `u` and `z` are consumed as scratch: afterwards `u` is the gradient w.r.t. the
//!   biased input `[x; 1]` and `z` equals `[x; 1]`.
//! - `update(grad, step)`: one descent step.
//!
//! [`AnyLayer`] lets a [`crate::Network`] hold heterogeneous layers in one `Vec` while
//! cloning and moving like a plain value.

use std::fmt;

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::dense::DenseLayer;
use crate::reflection::ReflectionLayer;
use crate::rotation::RotationLayer;
use crate::{Error, Result};

pub trait Layer: fmt::Debug {
    fn size_in(&self) -> usize;
    fn size_out(&self) -> usize;
    fn num_parameters(&self) -> usize;
    fn forward(&self, x: &[f64]) -> Vec<f64>;
    fn forward_on_train(&self, x: &[f64]) -> Vec<f64>;
    fn backward_calc_gradient(&self, u: &mut Vec<f64>, x: &[f64], z: &mut Vec<f64>) -> Vec<f64>;
    fn update(&mut self, grad: &[f64], step: f64);
}

macro_rules! forward_layer_impl {
    ($ty:ty) => {
        impl Layer for $ty {
            #[inline]
            fn size_in(&self) -> usize {
                <$ty>::size_in(self)
            }
            #[inline]
            fn size_out(&self) -> usize {
                <$ty>::size_out(self)
            }
            #[inline]
            fn num_parameters(&self) -> usize {
                <$ty>::num_parameters(self)
            }
            #[inline]
            fn forward(&self, x: &[f64]) -> Vec<f64> {
                <$ty>::forward(self, x)
            }
            #[inline]
            fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
                <$ty>::forward_on_train(self, x)
            }
            #[inline]
            fn backward_calc_gradient(
                &self,
                u: &mut Vec<f64>,
                x: &[f64],
                z: &mut Vec<f64>,
            ) -> Vec<f64> {
                <$ty>::backward_calc_gradient(self, u, x, z)
            }
            #[inline]
            fn update(&mut self, grad: &[f64], step: f64) {
                <$ty>::update(self, grad, step)
            }
        }
    };
}

forward_layer_impl!(RotationLayer);
forward_layer_impl!(ReflectionLayer);
forward_layer_impl!(DenseLayer);

/// Object-safe clone support for user-provided layers.
pub trait CloneLayer: Layer {
    fn clone_box(&self) -> Box<dyn CloneLayer>;
}

impl<T> CloneLayer for T
where
    T: Layer + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneLayer> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn CloneLayer> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Built-in layer representations.
pub enum LayerKind {
    Rotation,
    Reflection,
    Dense,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Rotation => f.write_str("rotation"),
            LayerKind::Reflection => f.write_str("reflection"),
            LayerKind::Dense => f.write_str("dense"),
        }
    }
}

#[derive(Debug, Clone)]
/// A layer of any kind, with value semantics.
pub enum AnyLayer {
    Rotation(RotationLayer),
    Reflection(ReflectionLayer),
    Dense(DenseLayer),
    /// Any other type implementing [`Layer`].
    Custom(Box<dyn CloneLayer>),
}

impl AnyLayer {
    /// Wrap a user-defined layer.
    pub fn custom<L: Layer + Clone + 'static>(layer: L) -> Self {
        AnyLayer::Custom(Box::new(layer))
    }

    /// Randomly initialized layer of the given kind.
    pub fn random<R: Rng + ?Sized>(
        kind: LayerKind,
        size_in: usize,
        size_out: usize,
        init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(match kind {
            LayerKind::Rotation => RotationLayer::random(size_in, size_out, init, rng)?.into(),
            LayerKind::Reflection => ReflectionLayer::random(size_in, size_out, init, rng)?.into(),
            LayerKind::Dense => DenseLayer::random(size_in, size_out, init, rng)?.into(),
        })
    }

    /// Build a layer of the given kind from a dense `(size_out, size_in + 1)` matrix.
    pub fn from_weights(
        kind: LayerKind,
        weights: &[f64],
        size_in: usize,
        size_out: usize,
    ) -> Result<Self> {
        Ok(match kind {
            LayerKind::Rotation => RotationLayer::from_weights(weights, size_in, size_out)?.into(),
            LayerKind::Reflection => {
                ReflectionLayer::from_weights(weights, size_in, size_out)?.into()
            }
            LayerKind::Dense => DenseLayer::new(weights.to_vec(), size_in, size_out)?.into(),
        })
    }

    /// `None` for custom layers.
    pub fn kind(&self) -> Option<LayerKind> {
        match self {
            AnyLayer::Rotation(_) => Some(LayerKind::Rotation),
            AnyLayer::Reflection(_) => Some(LayerKind::Reflection),
            AnyLayer::Dense(_) => Some(LayerKind::Dense),
            AnyLayer::Custom(_) => None,
        }
    }

    /// Flat parameter buffer of a built-in layer.
    pub fn parameters(&self) -> Option<&[f64]> {
        match self {
            AnyLayer::Rotation(l) => Some(l.parameters()),
            AnyLayer::Reflection(l) => Some(l.parameters()),
            AnyLayer::Dense(l) => Some(l.weights()),
            AnyLayer::Custom(_) => None,
        }
    }

    /// Dense `(size_out, size_in + 1)` matrix of a built-in layer.
    pub fn to_dense(&self) -> Option<Vec<f64>> {
        match self {
            AnyLayer::Rotation(l) => Some(l.to_dense()),
            AnyLayer::Reflection(l) => Some(l.to_dense()),
            AnyLayer::Dense(l) => Some(l.to_dense()),
            AnyLayer::Custom(_) => None,
        }
    }

    #[inline]
    fn inner(&self) -> &dyn Layer {
        match self {
            AnyLayer::Rotation(l) => l,
            AnyLayer::Reflection(l) => l,
            AnyLayer::Dense(l) => l,
            AnyLayer::Custom(l) => &**l,
        }
    }

    #[inline]
    fn inner_mut(&mut self) -> &mut dyn Layer {
        match self {
            AnyLayer::Rotation(l) => l,
            AnyLayer::Reflection(l) => l,
            AnyLayer::Dense(l) => l,
            AnyLayer::Custom(l) => &mut **l,
        }
    }
}

impl Layer for AnyLayer {
    #[inline]
    fn size_in(&self) -> usize {
        self.inner().size_in()
    }

    #[inline]
    fn size_out(&self) -> usize {
        self.inner().size_out()
    }

    #[inline]
    fn num_parameters(&self) -> usize {
        self.inner().num_parameters()
    }

    #[inline]
    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.inner().forward(x)
    }

    #[inline]
    fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
        self.inner().forward_on_train(x)
    }

    #[inline]
    fn backward_calc_gradient(&self, u: &mut Vec<f64>, x: &[f64], z: &mut Vec<f64>) -> Vec<f64> {
        self.inner().backward_calc_gradient(u, x, z)
    }

    #[inline]
    fn update(&mut self, grad: &[f64], step: f64) {
        self.inner_mut().update(grad, step)
    }
}

impl From<RotationLayer> for AnyLayer {
    fn from(value: RotationLayer) -> Self {
        AnyLayer::Rotation(value)
    }
}

impl From<ReflectionLayer> for AnyLayer {
    fn from(value: ReflectionLayer) -> Self {
        AnyLayer::Reflection(value)
    }
}

impl From<DenseLayer> for AnyLayer {
    fn from(value: DenseLayer) -> Self {
        AnyLayer::Dense(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Uniform initializers for a dense `(size_out, size_in + 1)` draw.
///
/// Weights and the bias column are sampled from `U(-limit, limit)`, so a fresh expanding
/// layer keeps full rank.
pub enum Init {
    /// `limit = sqrt(6 / (fan_in + fan_out))`.
    Xavier,
    /// `limit = sqrt(6 / fan_in)`.
    He,
}

impl Init {
    #[inline]
    pub fn limit(self, size_in: usize, size_out: usize) -> f64 {
        let fan_in = size_in.max(1);
        match self {
            Init::Xavier => (6.0 / (fan_in + size_out) as f64).sqrt(),
            Init::He => (6.0 / fan_in as f64).sqrt(),
        }
    }

    /// Row-major `(size_out, size_in + 1)` weights, bias column included.
    ///
    /// Panics if `size_out` is zero.
    pub fn dense_weights<R: Rng + ?Sized>(
        self,
        size_in: usize,
        size_out: usize,
        rng: &mut R,
    ) -> Vec<f64> {
        assert!(size_out > 0, "layer size_out must be > 0");
        let limit = self.limit(size_in, size_out);
        let dist = Uniform::new_inclusive(-limit, limit);
        (0..size_out * (size_in + 1))
            .map(|_| dist.sample(rng))
            .collect()
    }
}

/// Shape check shared by `Network::add_layer` and model loading.
pub(crate) fn check_chain(prev_out: usize, layer: &dyn Layer, idx: usize) -> Result<()> {
    if layer.size_in() != prev_out {
        return Err(Error::InvalidShape(format!(
            "layer {idx} size_in {} does not match previous size_out {prev_out}",
            layer.size_in()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[derive(Debug, Clone)]
    struct Doubler;

    impl Layer for Doubler {
        fn size_in(&self) -> usize {
            2
        }
        fn size_out(&self) -> usize {
            2
        }
        fn num_parameters(&self) -> usize {
            0
        }
        fn forward(&self, x: &[f64]) -> Vec<f64> {
            x.iter().map(|v| 2.0 * v).collect()
        }
        fn forward_on_train(&self, x: &[f64]) -> Vec<f64> {
            self.forward(x)
        }
        fn backward_calc_gradient(
            &self,
            u: &mut Vec<f64>,
            x: &[f64],
            z: &mut Vec<f64>,
        ) -> Vec<f64> {
            for v in u.iter_mut() {
                *v *= 2.0;
            }
            u.push(0.0);
            *z = x.to_vec();
            z.push(1.0);
            Vec::new()
        }
        fn update(&mut self, _grad: &[f64], _step: f64) {}
    }

    #[test]
    fn facade_forwards_every_call() {
        let w = [1.0, 2.0, 3.0, 4.0];
        for kind in [LayerKind::Rotation, LayerKind::Reflection, LayerKind::Dense] {
            let layer = AnyLayer::from_weights(kind, &w, 1, 2).unwrap();
            assert_eq!(layer.kind(), Some(kind));
            assert_eq!(layer.size_in(), 1);
            assert_eq!(layer.size_out(), 2);
            let y = layer.forward(&[1.0]);
            assert!((y[0] - 3.0).abs() < 1e-9 && (y[1] - 7.0).abs() < 1e-9, "{kind}: {y:?}");
            assert_eq!(layer.parameters().unwrap().len(), layer.num_parameters());
        }
    }

    #[test]
    fn facade_has_value_semantics() {
        let original: AnyLayer = DenseLayer::new(vec![1.0, 0.0], 1, 1).unwrap().into();
        let mut copy = original.clone();
        copy.update(&[1.0, 1.0], 1.0);

        assert_eq!(original.forward(&[2.0]), vec![2.0]);
        assert_eq!(copy.forward(&[2.0]), vec![-1.0]);
    }

    #[test]
    fn custom_layers_are_cloned_and_dispatched() {
        let layer = AnyLayer::custom(Doubler);
        let copy = layer.clone();
        assert_eq!(copy.kind(), None);
        assert_eq!(copy.forward(&[1.0, -2.0]), vec![2.0, -4.0]);

        let mut u = vec![1.0, 1.0];
        let mut z = copy.forward_on_train(&[1.0, -2.0]);
        copy.backward_calc_gradient(&mut u, &[1.0, -2.0], &mut z);
        assert_eq!(u, vec![2.0, 2.0, 0.0]);
        assert_eq!(z, vec![1.0, -2.0, 1.0]);
    }

    #[test]
    fn init_respects_limits_and_draws_bias() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = Init::He.dense_weights(3, 4, &mut rng);
        assert_eq!(w.len(), 16);
        let limit = Init::He.limit(3, 4);
        assert!(w.iter().all(|v| v.abs() <= limit));
        assert!(w.chunks_exact(4).all(|row| row[3] != 0.0));
        assert!(Init::Xavier.limit(3, 4) < limit);
    }
}
