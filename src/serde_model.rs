//! Model serialization/deserialization (feature: `serde`).
//!
//! This module defines a versioned on-disk format for [`Network`].
//!
//! Design notes:
//! - Layers are stored by kind together with their flat parameter buffer, so a
//!   factorized layer round-trips without a decompose/recompose pass.
//! - All deserialization validates shapes, parameter counts, finiteness and that
//!   consecutive layers chain.
//! - Custom layers have no stable representation and are rejected on save.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    Activation, AnyLayer, DenseLayer, Error, Layer, LayerKind, Network, ReflectionLayer, Result,
    RotationLayer,
};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    pub layers: Vec<SerializedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub kind: SerializedLayerKind,
    pub size_in: usize,
    pub size_out: usize,
    pub activation: SerializedActivation,
    /// Flat parameter buffer in the layer's own layout.
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedLayerKind {
    Rotation,
    Reflection,
    Dense,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedActivation {
    Tanh,
    Relu,
    LeakyRelu { alpha: f64 },
    Sigmoid,
    Identity,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Tanh => SerializedActivation::Tanh,
            Activation::ReLU => SerializedActivation::Relu,
            Activation::LeakyReLU { alpha } => SerializedActivation::LeakyRelu { alpha },
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::Identity => SerializedActivation::Identity,
        }
    }
}

impl SerializedActivation {
    fn into_activation(self) -> Activation {
        match self {
            SerializedActivation::Tanh => Activation::Tanh,
            SerializedActivation::Relu => Activation::ReLU,
            SerializedActivation::LeakyRelu { alpha } => Activation::LeakyReLU { alpha },
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Identity => Activation::Identity,
        }
    }
}

impl From<LayerKind> for SerializedLayerKind {
    fn from(value: LayerKind) -> Self {
        match value {
            LayerKind::Rotation => SerializedLayerKind::Rotation,
            LayerKind::Reflection => SerializedLayerKind::Reflection,
            LayerKind::Dense => SerializedLayerKind::Dense,
        }
    }
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.layers.is_empty() {
            return Err(Error::InvalidData(
                "serialized model must have at least one layer".to_owned(),
            ));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            layer.validate()?;

            if i > 0 {
                let prev_out = self.layers[i - 1].size_out;
                if layer.size_in != prev_out {
                    return Err(Error::InvalidData(format!(
                        "layer {i} size_in {} does not match previous size_out {}",
                        layer.size_in, prev_out
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SerializedLayer {
    fn validate(&self) -> Result<()> {
        if self.size_out == 0 {
            return Err(Error::InvalidData(format!(
                "layer size_out must be > 0, got size_in={} size_out={}",
                self.size_in, self.size_out
            )));
        }

        let act = self.activation.into_activation();
        act.validate()
            .map_err(|e| Error::InvalidData(format!("invalid activation: {e}")))?;

        if self.params.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "params must contain only finite values".to_owned(),
            ));
        }

        Ok(())
    }

    // Layer constructors check the parameter count for their kind.
    fn into_layer(self) -> Result<(AnyLayer, Activation)> {
        let act = self.activation.into_activation();
        let layer: AnyLayer = match self.kind {
            SerializedLayerKind::Rotation => {
                RotationLayer::from_params(self.size_in, self.size_out, self.params)?.into()
            }
            SerializedLayerKind::Reflection => {
                ReflectionLayer::from_parts(self.size_in, self.size_out, self.params)?.into()
            }
            SerializedLayerKind::Dense => {
                DenseLayer::new(self.params, self.size_in, self.size_out)?.into()
            }
        };
        Ok((layer, act))
    }
}

impl TryFrom<&Network> for SerializedNetwork {
    type Error = Error;

    fn try_from(net: &Network) -> std::result::Result<Self, Self::Error> {
        let mut layers = Vec::with_capacity(net.num_layers());
        for (i, (layer, act)) in net.stages().enumerate() {
            let (Some(kind), Some(params)) = (layer.kind(), layer.parameters()) else {
                return Err(Error::InvalidData(format!(
                    "layer {i} is a custom layer and cannot be serialized"
                )));
            };
            layers.push(SerializedLayer {
                kind: kind.into(),
                size_in: layer.size_in(),
                size_out: layer.size_out(),
                activation: act.into(),
                params: params.to_vec(),
            });
        }
        Ok(Self {
            format_version: MODEL_FORMAT_VERSION,
            layers,
        })
    }
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let mut layers = value.layers.into_iter().enumerate().map(|(i, layer)| {
            layer
                .into_layer()
                .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))
        });

        // `validate` guarantees at least one layer.
        let Some(first) = layers.next() else {
            return Err(Error::InvalidData(
                "serialized model must have at least one layer".to_owned(),
            ));
        };
        let (layer, act) = first?;
        let mut net = Network::new(layer, act)?;
        for next in layers {
            let (layer, act) = next?;
            net.add_layer(layer, act)?;
        }
        Ok(net)
    }
}

impl Network {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedNetwork::try_from(self)?;
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Serialize the network to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let ser = SerializedNetwork::try_from(self)?;
        serde_json::to_string(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a network from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::Io(format!("failed to write {}: {e}", p.display())))?;
        Ok(())
    }

    /// Load a network from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::Io(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}
