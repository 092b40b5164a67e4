//! Feed-forward network of fully connected layers, stored as JSON.
//!
//! ```json
//! {"layers": [{"weights": [[..], ..], "bias": [..], "activation": "relu"}, ..]}
//! ```
//!
//! `weights` is `[inputs][outputs]`, the layout dense-layer kernels are
//! exported in.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::EmotionClassifier;
use crate::error::InferenceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(&self, values: &mut Array2<f32>) {
        match self {
            Self::Linear => {}
            Self::Relu => values.mapv_inplace(|v| v.max(0.0)),
            Self::Sigmoid => values.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Self::Tanh => values.mapv_inplace(f32::tanh),
            Self::Softmax => {
                for mut row in values.rows_mut() {
                    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    if sum > 0.0 {
                        row.mapv_inplace(|v| v / sum);
                    }
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    #[serde(default = "default_activation")]
    activation: Activation,
}

fn default_activation() -> Activation {
    Activation::Linear
}

#[derive(Deserialize)]
struct NetworkFile {
    layers: Vec<LayerFile>,
}

#[derive(Clone, Debug)]
pub struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(
        weights: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self, InferenceError> {
        if weights.ncols() != bias.len() {
            return Err(InferenceError::InvalidModel(format!(
                "layer has {} outputs but {} biases",
                weights.ncols(),
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let mut output = input.dot(&self.weights) + &self.bias.view().insert_axis(Axis(0));
        self.activation.apply(&mut output);
        output
    }
}

#[derive(Clone, Debug)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, InferenceError> {
        if layers.is_empty() {
            return Err(InferenceError::InvalidModel("network has no layers".to_string()));
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(InferenceError::InvalidModel(format!(
                    "layer {index} emits {} values but layer {} takes {}",
                    pair[0].outputs(),
                    index + 1,
                    pair[1].inputs()
                )));
            }
        }
        Ok(Self { layers })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| InferenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let network = Self::from_json(&contents)?;
        debug!(
            layers = network.layers.len(),
            inputs = network.input_len(),
            classes = network.output_len(),
            "loaded dense network"
        );
        Ok(network)
    }

    pub fn from_json(contents: &str) -> Result<Self, InferenceError> {
        let file: NetworkFile =
            serde_json::from_str(contents).map_err(|err| InferenceError::Parse(err.to_string()))?;
        let layers = file
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, layer)| {
                let rows = layer.weights.len();
                let cols = layer.weights.first().map(Vec::len).unwrap_or(0);
                if rows == 0 || cols == 0 || layer.weights.iter().any(|row| row.len() != cols) {
                    return Err(InferenceError::InvalidModel(format!(
                        "layer {index} weights are not a non-empty rectangular matrix"
                    )));
                }
                let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((rows, cols), flat)
                    .map_err(|err| InferenceError::InvalidModel(err.to_string()))?;
                DenseLayer::new(weights, Array1::from(layer.bias), layer.activation)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layers)
    }

    pub fn input_len(&self) -> usize {
        self.layers[0].inputs()
    }

    pub fn output_len(&self) -> usize {
        self.layers[self.layers.len() - 1].outputs()
    }
}

impl EmotionClassifier for DenseNetwork {
    fn infer(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        if batch.ncols() != self.input_len() {
            return Err(InferenceError::Shape {
                expected: self.input_len(),
                actual: batch.ncols(),
            });
        }
        let mut activations = batch.to_owned();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations)
    }

    fn name(&self) -> &str {
        "dense"
    }
}
