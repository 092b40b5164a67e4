//! Classifier backends and the prediction step that turns a feature vector
//! into a named emotion with per-class percentages.

pub mod classifier;
pub mod dense;
pub mod error;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod predictor;

pub use crate::classifier::{load_classifier, EmotionClassifier, FixedClassifier};
pub use crate::dense::{Activation, DenseLayer, DenseNetwork};
pub use crate::error::InferenceError;
#[cfg(feature = "onnx")]
pub use crate::onnx::OnnxClassifier;
pub use crate::predictor::{LoadedModel, Predictor};
