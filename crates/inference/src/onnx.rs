use std::path::Path;

use ndarray::{Array2, CowArray, Ix2};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use tracing::debug;

use crate::classifier::EmotionClassifier;
use crate::error::InferenceError;

/// Classifier backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InferenceError> {
        let environment = Environment::builder()
            .with_name("emotion-recognizer")
            .build()?
            .into_arc();
        let session = SessionBuilder::new(&environment)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_intra_threads(1)?
            .with_model_from_file(path.as_ref())?;
        debug!(
            inputs = session.inputs.len(),
            outputs = session.outputs.len(),
            "opened onnx session"
        );
        Ok(Self { session })
    }
}

impl EmotionClassifier for OnnxClassifier {
    fn infer(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        let input = CowArray::from(batch.view().into_dyn());
        let inputs = vec![Value::from_array(self.session.allocator(), &input)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;
        let first = outputs
            .first()
            .ok_or_else(|| InferenceError::Backend("model produced no outputs".to_string()))?;
        let tensor: OrtOwnedTensor<f32, _> = first.try_extract()?;
        let scores = tensor
            .view()
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|err| InferenceError::Backend(format!("unexpected output rank: {err}")))?;
        Ok(scores)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
