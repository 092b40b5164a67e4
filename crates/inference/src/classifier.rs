use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::info;

use crate::dense::DenseNetwork;
use crate::error::InferenceError;

/// Maps a batch of feature rows `(batch, n_features)` to class scores
/// `(batch, n_classes)`.
pub trait EmotionClassifier: Send + Sync {
    fn infer(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError>;

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Returns the same distribution for every row; used to exercise the
/// pipeline without model artifacts.
#[derive(Clone, Debug)]
pub struct FixedClassifier {
    outputs: Array1<f32>,
    input_len: Option<usize>,
}

impl FixedClassifier {
    pub fn new(outputs: Vec<f32>) -> Self {
        Self {
            outputs: Array1::from(outputs),
            input_len: None,
        }
    }

    /// Rejects batches whose rows are not `input_len` wide.
    pub fn expecting(mut self, input_len: usize) -> Self {
        self.input_len = Some(input_len);
        self
    }
}

impl EmotionClassifier for FixedClassifier {
    fn infer(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        if let Some(expected) = self.input_len {
            if batch.ncols() != expected {
                return Err(InferenceError::Shape {
                    expected,
                    actual: batch.ncols(),
                });
            }
        }
        let mut output = Array2::<f32>::zeros((batch.nrows(), self.outputs.len()));
        for mut row in output.rows_mut() {
            row.assign(&self.outputs);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Opens a classifier, choosing the backend from the file extension.
pub fn load_classifier<P: AsRef<Path>>(
    path: P,
) -> Result<Box<dyn EmotionClassifier>, InferenceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(InferenceError::NotFound(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    info!(path = %path.display(), format = %extension, "loading classifier");
    match extension.as_str() {
        "json" => Ok(Box::new(DenseNetwork::load(path)?)),
        #[cfg(feature = "onnx")]
        "onnx" => Ok(Box::new(crate::onnx::OnnxClassifier::load(path)?)),
        #[cfg(not(feature = "onnx"))]
        "onnx" => Err(InferenceError::UnsupportedFormat(
            "onnx (rebuild with the `onnx` feature)".to_string(),
        )),
        other => Err(InferenceError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_classifier_repeats_distribution_per_row() {
        let classifier = FixedClassifier::new(vec![0.1, 0.9]);
        let batch = Array2::<f32>::zeros((2, 40));
        let output = classifier.infer(&batch).unwrap();
        assert_eq!(output.dim(), (2, 2));
        assert_eq!(output[[1, 1]], 0.9);
    }

    #[test]
    fn fixed_classifier_checks_width_when_asked() {
        let classifier = FixedClassifier::new(vec![1.0]).expecting(40);
        let err = classifier.infer(&Array2::zeros((1, 39))).unwrap_err();
        assert!(matches!(err, InferenceError::Shape { expected: 40, actual: 39 }));
    }

    #[test]
    fn missing_model_is_not_found() {
        let err = load_classifier("missing-model.json").err().unwrap();
        assert!(matches!(err, InferenceError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        std::fs::write(&path, b"HDF").unwrap();
        let err = load_classifier(&path).err().unwrap();
        assert!(matches!(err, InferenceError::UnsupportedFormat(_)));
    }
}
