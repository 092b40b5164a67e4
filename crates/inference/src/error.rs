use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("read model {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse model: {0}")]
    Parse(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("unsupported model format {0:?}")]
    UnsupportedFormat(String),
    #[error("input has {actual} features but the model expects {expected}")]
    Shape { expected: usize, actual: usize },
    #[error("classifier produced non-finite output")]
    NonFinite,
    #[error("inference backend: {0}")]
    Backend(String),
}

#[cfg(feature = "onnx")]
impl From<ort::OrtError> for InferenceError {
    fn from(err: ort::OrtError) -> Self {
        Self::Backend(err.to_string())
    }
}
