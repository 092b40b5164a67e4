use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Stable, machine-readable category of a [`RecognizerError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingAudioPath,
    AudioNotFound,
    Configuration,
    FeatureExtraction,
    ModelLoad,
    Prediction,
    Render,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingAudioPath => "missing_audio_path",
            Self::AudioNotFound => "audio_not_found",
            Self::Configuration => "configuration",
            Self::FeatureExtraction => "feature_extraction",
            Self::ModelLoad => "model_load",
            Self::Prediction => "prediction",
            Self::Render => "render",
            Self::Serialization => "serialization",
        }
    }
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Audio file path not provided.")]
    MissingAudioPath,
    #[error("Audio file not found: {}", .0.display())]
    AudioNotFound(PathBuf),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("Error processing {}: {message}", path.display())]
    FeatureExtraction { path: PathBuf, message: String },
    #[error("Model loading failed: {0}")]
    ModelLoad(String),
    #[error("Prediction failed: {0}")]
    Prediction(String),
    #[error("Rendering failed: {0}")]
    Render(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RecognizerError {
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    pub fn feature_extraction<P: Into<PathBuf>, T: ToString>(path: P, err: T) -> Self {
        Self::FeatureExtraction {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAudioPath => ErrorKind::MissingAudioPath,
            Self::AudioNotFound(_) => ErrorKind::AudioNotFound,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::FeatureExtraction { .. } => ErrorKind::FeatureExtraction,
            Self::ModelLoad(_) => ErrorKind::ModelLoad,
            Self::Prediction(_) => ErrorKind::Prediction,
            Self::Render(_) => ErrorKind::Render,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}
