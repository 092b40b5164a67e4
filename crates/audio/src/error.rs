use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("open audio file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported or corrupt audio: {0}")]
    Format(#[from] symphonia::core::errors::Error),
    #[error("no default track found")]
    NoTrack,
    #[error("audio stream does not declare a sample rate")]
    UnknownSampleRate,
    #[error("resampler setup failed: {0}")]
    ResamplerSetup(#[from] rubato::ResamplerConstructionError),
    #[error("resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{descriptor} produced non-finite values")]
    NonFinite { descriptor: &'static str },
}

impl AudioError {
    pub fn invalid<T: Into<String>>(message: T) -> Self {
        Self::InvalidParameter(message.into())
    }
}
