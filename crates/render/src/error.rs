use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Drawing(String),
    #[error("spectrogram analysis failed: {0}")]
    Analysis(#[from] emotion_audio::AudioError),
    #[error("png encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("surface of {width}x{height} pixels is empty")]
    EmptySurface { width: u32, height: u32 },
}

impl From<RenderError> for emotion_domain::RecognizerError {
    fn from(err: RenderError) -> Self {
        Self::Render(err.to_string())
    }
}
