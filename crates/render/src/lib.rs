//! Diagnostic images for a prediction: the clip's mel spectrogram and a
//! radar chart of class probabilities, each returned as base64 PNG.

pub mod error;
pub mod fonts;
pub mod polar;
pub mod spectrogram;
pub mod surface;

use std::path::Path;

use emotion_audio::{AudioSignal, MelSpectrogram, DISPLAY_FMAX, DISPLAY_MELS};
use emotion_domain::ProbabilityMap;
use tracing::info;

pub use crate::error::RenderError;
pub use crate::polar::render_polar;
pub use crate::spectrogram::render_mel_spectrogram;
pub use crate::surface::RenderSurface;

/// Renders both images for one prediction.
#[derive(Clone, Copy, Debug)]
pub struct Visualizer {
    text: bool,
}

impl Visualizer {
    /// Registers a chart font, preferring `font_path`, and falls back to
    /// text-free charts when none is available.
    pub fn new(font_path: Option<&Path>) -> Self {
        let text = fonts::ensure_font(font_path);
        info!(text, font = ?fonts::registered_font(), "visualizer ready");
        Self { text }
    }

    /// A visualizer that never draws text.
    pub fn without_text() -> Self {
        Self { text: false }
    }

    pub fn draws_text(&self) -> bool {
        self.text
    }

    pub fn mel_spectrogram(&self, signal: &AudioSignal) -> Result<String, RenderError> {
        let spectrogram = MelSpectrogram::compute(signal, DISPLAY_MELS, DISPLAY_FMAX)?;
        render_mel_spectrogram(&spectrogram, self.text)
    }

    pub fn polar(&self, probabilities: &ProbabilityMap) -> Result<String, RenderError> {
        render_polar(probabilities, self.text)
    }
}
