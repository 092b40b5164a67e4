pub mod dsp;
pub mod error;
pub mod features;
pub mod filters;
pub mod io;
pub mod resample;
pub mod spectrogram;
pub mod tuning;

pub use error::AudioError;
pub use features::{
    DescriptorSet, ExtractedAudio, FeatureExtractor, FeatureVector, ANALYSIS_SAMPLE_RATE,
    FEATURE_LEN,
};
pub use io::{AudioDecoder, AudioSignal};
pub use resample::SincResampler;
pub use spectrogram::{MelSpectrogram, DISPLAY_FMAX, DISPLAY_MELS};
