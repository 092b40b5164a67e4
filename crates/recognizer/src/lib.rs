pub mod cli;
pub mod config;
pub mod pipeline;

pub use config::{ConfigArgs, RecognizerConfig};
pub use pipeline::{ensure_audio_exists, EmotionRecognizer};
