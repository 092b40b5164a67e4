//! Recognizer configuration.
//!
//! Values come from an optional YAML file, then environment variables, then
//! command-line flags, each layer overriding the one before it.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use emotion_audio::{ANALYSIS_SAMPLE_RATE, FEATURE_LEN};
use emotion_domain::RecognizerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecognizerConfig {
    /// Classifier weights (`.json` dense network or `.onnx`).
    pub model_path: PathBuf,
    /// Label encoder, JSON array or one label per line.
    pub label_encoder_path: PathBuf,
    /// Rate audio is resampled to before analysis.
    pub sample_rate: u32,
    /// Length the feature vector is padded or truncated to.
    pub feature_len: usize,
    /// TrueType font for chart text.
    pub font_path: Option<PathBuf>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/emotion_model.json"),
            label_encoder_path: PathBuf::from("models/label_encoder.json"),
            sample_rate: ANALYSIS_SAMPLE_RATE,
            feature_len: FEATURE_LEN,
            font_path: None,
        }
    }
}

impl RecognizerConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, RecognizerError> {
        serde_yaml::from_str(contents)
            .map_err(|err| RecognizerError::configuration(format!("invalid config: {err}")))
    }

    /// Reads a YAML config file. A path given explicitly must exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecognizerError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            RecognizerError::configuration(format!("read {}: {err}", path.display()))
        })?;
        let config = Self::from_yaml_str(&contents)?;
        info!(path = %path.display(), "loaded recognizer config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RecognizerError> {
        if self.sample_rate == 0 {
            return Err(RecognizerError::configuration("sample_rate must be positive"));
        }
        if self.feature_len == 0 {
            return Err(RecognizerError::configuration("feature_len must be positive"));
        }
        Ok(())
    }
}

/// Flags shared by every binary that builds a recognizer.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// YAML file with recognizer settings
    #[arg(long = "config", env = "EMOTION_CONFIG")]
    pub config: Option<PathBuf>,
    /// Classifier weights file
    #[arg(long, env = "EMOTION_MODEL_PATH")]
    pub model_path: Option<PathBuf>,
    /// Label encoder file
    #[arg(long, env = "EMOTION_LABEL_ENCODER_PATH")]
    pub label_encoder_path: Option<PathBuf>,
    /// TrueType font used for chart text
    #[arg(long, env = "EMOTION_FONT_PATH")]
    pub font_path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<RecognizerConfig, RecognizerError> {
        let mut config = match &self.config {
            Some(path) => RecognizerConfig::load(path)?,
            None => RecognizerConfig::default(),
        };
        if let Some(path) = &self.model_path {
            config.model_path = path.clone();
        }
        if let Some(path) = &self.label_encoder_path {
            config.label_encoder_path = path.clone();
        }
        if let Some(path) = &self.font_path {
            config.font_path = Some(path.clone());
        }
        config.validate()?;
        debug!(?config, "resolved recognizer config");
        Ok(config)
    }
}
