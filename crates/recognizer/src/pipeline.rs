use std::path::Path;

use tracing::{info, instrument};

use emotion_audio::FeatureExtractor;
use emotion_domain::{EmotionReport, RecognizerError};
use emotion_inference::LoadedModel;
use emotion_render::Visualizer;

use crate::config::RecognizerConfig;

/// Fails with `AudioNotFound` unless `path` names an existing file.
pub fn ensure_audio_exists(path: &Path) -> Result<(), RecognizerError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RecognizerError::AudioNotFound(path.to_path_buf()))
    }
}

/// Audio file in, emotion report out.
pub struct EmotionRecognizer {
    extractor: FeatureExtractor,
    model: LoadedModel,
    visualizer: Visualizer,
}

impl EmotionRecognizer {
    pub fn new(extractor: FeatureExtractor, model: LoadedModel, visualizer: Visualizer) -> Self {
        Self {
            extractor,
            model,
            visualizer,
        }
    }

    /// Loads the model artifacts named by `config`.
    pub fn from_config(config: &RecognizerConfig) -> Result<Self, RecognizerError> {
        let extractor = FeatureExtractor::new(config.sample_rate, config.feature_len)
            .map_err(|err| RecognizerError::configuration(err.to_string()))?;
        let model = LoadedModel::load(&config.model_path, &config.label_encoder_path)?;
        let visualizer = Visualizer::new(config.font_path.as_deref());
        Ok(Self::new(extractor, model, visualizer))
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn recognize(&self, path: &Path) -> Result<EmotionReport, RecognizerError> {
        ensure_audio_exists(path)?;
        let extracted = self
            .extractor
            .extract_file(path)
            .map_err(|err| RecognizerError::feature_extraction(path, err))?;
        info!(
            samples = extracted.signal.samples.len(),
            features = extracted.features.len(),
            "features extracted"
        );

        let prediction = self.model.predictor().predict(extracted.features.as_slice())?;
        info!(emotion = %prediction.emotion, "classified");

        let mel = self.visualizer.mel_spectrogram(&extracted.signal)?;
        let polar = self.visualizer.polar(&prediction.probabilities)?;
        Ok(EmotionReport::new(prediction, mel, polar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotion_domain::{ErrorKind, LabelEncoder};
    use emotion_inference::FixedClassifier;

    fn recognizer() -> EmotionRecognizer {
        let encoder = LabelEncoder::new(vec!["calm".to_string(), "fearful".to_string()]).unwrap();
        let classifier = FixedClassifier::new(vec![0.3, 0.7]).expecting(40);
        let model = LoadedModel::new(Box::new(classifier), encoder);
        EmotionRecognizer::new(
            FeatureExtractor::new(22050, 40).unwrap(),
            model,
            Visualizer::without_text(),
        )
    }

    #[test]
    fn missing_audio_is_reported_before_extraction() {
        let err = recognizer().recognize(Path::new("missing.wav")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AudioNotFound);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn undecodable_audio_is_a_feature_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not audio").unwrap();
        let err = recognizer().recognize(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureExtraction);
        assert!(err.to_string().starts_with("Error processing"));
    }

    #[test]
    fn directories_are_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_audio_exists(dir.path()).is_err());
    }

    #[test]
    fn missing_model_is_a_model_load_error() {
        let config = RecognizerConfig {
            model_path: "nowhere/model.json".into(),
            ..RecognizerConfig::default()
        };
        let err = EmotionRecognizer::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
    }
}
