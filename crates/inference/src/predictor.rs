use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info, instrument, warn};

use emotion_domain::{LabelEncoder, Prediction, ProbabilityMap, RecognizerError};

use crate::classifier::{load_classifier, EmotionClassifier};
use crate::error::InferenceError;

/// Tolerance on how far the class scores may sum away from 1 before the
/// output is reported as unnormalized.
const NORMALIZATION_TOLERANCE: f64 = 1e-3;

/// A classifier together with the encoder naming its outputs.
pub struct LoadedModel {
    classifier: Box<dyn EmotionClassifier>,
    encoder: LabelEncoder,
}

impl LoadedModel {
    pub fn new(classifier: Box<dyn EmotionClassifier>, encoder: LabelEncoder) -> Self {
        Self {
            classifier,
            encoder,
        }
    }

    /// Loads the classifier weights and label encoder from disk.
    pub fn load<M: AsRef<Path>, E: AsRef<Path>>(
        model_path: M,
        encoder_path: E,
    ) -> Result<Self, RecognizerError> {
        let classifier = load_classifier(model_path.as_ref())
            .map_err(|err| RecognizerError::ModelLoad(err.to_string()))?;
        let encoder = LabelEncoder::load(encoder_path)?;
        info!(
            backend = classifier.name(),
            classes = encoder.len(),
            "model ready"
        );
        Ok(Self::new(classifier, encoder))
    }

    pub fn classifier(&self) -> &dyn EmotionClassifier {
        self.classifier.as_ref()
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn predictor(&self) -> Predictor<'_> {
        Predictor::new(self.classifier.as_ref(), &self.encoder)
    }
}

/// Runs one feature vector through the classifier and names the result.
pub struct Predictor<'a> {
    classifier: &'a dyn EmotionClassifier,
    encoder: &'a LabelEncoder,
}

impl<'a> Predictor<'a> {
    pub fn new(classifier: &'a dyn EmotionClassifier, encoder: &'a LabelEncoder) -> Self {
        Self {
            classifier,
            encoder,
        }
    }

    #[instrument(skip_all, fields(backend = self.classifier.name(), features = features.len()))]
    pub fn predict(&self, features: &[f32]) -> Result<Prediction, RecognizerError> {
        self.run(features)
            .map_err(|err| RecognizerError::Prediction(err.to_string()))
            .and_then(|scores| self.label(&scores))
    }

    fn run(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if features.is_empty() {
            return Err(InferenceError::Shape {
                expected: 1,
                actual: 0,
            });
        }
        let batch = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|err| InferenceError::Backend(err.to_string()))?;
        let output = self.classifier.infer(&batch)?;
        if output.nrows() != 1 || output.ncols() == 0 {
            return Err(InferenceError::Backend(format!(
                "expected one row of class scores, got shape {:?}",
                output.dim()
            )));
        }
        let scores = output.row(0).to_vec();
        if scores.iter().any(|score| !score.is_finite()) {
            return Err(InferenceError::NonFinite);
        }
        Ok(scores)
    }

    fn label(&self, scores: &[f32]) -> Result<Prediction, RecognizerError> {
        let (best, _) = scores
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (index, score)| {
                if *score > best.1 {
                    (index, *score)
                } else {
                    best
                }
            });
        let emotion = self.encoder.decode(best)?.to_string();

        let mut probabilities = ProbabilityMap::with_capacity(scores.len());
        for (index, score) in scores.iter().enumerate() {
            probabilities.insert(self.encoder.decode(index)?, *score as f64 * 100.0);
        }

        let total = probabilities.total() / 100.0;
        if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
            warn!(total, "class scores do not form a normalized distribution");
        }
        debug!(emotion = %emotion, class = best, "prediction complete");
        Ok(Prediction {
            emotion,
            probabilities,
        })
    }
}
