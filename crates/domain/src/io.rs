use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RecognizerError};
use crate::prediction::{Prediction, ProbabilityMap};

/// Success payload printed by the CLI and returned by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionReport {
    pub emotion: String,
    pub probabilities: ProbabilityMap,
    pub mel_spectrogram_base64: String,
    pub polar_plot_base64: String,
}

impl EmotionReport {
    pub fn new(
        prediction: Prediction,
        mel_spectrogram_base64: String,
        polar_plot_base64: String,
    ) -> Self {
        Self {
            emotion: prediction.emotion,
            probabilities: prediction.probabilities,
            mel_spectrogram_base64,
            polar_plot_base64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&RecognizerError> for ErrorReport {
    fn from(err: &RecognizerError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// The one JSON object a run produces.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success(EmotionReport),
    Failure(ErrorReport),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<EmotionReport, RecognizerError>> for Response {
    fn from(result: Result<EmotionReport, RecognizerError>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(err) => Self::Failure(ErrorReport::from(&err)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportFormat {
    Compact,
    #[default]
    Pretty,
}

pub trait ReportExporter {
    fn export(&self, response: &Response, format: ReportFormat) -> Result<Vec<u8>, RecognizerError>;
}

pub struct JsonExporter;

impl ReportExporter for JsonExporter {
    fn export(
        &self,
        response: &Response,
        format: ReportFormat,
    ) -> Result<Vec<u8>, RecognizerError> {
        let bytes = match format {
            ReportFormat::Compact => serde_json::to_vec(response),
            ReportFormat::Pretty => serde_json::to_vec_pretty(response),
        };
        bytes.map_err(|err| RecognizerError::Serialization(err.to_string()))
    }
}
