use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::RecognizerError;

#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Classes { classes: Vec<String> },
    Bare(Vec<String>),
}

/// Bidirectional mapping between class indices and emotion names.
///
/// The position of a label in `classes` is the index the classifier's output
/// layer uses for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, RecognizerError> {
        if classes.is_empty() {
            return Err(RecognizerError::ModelLoad(
                "label encoder has no classes".to_string(),
            ));
        }
        let mut index = HashMap::with_capacity(classes.len());
        for (position, label) in classes.iter().enumerate() {
            if index.insert(label.clone(), position).is_some() {
                return Err(RecognizerError::ModelLoad(format!(
                    "label encoder lists {label:?} more than once"
                )));
            }
        }
        Ok(Self { classes, index })
    }

    /// Reads a `.json` (array or `{"classes": [...]}`) or `.txt` (one label
    /// per line) encoder file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecognizerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RecognizerError::ModelLoad(format!(
                "label encoder file not found: {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path).map_err(|err| {
            RecognizerError::ModelLoad(format!("read label encoder {}: {err}", path.display()))
        })?;
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        let classes = if is_text {
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            match serde_json::from_str::<EncoderFile>(&contents) {
                Ok(EncoderFile::Classes { classes }) | Ok(EncoderFile::Bare(classes)) => classes,
                Err(err) => {
                    return Err(RecognizerError::ModelLoad(format!(
                        "parse label encoder {}: {err}",
                        path.display()
                    )))
                }
            }
        };
        let encoder = Self::new(classes)?;
        info!(path = %path.display(), classes = encoder.len(), "loaded label encoder");
        Ok(encoder)
    }

    /// Inverse transform: class index to label.
    pub fn decode(&self, index: usize) -> Result<&str, RecognizerError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                RecognizerError::Prediction(format!(
                    "unknown class index {index} (encoder knows {} classes)",
                    self.classes.len()
                ))
            })
    }

    /// Forward transform: label to class index.
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
