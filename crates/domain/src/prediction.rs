use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Label to probability (0-100 scale), kept in class-index order.
///
/// Serializes as a JSON object whose key order follows the label encoder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbabilityMap {
    entries: Vec<(String, f64)>,
}

impl ProbabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts or replaces the probability for `label`.
    pub fn insert(&mut self, label: impl Into<String>, probability: f64) {
        let label = label.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = probability,
            None => self.entries.push((label, probability)),
        }
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, probability)| *probability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(label, probability)| (label.as_str(), *probability))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, probability)| probability).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ProbabilityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, probability) in &self.entries {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

struct ProbabilityMapVisitor;

impl<'de> Visitor<'de> for ProbabilityMapVisitor {
    type Value = ProbabilityMap;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of label to probability")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = ProbabilityMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((label, probability)) = access.next_entry::<String, f64>()? {
            map.insert(label, probability);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for ProbabilityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ProbabilityMapVisitor)
    }
}

/// Outcome of one forward pass: the arg-max label plus every class's score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub emotion: String,
    pub probabilities: ProbabilityMap,
}
