//! Dataset and training example types.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};

/// One labeled text example.
///
/// `annotation_confidence` is the human annotator's certainty in the label,
/// in `[0, 1]`. It is a property of the labeling, not a model output, and is
/// deliberately named apart from the prediction confidence on
/// [`crate::pipeline::ClassificationResult`]. The serialized field name stays
/// `confidence` for interchange with existing dataset files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Example text.
    pub text: String,
    /// Intent label.
    pub label: String,
    /// Label-annotation certainty in `[0, 1]`.
    #[serde(rename = "confidence")]
    pub annotation_confidence: f64,
}

impl TrainingExample {
    /// Create a validated example.
    pub fn new<S: Into<String>, L: Into<String>>(
        text: S,
        label: L,
        annotation_confidence: f64,
    ) -> Result<Self> {
        let example = TrainingExample {
            text: text.into(),
            label: label.into(),
            annotation_confidence,
        };
        example.validate()?;
        Ok(example)
    }

    /// Validate the example's fields.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(HeraldError::validation("example text cannot be empty"));
        }
        if self.label.trim().is_empty() {
            return Err(HeraldError::validation(format!(
                "example {:?} has an empty label",
                self.text
            )));
        }
        if !(0.0..=1.0).contains(&self.annotation_confidence) {
            return Err(HeraldError::validation(format!(
                "confidence {} outside [0, 1] for example {:?}",
                self.annotation_confidence, self.text
            )));
        }
        Ok(())
    }
}

/// A named collection of labeled text examples for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique dataset name. Used as the storage key.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Task category, e.g. `"intent_classification"`.
    pub task_type: String,
    examples: Vec<TrainingExample>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Dataset {
            name: name.into(),
            description: String::new(),
            task_type: String::new(),
            examples: Vec::new(),
        }
    }

    /// Append a validated example. Examples are append-only once stored.
    pub fn push(&mut self, example: TrainingExample) -> Result<()> {
        example.validate()?;
        self.examples.push(example);
        Ok(())
    }

    /// Append many validated examples, rejecting the whole batch on the first
    /// invalid one.
    pub fn extend(&mut self, examples: Vec<TrainingExample>) -> Result<()> {
        for example in &examples {
            example.validate()?;
        }
        self.examples.extend(examples);
        Ok(())
    }

    /// The examples, in insertion order.
    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the dataset has no examples.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Distinct labels in first-seen order.
    pub fn labels(&self) -> Vec<String> {
        let mut seen = AHashMap::new();
        let mut labels = Vec::new();
        for example in &self.examples {
            if seen.insert(example.label.clone(), ()).is_none() {
                labels.push(example.label.clone());
            }
        }
        labels
    }

    /// Example count per label.
    pub fn label_counts(&self) -> AHashMap<String, usize> {
        let mut counts = AHashMap::new();
        for example in &self.examples {
            *counts.entry(example.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_validation() {
        assert!(TrainingExample::new("open chrome", "open_app", 1.0).is_ok());
        assert!(TrainingExample::new("", "open_app", 1.0).is_err());
        assert!(TrainingExample::new("open chrome", "", 1.0).is_err());
        assert!(TrainingExample::new("open chrome", "open_app", 1.5).is_err());
        assert!(TrainingExample::new("open chrome", "open_app", -0.1).is_err());
    }

    #[test]
    fn test_labels_first_seen_order() {
        let mut dataset = Dataset::new("commands");
        dataset
            .push(TrainingExample::new("open chrome", "open_app", 1.0).unwrap())
            .unwrap();
        dataset
            .push(TrainingExample::new("close chrome", "close_app", 1.0).unwrap())
            .unwrap();
        dataset
            .push(TrainingExample::new("start notepad", "open_app", 1.0).unwrap())
            .unwrap();

        assert_eq!(dataset.labels(), vec!["open_app", "close_app"]);
        assert_eq!(dataset.label_counts()["open_app"], 2);
    }

    #[test]
    fn test_extend_rejects_batch_on_invalid_example() {
        let mut dataset = Dataset::new("commands");
        let batch = vec![
            TrainingExample {
                text: "open chrome".to_string(),
                label: "open_app".to_string(),
                annotation_confidence: 1.0,
            },
            TrainingExample {
                text: "bad".to_string(),
                label: "x".to_string(),
                annotation_confidence: 2.0,
            },
        ];
        assert!(dataset.extend(batch).is_err());
        assert!(dataset.is_empty());
    }
}
