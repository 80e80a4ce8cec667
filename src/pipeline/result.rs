//! Classification results and decisions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ml::backend::Prediction;

/// Label returned when nothing matched. Callers must treat it as "no
/// action".
pub const UNKNOWN_LABEL: &str = "unknown";

/// Where a classification result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// A trained statistical model.
    Model,
    /// The deterministic rule matcher.
    Rule,
}

/// One resolved classification for one input text.
///
/// `confidence` is the scoring source's own calibration: a model posterior
/// for model results, the rule's fixed nominal confidence for rule results.
/// Produced fresh per request and never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
    pub source: ResultSource,
    /// Per-label scores; model-sourced results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_scores: Option<BTreeMap<String, f64>>,
}

impl ClassificationResult {
    /// Wrap a backend prediction as a model-sourced result.
    pub fn from_prediction(prediction: Prediction) -> Self {
        ClassificationResult {
            label: prediction.label,
            confidence: prediction.confidence,
            source: ResultSource::Model,
            raw_scores: Some(prediction.raw_scores),
        }
    }

    /// A rule-sourced result with the rule's nominal confidence.
    pub fn from_rule<S: Into<String>>(label: S, confidence: f64) -> Self {
        ClassificationResult {
            label: label.into(),
            confidence,
            source: ResultSource::Rule,
            raw_scores: None,
        }
    }

    /// The designated no-match result: `unknown` at confidence zero.
    pub fn unknown() -> Self {
        ClassificationResult::from_rule(UNKNOWN_LABEL, 0.0)
    }

    /// Whether this is the designated no-match result.
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// The command processor's answer for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The chosen classification for the whole input.
    pub result: ClassificationResult,
    /// Sub-intents, in input order, when the input decomposed into multiple
    /// independently confident segments. Empty otherwise.
    pub sub_intents: Vec<ClassificationResult>,
    /// Whether decomposition was applied.
    pub decomposed: bool,
}

impl Decision {
    /// A single-intent decision.
    pub fn single(result: ClassificationResult) -> Self {
        Decision {
            result,
            sub_intents: Vec::new(),
            decomposed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_result() {
        let result = ClassificationResult::unknown();
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, ResultSource::Rule);
        assert!(result.is_unknown());
    }

    #[test]
    fn test_serialized_shape() {
        let result = ClassificationResult::from_rule("open_chrome", 0.9);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "rule");
        assert!(json.get("raw_scores").is_none());
    }
}
