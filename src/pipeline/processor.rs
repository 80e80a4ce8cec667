//! Command processing: classification, policy, and decomposition.

use tracing::debug;

use crate::config::HeraldConfig;
use crate::error::{HeraldError, Result};
use crate::pipeline::intent::IntentClassifier;
use crate::pipeline::policy::decide;
use crate::pipeline::result::{ClassificationResult, Decision};
use crate::pipeline::rules::RuleMatcher;

/// Conjunction markers that may split compound input into sub-intents.
/// Matched longest first so ", then " is not shadowed by " then ".
const CONJUNCTIONS: &[&str] = &[", and then ", ", then ", " and then ", " then ", " and "];

/// Orchestrates the full pipeline for one input: classify, apply the
/// threshold policy, optionally decompose compound input.
///
/// The processor never raises on unknown input; the worst case is the
/// `unknown` rule result at confidence zero, which callers must treat as
/// "no action".
#[derive(Debug)]
pub struct CommandProcessor {
    classifier: IntentClassifier,
    rules: RuleMatcher,
    config: HeraldConfig,
    dataset_name: String,
}

impl CommandProcessor {
    /// Create a processor routing against the named dataset.
    pub fn new(
        classifier: IntentClassifier,
        rules: RuleMatcher,
        config: HeraldConfig,
        dataset_name: impl Into<String>,
    ) -> Self {
        CommandProcessor {
            classifier,
            rules,
            config,
            dataset_name: dataset_name.into(),
        }
    }

    /// Process one input text into a decision.
    pub fn process(&self, text: &str) -> Result<Decision> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Decision::single(ClassificationResult::unknown()));
        }

        let whole = self.resolve(text)?;

        let segments = decompose(text);
        if segments.len() > 1 {
            let results = segments
                .iter()
                .map(|segment| self.resolve(segment))
                .collect::<Result<Vec<_>>>()?;

            // Fail-safe: decompose only when every segment independently
            // clears the confidence bar. One weak segment keeps the whole
            // input as a single intent.
            if results.iter().all(|r| self.clears_bar(r)) {
                debug!(segments = results.len(), "input decomposed");
                return Ok(Decision {
                    result: whole,
                    sub_intents: results,
                    decomposed: true,
                });
            }
            debug!("decomposition rejected, keeping single intent");
        }

        Ok(Decision::single(whole))
    }

    /// Classify one text and apply the threshold policy.
    ///
    /// A missing trained model is absorbed here — and only here — by handing
    /// the policy an absent model result, which selects the rule fallback.
    /// Any other classifier error propagates, as does a missing model when
    /// rule fallback is disabled: a training-level failure is never disguised
    /// as a low-confidence unknown.
    fn resolve(&self, text: &str) -> Result<ClassificationResult> {
        let rule_result = self.rules.match_text(text);

        let model_result = match self.classifier.classify(
            text,
            &self.dataset_name,
            self.config.model_preference,
        ) {
            Ok(result) => Some(result),
            Err(HeraldError::NoTrainedModel(_)) if self.config.fallback_to_rules => None,
            Err(e) => return Err(e),
        };

        Ok(decide(
            model_result.as_ref(),
            rule_result,
            self.config.confidence_threshold,
        ))
    }

    fn clears_bar(&self, result: &ClassificationResult) -> bool {
        result.confidence >= self.config.confidence_threshold
    }
}

/// Split compound input on conjunction markers.
fn decompose(text: &str) -> Vec<String> {
    let mut segments = vec![text.to_string()];
    for marker in CONJUNCTIONS {
        segments = segments
            .iter()
            .flat_map(|segment| segment.split(marker))
            .map(|s| s.trim().to_string())
            .collect();
    }
    segments.retain(|s| !s.is_empty());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingOptions;
    use crate::dataset::{Dataset, TrainingExample};
    use crate::ml::CancelToken;
    use crate::ml::backend::{ModelType, backend_for};
    use crate::pipeline::result::{ResultSource, UNKNOWN_LABEL};
    use crate::registry::ModelRegistry;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new("application_commands");
        for (text, label) in [
            ("open chrome", "open_app"),
            ("open firefox", "open_app"),
            ("open notepad", "open_app"),
            ("open calculator", "open_app"),
            ("start chrome", "open_app"),
            ("close chrome", "close_app"),
            ("close firefox", "close_app"),
            ("close notepad", "close_app"),
            ("quit chrome", "close_app"),
        ] {
            dataset
                .push(TrainingExample::new(text, label, 1.0).unwrap())
                .unwrap();
        }
        dataset
    }

    fn processor(trained: bool, config: HeraldConfig) -> CommandProcessor {
        let registry = Arc::new(ModelRegistry::new(Arc::new(MemoryStorage::new()), 8));
        if trained {
            let draft = backend_for(ModelType::NaiveBayes)
                .train(&dataset(), &TrainingOptions::default(), &CancelToken::new())
                .unwrap();
            registry.register(draft).unwrap();
        }
        CommandProcessor::new(
            IntentClassifier::new(registry),
            RuleMatcher::with_default_rules().unwrap(),
            config,
            "application_commands",
        )
    }

    #[test]
    fn test_confident_model_path() {
        let processor = processor(true, HeraldConfig::default());
        let decision = processor.process("open chrome please").unwrap();
        assert_eq!(decision.result.label, "open_app");
        assert_eq!(decision.result.source, ResultSource::Model);
        assert!(decision.result.confidence >= 0.7);
    }

    #[test]
    fn test_unknown_input_never_raises() {
        let processor = processor(true, HeraldConfig::default());
        let decision = processor.process("colorless green ideas").unwrap();
        assert_eq!(decision.result.label, UNKNOWN_LABEL);
        assert_eq!(decision.result.confidence, 0.0);
        assert_eq!(decision.result.source, ResultSource::Rule);
    }

    #[test]
    fn test_no_model_falls_back_to_rules() {
        let processor = processor(false, HeraldConfig::default());
        let decision = processor.process("open chrome").unwrap();
        assert_eq!(decision.result.source, ResultSource::Rule);
        assert_eq!(decision.result.label, "open_chrome");
    }

    #[test]
    fn test_no_model_without_fallback_is_an_error() {
        let config = HeraldConfig {
            fallback_to_rules: false,
            ..HeraldConfig::default()
        };
        let processor = processor(false, config);
        assert!(matches!(
            processor.process("open chrome"),
            Err(HeraldError::NoTrainedModel(_))
        ));
    }

    #[test]
    fn test_decomposition_of_confident_segments() {
        let processor = processor(true, HeraldConfig::default());
        let decision = processor.process("open chrome and close firefox").unwrap();
        assert!(decision.decomposed);
        assert_eq!(decision.sub_intents.len(), 2);
        assert_eq!(decision.sub_intents[0].label, "open_app");
        assert_eq!(decision.sub_intents[1].label, "close_app");
    }

    #[test]
    fn test_decomposition_fail_safe() {
        let processor = processor(true, HeraldConfig::default());
        // The second segment matches no rule and no model confidently, so
        // the whole input stays a single intent.
        let decision = processor.process("open chrome and xyzzyqux").unwrap();
        assert!(!decision.decomposed);
        assert!(decision.sub_intents.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let processor = processor(true, HeraldConfig::default());
        let decision = processor.process("   ").unwrap();
        assert!(decision.result.is_unknown());
    }

    #[test]
    fn test_decompose_markers() {
        assert_eq!(
            decompose("open chrome and close firefox then open notepad"),
            vec!["open chrome", "close firefox", "open notepad"]
        );
        assert_eq!(decompose("open chrome"), vec!["open chrome"]);
        assert_eq!(
            decompose("open chrome, then close firefox"),
            vec!["open chrome", "close firefox"]
        );
    }
}
