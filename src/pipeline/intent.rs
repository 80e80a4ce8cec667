//! Model-backed intent classification.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::ml::backend::{ModelType, backend_for};
use crate::pipeline::result::ClassificationResult;
use crate::registry::ModelRegistry;

/// Classifies text with the active registered model for a dataset.
///
/// This is mechanism, not policy: when no artifact is registered it
/// propagates [`crate::error::HeraldError::NoTrainedModel`] instead of
/// silently degrading. Falling back to rules is the command processor's
/// decision.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    registry: Arc<ModelRegistry>,
}

impl IntentClassifier {
    /// Create a classifier over a registry.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        IntentClassifier { registry }
    }

    /// Classify `text` with the active (dataset, model type) artifact.
    pub fn classify(
        &self,
        text: &str,
        dataset_name: &str,
        model_type: ModelType,
    ) -> Result<ClassificationResult> {
        let artifact = self.registry.get_active(dataset_name, model_type)?;
        let prediction = backend_for(model_type).predict(text, &artifact)?;
        debug!(
            dataset = %dataset_name,
            model = %model_type,
            version = artifact.version,
            label = %prediction.label,
            confidence = prediction.confidence,
            "model prediction"
        );
        Ok(ClassificationResult::from_prediction(prediction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingOptions;
    use crate::dataset::{Dataset, TrainingExample};
    use crate::error::HeraldError;
    use crate::ml::CancelToken;
    use crate::pipeline::result::ResultSource;
    use crate::storage::MemoryStorage;

    fn trained_registry() -> Arc<ModelRegistry> {
        let registry = Arc::new(ModelRegistry::new(Arc::new(MemoryStorage::new()), 8));
        let mut dataset = Dataset::new("commands");
        for (text, label) in [
            ("open chrome", "open_app"),
            ("open firefox", "open_app"),
            ("close chrome", "close_app"),
            ("close firefox", "close_app"),
        ] {
            dataset
                .push(TrainingExample::new(text, label, 1.0).unwrap())
                .unwrap();
        }
        let draft = backend_for(ModelType::NaiveBayes)
            .train(&dataset, &TrainingOptions::default(), &CancelToken::new())
            .unwrap();
        registry.register(draft).unwrap();
        registry
    }

    #[test]
    fn test_classify_wraps_model_source() {
        let classifier = IntentClassifier::new(trained_registry());
        let result = classifier
            .classify("open chrome", "commands", ModelType::NaiveBayes)
            .unwrap();
        assert_eq!(result.source, ResultSource::Model);
        assert_eq!(result.label, "open_app");
        assert!(result.raw_scores.is_some());
    }

    #[test]
    fn test_missing_model_propagates() {
        let classifier = IntentClassifier::new(trained_registry());
        assert!(matches!(
            classifier.classify("open chrome", "commands", ModelType::Transformer),
            Err(HeraldError::NoTrainedModel(_))
        ));
    }
}
