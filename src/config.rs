//! Configuration records for the classification pipeline.
//!
//! Configuration is plain data threaded into constructors, never read from
//! ambient process state, so behavior stays reproducible in tests. Reloading
//! requires a process restart.

use serde::{Deserialize, Serialize};

use crate::ml::ModelType;

/// Runtime configuration for the command processor and threshold policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// Minimum model confidence required to prefer the model result over the
    /// rule fallback. Closed lower bound: equality favors the model.
    pub confidence_threshold: f64,
    /// Model type consulted by the command processor.
    pub model_preference: ModelType,
    /// Absorb a missing trained model by substituting the rule result. When
    /// false, a missing model surfaces as an error.
    pub fallback_to_rules: bool,
    /// Maximum number of hydrated artifacts the registry keeps resident.
    pub cache_capacity: usize,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        HeraldConfig {
            confidence_threshold: 0.7,
            model_preference: ModelType::NaiveBayes,
            fallback_to_rules: true,
            cache_capacity: 8,
        }
    }
}

impl HeraldConfig {
    /// Parse a configuration from its JSON form.
    pub fn from_json(payload: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Knobs for one training run. Backends read only the fields they understand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    /// Random seed. Training twice with the same seed yields identical
    /// prediction behavior.
    pub seed: u64,
    /// Gradient-descent epochs (support-vector and transformer backends).
    pub epochs: usize,
    /// Learning rate for gradient-trained backends.
    pub learning_rate: f64,
    /// L2 penalty for gradient-trained backends.
    pub l2_penalty: f64,
    /// Held-out fraction for the transformer validation split.
    pub validation_split: f64,
    /// Number of trees in the random forest.
    pub n_trees: usize,
    /// Maximum tree depth in the random forest.
    pub max_depth: usize,
    /// Embedding width of the transformer backend.
    pub embed_dim: usize,
    /// Mini-batch size for the transformer backend.
    pub batch_size: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptions {
            seed: 42,
            epochs: 40,
            learning_rate: 0.05,
            l2_penalty: 1e-4,
            validation_split: 0.2,
            n_trees: 50,
            max_depth: 12,
            embed_dim: 32,
            batch_size: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.model_preference, ModelType::NaiveBayes);
        assert!(config.fallback_to_rules);
        assert_eq!(config.cache_capacity, 8);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = HeraldConfig::from_json(r#"{"confidence_threshold": 0.9}"#).unwrap();
        assert_eq!(config.confidence_threshold, 0.9);
        assert!(config.fallback_to_rules);
    }
}
