//! Multinomial naive bayes backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::config::TrainingOptions;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::backend::{
    ModelBackend, ModelType, Prediction, check_not_cancelled, check_trainable,
};
use crate::ml::tfidf::TfIdfVectorizer;

/// Laplace smoothing strength.
const ALPHA: f64 = 1.0;

/// Learned state of one naive bayes training run.
#[derive(Debug, Serialize, Deserialize)]
struct NaiveBayesParameters {
    vectorizer: TfIdfVectorizer,
    /// Sorted label set; indices align with the score vectors below.
    labels: Vec<String>,
    class_log_prior: Vec<f64>,
    /// Per label, per vocabulary index: smoothed log token likelihood.
    feature_log_prob: Vec<Vec<f64>>,
}

/// Multinomial naive bayes over token counts with Laplace smoothing.
///
/// Trains in a single pass with no randomness, so it is deterministic
/// without a seed. Confidence is the posterior probability of the winning
/// label.
#[derive(Debug, Default)]
pub struct NaiveBayesBackend;

impl ModelBackend for NaiveBayesBackend {
    fn model_type(&self) -> ModelType {
        ModelType::NaiveBayes
    }

    fn train(
        &self,
        dataset: &Dataset,
        _options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact> {
        check_not_cancelled(cancel, self.model_type())?;
        check_trainable(dataset)?;

        let texts: Vec<String> = dataset.examples().iter().map(|e| e.text.clone()).collect();
        let mut vectorizer = TfIdfVectorizer::new(Tokenizer::default());
        vectorizer.fit(&texts);

        let mut labels = dataset.labels();
        labels.sort();
        let label_index: BTreeMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let vocab_size = vectorizer.vocabulary_size();
        let mut token_totals = vec![vec![0.0; vocab_size]; labels.len()];
        let mut class_counts = vec![0.0; labels.len()];

        for example in dataset.examples() {
            let class = label_index[example.label.as_str()];
            class_counts[class] += 1.0;
            let counts = vectorizer.token_counts(&example.text);
            for (slot, count) in token_totals[class].iter_mut().zip(counts) {
                *slot += count;
            }
        }

        let total_examples: f64 = class_counts.iter().sum();
        let class_log_prior: Vec<f64> = class_counts
            .iter()
            .map(|&count| (count / total_examples).ln())
            .collect();

        let feature_log_prob: Vec<Vec<f64>> = token_totals
            .iter()
            .map(|totals| {
                let class_total: f64 = totals.iter().sum();
                let denominator = class_total + ALPHA * vocab_size as f64;
                totals
                    .iter()
                    .map(|&count| ((count + ALPHA) / denominator).ln())
                    .collect()
            })
            .collect();

        let parameters = NaiveBayesParameters {
            vectorizer,
            labels,
            class_log_prior,
            feature_log_prob,
        };

        let train_accuracy = training_accuracy(dataset, &parameters);
        let mut metrics = BTreeMap::new();
        metrics.insert("train_accuracy".to_string(), train_accuracy);
        metrics.insert("examples".to_string(), dataset.len() as f64);

        Ok(ModelArtifact::draft(
            &dataset.name,
            self.model_type(),
            metrics,
            ModelArtifact::encode_parameters(&parameters)?,
        ))
    }

    fn predict(&self, text: &str, artifact: &ModelArtifact) -> Result<Prediction> {
        artifact.check_model_type(self.model_type())?;
        let parameters: NaiveBayesParameters = artifact.decode_parameters()?;
        Ok(predict_with(text, &parameters))
    }
}

fn predict_with(text: &str, parameters: &NaiveBayesParameters) -> Prediction {
    let counts = parameters.vectorizer.token_counts(text);

    let scores: Vec<f64> = parameters
        .labels
        .iter()
        .enumerate()
        .map(|(class, _)| {
            let mut score = parameters.class_log_prior[class];
            for (index, &count) in counts.iter().enumerate() {
                if count > 0.0 {
                    score += count * parameters.feature_log_prob[class][index];
                }
            }
            score
        })
        .collect();

    let probabilities = softmax(&scores);
    let (best, &confidence) = probabilities
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .expect("labels are never empty after training");

    let raw_scores: BTreeMap<String, f64> = parameters
        .labels
        .iter()
        .cloned()
        .zip(probabilities.iter().copied())
        .collect();

    Prediction {
        label: parameters.labels[best].clone(),
        confidence,
        raw_scores,
    }
}

fn training_accuracy(dataset: &Dataset, parameters: &NaiveBayesParameters) -> f64 {
    let correct = dataset
        .examples()
        .iter()
        .filter(|example| predict_with(&example.text, parameters).label == example.label)
        .count();
    correct as f64 / dataset.len() as f64
}

/// Numerically stable softmax over log scores.
pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingExample;

    fn app_commands() -> Dataset {
        let mut dataset = Dataset::new("application_commands");
        let examples = [
            ("open chrome", "open_app"),
            ("open firefox", "open_app"),
            ("open notepad", "open_app"),
            ("open calculator", "open_app"),
            ("start chrome", "open_app"),
            ("close chrome", "close_app"),
            ("close firefox", "close_app"),
            ("close notepad", "close_app"),
            ("quit chrome", "close_app"),
        ];
        for (text, label) in examples {
            dataset
                .push(TrainingExample::new(text, label, 1.0).unwrap())
                .unwrap();
        }
        dataset
    }

    #[test]
    fn test_train_and_predict() {
        let backend = NaiveBayesBackend;
        let artifact = backend
            .train(&app_commands(), &TrainingOptions::default(), &CancelToken::new())
            .unwrap();

        assert!(artifact.metrics["train_accuracy"] > 0.8);

        let prediction = backend.predict("open chrome please", &artifact).unwrap();
        assert_eq!(prediction.label, "open_app");
        assert!(prediction.confidence >= 0.7);

        let prediction = backend.predict("close chrome now", &artifact).unwrap();
        assert_eq!(prediction.label, "close_app");
    }

    #[test]
    fn test_unseen_text_has_low_confidence() {
        let backend = NaiveBayesBackend;
        let artifact = backend
            .train(&app_commands(), &TrainingOptions::default(), &CancelToken::new())
            .unwrap();

        // No in-vocabulary tokens: the posterior collapses to the class
        // priors, well under any useful threshold.
        let prediction = backend.predict("xyzzyqux frobnicate", &artifact).unwrap();
        assert!(prediction.confidence < 0.7);
    }

    #[test]
    fn test_determinism_across_runs() {
        let backend = NaiveBayesBackend;
        let options = TrainingOptions::default();
        let a = backend
            .train(&app_commands(), &options, &CancelToken::new())
            .unwrap();
        let b = backend
            .train(&app_commands(), &options, &CancelToken::new())
            .unwrap();

        for probe in ["open chrome", "close firefox", "launch spotify"] {
            let pa = backend.predict(probe, &a).unwrap();
            let pb = backend.predict(probe, &b).unwrap();
            assert_eq!(pa.label, pb.label);
            assert_eq!(pa.confidence, pb.confidence);
        }
    }

    #[test]
    fn test_insufficient_data() {
        let backend = NaiveBayesBackend;
        let mut dataset = Dataset::new("tiny");
        dataset
            .push(TrainingExample::new("open chrome", "open_app", 1.0).unwrap())
            .unwrap();
        assert!(matches!(
            backend.train(&dataset, &TrainingOptions::default(), &CancelToken::new()),
            Err(crate::error::HeraldError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_raw_scores_sum_to_one() {
        let backend = NaiveBayesBackend;
        let artifact = backend
            .train(&app_commands(), &TrainingOptions::default(), &CancelToken::new())
            .unwrap();
        let prediction = backend.predict("open chrome", &artifact).unwrap();
        let sum: f64 = prediction.raw_scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
