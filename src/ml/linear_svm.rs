//! One-vs-rest linear support-vector backend.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::config::TrainingOptions;
use crate::dataset::Dataset;
use crate::error::{HeraldError, Result};
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::backend::{
    ModelBackend, ModelType, Prediction, check_not_cancelled, check_trainable,
};
use crate::ml::naive_bayes::softmax;
use crate::ml::tfidf::TfIdfVectorizer;

/// Learned state of one linear SVM training run.
#[derive(Debug, Serialize, Deserialize)]
struct LinearSvmParameters {
    vectorizer: TfIdfVectorizer,
    labels: Vec<String>,
    /// One weight vector per label; the last element is the bias.
    weights: Vec<Vec<f64>>,
}

/// Linear SVM trained one-vs-rest with seeded subgradient descent on hinge
/// loss. Trains in one pass of epochs (atomic-or-nothing with respect to
/// cancellation). Confidence is a softmax over the per-label margins.
#[derive(Debug, Default)]
pub struct LinearSvmBackend;

impl ModelBackend for LinearSvmBackend {
    fn model_type(&self) -> ModelType {
        ModelType::SupportVector
    }

    fn train(
        &self,
        dataset: &Dataset,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact> {
        check_not_cancelled(cancel, self.model_type())?;
        check_trainable(dataset)?;

        let texts: Vec<String> = dataset.examples().iter().map(|e| e.text.clone()).collect();
        let mut vectorizer = TfIdfVectorizer::new(Tokenizer::default());
        vectorizer.fit(&texts);

        let mut labels = dataset.labels();
        labels.sort();

        let features: Vec<Vec<f64>> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let targets: Vec<usize> = dataset
            .examples()
            .iter()
            .map(|e| labels.iter().position(|l| l == &e.label).unwrap_or(0))
            .collect();

        let dim = vectorizer.vocabulary_size() + 1;
        let mut weights = vec![vec![0.0; dim]; labels.len()];
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut indices: Vec<usize> = (0..features.len()).collect();

        for _epoch in 0..options.epochs.max(1) {
            indices.shuffle(&mut rng);
            for &i in &indices {
                let x = &features[i];
                for (class, w) in weights.iter_mut().enumerate() {
                    let y = if targets[i] == class { 1.0 } else { -1.0 };
                    let margin = y * (dot(w, x) + w[dim - 1]);
                    // Weight decay on every visit, hinge update inside the margin.
                    for value in w.iter_mut().take(dim - 1) {
                        *value *= 1.0 - options.learning_rate * options.l2_penalty;
                    }
                    if margin < 1.0 {
                        for (value, &xi) in w.iter_mut().zip(x) {
                            *value += options.learning_rate * y * xi;
                        }
                        w[dim - 1] += options.learning_rate * y;
                    }
                }
            }
        }

        if weights.iter().flatten().any(|v| !v.is_finite()) {
            return Err(HeraldError::training(
                "support-vector weights diverged to a non-finite value",
            ));
        }

        let parameters = LinearSvmParameters {
            vectorizer,
            labels,
            weights,
        };

        let correct = dataset
            .examples()
            .iter()
            .filter(|example| predict_with(&example.text, &parameters).label == example.label)
            .count();

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "train_accuracy".to_string(),
            correct as f64 / dataset.len() as f64,
        );
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
        let parameters: LinearSvmParameters = artifact.decode_parameters()?;
        Ok(predict_with(text, &parameters))
    }
}

fn predict_with(text: &str, parameters: &LinearSvmParameters) -> Prediction {
    let x = parameters.vectorizer.transform(text);
    let dim = x.len() + 1;

    let margins: Vec<f64> = parameters
        .weights
        .iter()
        .map(|w| dot(w, &x) + w[dim - 1])
        .collect();

    let probabilities = softmax(&margins);
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

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}
