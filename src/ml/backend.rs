//! The polymorphic model backend contract.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TrainingOptions;
use crate::dataset::Dataset;
use crate::error::{HeraldError, Result};
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::linear_svm::LinearSvmBackend;
use crate::ml::naive_bayes::NaiveBayesBackend;
use crate::ml::random_forest::RandomForestBackend;
use crate::ml::transformer::TransformerBackend;

/// The supported model backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Multinomial naive bayes over token counts. Fast, deterministic.
    NaiveBayes,
    /// One-vs-rest linear SVM trained by seeded subgradient descent.
    SupportVector,
    /// Bagged decision trees over TF-IDF features.
    RandomForest,
    /// Compact attention-based encoder trained over epochs; reports held-out
    /// validation metrics and supports epoch-boundary cancellation.
    Transformer,
}

impl ModelType {
    /// All supported types, in a stable order.
    pub fn all() -> &'static [ModelType] {
        &[
            ModelType::NaiveBayes,
            ModelType::SupportVector,
            ModelType::RandomForest,
            ModelType::Transformer,
        ]
    }

    /// Stable lowercase key used in storage handles and CLI output.
    pub fn key(&self) -> &'static str {
        match self {
            ModelType::NaiveBayes => "naive_bayes",
            ModelType::SupportVector => "support_vector",
            ModelType::RandomForest => "random_forest",
            ModelType::Transformer => "transformer",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelType {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "naive_bayes" => Ok(ModelType::NaiveBayes),
            "support_vector" => Ok(ModelType::SupportVector),
            "random_forest" => Ok(ModelType::RandomForest),
            "transformer" => Ok(ModelType::Transformer),
            other => Err(HeraldError::validation(format!(
                "unknown model type {other:?}"
            ))),
        }
    }
}

/// One backend prediction for one input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Winning label.
    pub label: String,
    /// Backend-calibrated probability-like score in `[0, 1]`.
    pub confidence: f64,
    /// Per-label scores. Sorted map so serialized output is stable.
    pub raw_scores: BTreeMap<String, f64>,
}

/// A trainable classifier algorithm.
///
/// Implementations must be deterministic: the same dataset, options, and
/// seed yield an artifact with identical prediction behavior, and the same
/// artifact and text always yield the same prediction.
pub trait ModelBackend: Send + Sync {
    /// Which model type this backend implements.
    fn model_type(&self) -> ModelType;

    /// Train on a dataset, producing an artifact draft. The registry assigns
    /// the final version on registration.
    ///
    /// Fails with [`HeraldError::InsufficientData`] if the dataset is empty
    /// or any label has fewer than two examples, and with
    /// [`HeraldError::Training`] on internal numerical failure.
    fn train(
        &self,
        dataset: &Dataset,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact>;

    /// Score `text` against the artifact's learned labels.
    fn predict(&self, text: &str, artifact: &ModelArtifact) -> Result<Prediction>;
}

/// Construct the backend for a model type. Backends are stateless; all
/// learned state lives in the artifact.
pub fn backend_for(model_type: ModelType) -> Box<dyn ModelBackend> {
    match model_type {
        ModelType::NaiveBayes => Box::new(NaiveBayesBackend),
        ModelType::SupportVector => Box::new(LinearSvmBackend),
        ModelType::RandomForest => Box::new(RandomForestBackend),
        ModelType::Transformer => Box::new(TransformerBackend),
    }
}

/// Shared training precondition: a non-empty dataset with at least two
/// examples for every label, so every backend can hold data out for
/// evaluation.
pub(crate) fn check_trainable(dataset: &Dataset) -> Result<()> {
    if dataset.is_empty() {
        return Err(HeraldError::insufficient_data(format!(
            "dataset {} has no examples",
            dataset.name
        )));
    }
    for (label, count) in dataset.label_counts() {
        if count < 2 {
            return Err(HeraldError::insufficient_data(format!(
                "label {:?} has {} example(s) in dataset {}; at least 2 required",
                label, count, dataset.name
            )));
        }
    }
    Ok(())
}

/// Guard shared by the one-pass backends: they never start work after
/// cancellation, and otherwise run to completion.
pub(crate) fn check_not_cancelled(cancel: &CancelToken, model_type: ModelType) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(HeraldError::cancelled(format!(
            "{model_type} training cancelled before start"
        )));
    }
    Ok(())
}
