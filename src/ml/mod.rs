//! Trainable model backends and the training lifecycle.
//!
//! Four backends implement the [`ModelBackend`] contract: multinomial naive
//! bayes, one-vs-rest linear support-vector, random forest, and a compact
//! attention-based text encoder. The contract is deliberately small — train,
//! predict with a score, and a parameter blob that round-trips through the
//! artifact store — so backends can be swapped without touching the pipeline.
//!
//! Backend confidence scores are each backend's own calibration; a 0.6 from
//! naive bayes is not numerically comparable to a 0.6 from the transformer.

pub mod artifact;
pub mod backend;
pub mod linear_svm;
pub mod naive_bayes;
pub mod random_forest;
pub mod tfidf;
pub mod trainer;
pub mod transformer;

pub use artifact::{ArtifactHandle, ArtifactStore, ModelArtifact};
pub use backend::{ModelBackend, ModelType, Prediction, backend_for};
pub use tfidf::TfIdfVectorizer;
pub use trainer::{Trainer, TrainingEvent, TrainingPhase};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag for training runs.
///
/// The transformer backend checks it between epochs; traditional backends
/// train in one pass and only observe it before work starts. A cancelled run
/// leaves the previously active artifact untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
