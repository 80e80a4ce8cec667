//! Error types for the Herald library.
//!
//! All errors are represented by the [`HeraldError`] enum. Variants map the
//! failure modes of the classification pipeline: dataset validation, training
//! preconditions, backend-internal training failures, missing models, and the
//! ambient storage/serialization errors underneath them.
//!
//! # Examples
//!
//! ```
//! use herald::error::{HeraldError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(HeraldError::validation("confidence out of range"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Herald operations.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed dataset or import row. Fatal to the operation, not the process.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too few examples or labels to train. Surfaced to the caller, no retry.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Backend-internal numerical failure. Retryable with different parameters.
    #[error("Training error: {0}")]
    Training(String),

    /// A training run for the same (dataset, model type) key is already active.
    #[error("Training in progress: {0}")]
    TrainingInProgress(String),

    /// Prediction requested against an untrained (dataset, model type) key.
    #[error("No trained model: {0}")]
    NoTrainedModel(String),

    /// Unknown dataset or artifact reference.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Training run cancelled cooperatively.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary artifact encoding/decoding errors
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with HeraldError.
pub type Result<T> = std::result::Result<T, HeraldError>;

impl HeraldError {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        HeraldError::Validation(msg.into())
    }

    /// Create a new insufficient-data error.
    pub fn insufficient_data<S: Into<String>>(msg: S) -> Self {
        HeraldError::InsufficientData(msg.into())
    }

    /// Create a new training error.
    pub fn training<S: Into<String>>(msg: S) -> Self {
        HeraldError::Training(msg.into())
    }

    /// Create a new training-in-progress error.
    pub fn training_in_progress<S: Into<String>>(msg: S) -> Self {
        HeraldError::TrainingInProgress(msg.into())
    }

    /// Create a new no-trained-model error.
    pub fn no_trained_model<S: Into<String>>(msg: S) -> Self {
        HeraldError::NoTrainedModel(msg.into())
    }

    /// Create a new not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        HeraldError::NotFound(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        HeraldError::Cancelled(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        HeraldError::Storage(msg.into())
    }
}
