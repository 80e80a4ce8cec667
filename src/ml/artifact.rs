//! Trained model artifacts and their persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{HeraldError, Result};
use crate::ml::backend::ModelType;
use crate::storage::Storage;

/// The versioned output of one training run.
///
/// Immutable once registered. `parameters` is an opaque blob owned by the
/// backend that produced it; nothing outside that backend interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Dataset the artifact was trained on.
    pub dataset_name: String,
    /// Backend that produced it.
    pub model_type: ModelType,
    /// Monotonically increasing per (dataset, model type). Zero on a draft;
    /// the registry assigns the real version at registration.
    pub version: u64,
    /// Completion time of the training run.
    pub trained_at: DateTime<Utc>,
    /// Training metrics, at least `train_accuracy`. Transformer artifacts
    /// also carry `val_accuracy` and `val_loss`.
    pub metrics: BTreeMap<String, f64>,
    /// Backend-private learned state.
    pub parameters: Vec<u8>,
}

impl ModelArtifact {
    /// Assemble a draft artifact from a finished training pass.
    pub fn draft(
        dataset_name: &str,
        model_type: ModelType,
        metrics: BTreeMap<String, f64>,
        parameters: Vec<u8>,
    ) -> Self {
        ModelArtifact {
            dataset_name: dataset_name.to_string(),
            model_type,
            version: 0,
            trained_at: Utc::now(),
            metrics,
            parameters,
        }
    }

    /// Encode backend parameters into the opaque blob form.
    pub fn encode_parameters<T: Serialize>(parameters: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(parameters)?)
    }

    /// Decode the opaque blob back into backend parameters.
    pub fn decode_parameters<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.parameters)?)
    }

    /// Error if this artifact was not produced by `expected`.
    pub fn check_model_type(&self, expected: ModelType) -> Result<()> {
        if self.model_type != expected {
            return Err(HeraldError::validation(format!(
                "artifact for {}/{} handed to a {} backend",
                self.dataset_name, self.model_type, expected
            )));
        }
        Ok(())
    }
}

/// Storage name of a persisted artifact.
///
/// Handles are versioned: the registry assigns versions uniquely under its
/// lock, so two training runs can never collide on the same handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    /// Handle for a registered artifact.
    pub fn new(dataset_name: &str, model_type: ModelType, version: u64) -> Self {
        ArtifactHandle(format!(
            "{dataset_name}__{}__v{version}.artifact",
            model_type.key()
        ))
    }

    /// Reconstruct a handle from a storage name, e.g. while scanning
    /// existing storage.
    pub fn from_name(name: &str) -> Self {
        ArtifactHandle(name.to_string())
    }

    /// The underlying storage name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Persists artifacts through the storage abstraction.
///
/// Round-trip exact: restoring a persisted artifact yields byte-identical
/// parameters, so predictions before and after a persist/restore cycle are
/// identical.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    storage: Arc<dyn Storage>,
}

impl ArtifactStore {
    /// Create a store over the given storage backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        ArtifactStore { storage }
    }

    /// Persist an artifact under its versioned handle.
    pub fn persist(&self, artifact: &ModelArtifact) -> Result<ArtifactHandle> {
        let handle =
            ArtifactHandle::new(&artifact.dataset_name, artifact.model_type, artifact.version);
        let blob = bincode::serialize(artifact)?;
        self.storage.write_atomic(handle.name(), &blob)?;
        Ok(handle)
    }

    /// Restore an artifact from its handle.
    pub fn restore(&self, handle: &ArtifactHandle) -> Result<ModelArtifact> {
        let blob = self
            .storage
            .read(handle.name())
            .map_err(|_| HeraldError::not_found(format!("artifact {}", handle.name())))?;
        Ok(bincode::deserialize(&blob)?)
    }

    /// Delete a persisted artifact.
    pub fn delete(&self, handle: &ArtifactHandle) -> Result<()> {
        self.storage.delete(handle.name())
    }
}
