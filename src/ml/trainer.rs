//! Training orchestration.
//!
//! The trainer runs one training pass end to end: take the per-key guard,
//! load the dataset, train the backend, and register the artifact. The
//! registry swap happens only after the backend fully succeeds, so
//! predictions against the previously active artifact are never disturbed
//! by an in-flight or failed run.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::TrainingOptions;
use crate::dataset::DatasetStore;
use crate::error::{HeraldError, Result};
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::backend::{ModelType, backend_for};
use crate::registry::ModelRegistry;

/// Lifecycle phase of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    Started,
    Completed,
    Failed,
    Cancelled,
}

/// Structured metadata describing one training lifecycle event.
///
/// Emitted for an external log collaborator to render; the core never
/// formats or writes log files itself.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingEvent {
    pub run_id: Uuid,
    pub dataset_name: String,
    pub model_type: ModelType,
    pub phase: TrainingPhase,
    /// Assigned on completion.
    pub version: Option<u64>,
    pub metrics: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

/// Runs training passes and publishes the results to the registry.
pub struct Trainer {
    datasets: DatasetStore,
    registry: Arc<ModelRegistry>,
    in_progress: Mutex<AHashSet<(String, ModelType)>>,
    events: Option<Sender<TrainingEvent>>,
}

impl Trainer {
    /// Create a trainer over a dataset store and registry.
    pub fn new(datasets: DatasetStore, registry: Arc<ModelRegistry>) -> Self {
        Trainer {
            datasets,
            registry,
            in_progress: Mutex::new(AHashSet::new()),
            events: None,
        }
    }

    /// Attach a channel receiving [`TrainingEvent`]s.
    pub fn with_events(mut self, events: Sender<TrainingEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Train `model_type` on the named dataset and register the result.
    ///
    /// Exactly one run per (dataset, model type) key may proceed at a time;
    /// a concurrent request for the same key fails with
    /// [`HeraldError::TrainingInProgress`] rather than being merged or
    /// queued. A failed or cancelled run leaves the previously active
    /// artifact untouched.
    pub fn train(
        &self,
        dataset_name: &str,
        model_type: ModelType,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<Arc<ModelArtifact>> {
        let key = (dataset_name.to_string(), model_type);
        let _guard = TrainingGuard::acquire(&self.in_progress, key)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("train", %run_id, dataset = %dataset_name, model = %model_type);
        let _entered = span.enter();

        let dataset = self.datasets.load(dataset_name)?;
        self.emit(run_id, dataset_name, model_type, TrainingPhase::Started, None, BTreeMap::new());

        let backend = backend_for(model_type);
        let draft = match backend.train(&dataset, options, cancel) {
            Ok(draft) => draft,
            Err(e) => {
                let phase = match &e {
                    HeraldError::Cancelled(_) => TrainingPhase::Cancelled,
                    _ => TrainingPhase::Failed,
                };
                warn!(error = %e, "training run did not complete");
                self.emit(run_id, dataset_name, model_type, phase, None, BTreeMap::new());
                return Err(e);
            }
        };

        let artifact = self.registry.register(draft)?;
        info!(version = artifact.version, "training run complete");
        self.emit(
            run_id,
            dataset_name,
            model_type,
            TrainingPhase::Completed,
            Some(artifact.version),
            artifact.metrics.clone(),
        );
        Ok(artifact)
    }

    fn emit(
        &self,
        run_id: Uuid,
        dataset_name: &str,
        model_type: ModelType,
        phase: TrainingPhase,
        version: Option<u64>,
        metrics: BTreeMap<String, f64>,
    ) {
        if let Some(events) = &self.events {
            let _ = events.send(TrainingEvent {
                run_id,
                dataset_name: dataset_name.to_string(),
                model_type,
                phase,
                version,
                metrics,
                timestamp: Utc::now(),
            });
        }
    }
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("in_progress", &self.in_progress.lock().len())
            .finish()
    }
}

/// Releases the per-key training slot on drop, covering both the success and
/// error paths.
struct TrainingGuard<'a> {
    in_progress: &'a Mutex<AHashSet<(String, ModelType)>>,
    key: (String, ModelType),
}

impl<'a> TrainingGuard<'a> {
    fn acquire(
        in_progress: &'a Mutex<AHashSet<(String, ModelType)>>,
        key: (String, ModelType),
    ) -> Result<Self> {
        let mut held = in_progress.lock();
        if !held.insert(key.clone()) {
            return Err(HeraldError::training_in_progress(format!(
                "{}/{}",
                key.0, key.1
            )));
        }
        Ok(TrainingGuard { in_progress, key })
    }
}

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.in_progress.lock().remove(&self.key);
    }
}
