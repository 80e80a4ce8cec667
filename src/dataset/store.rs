//! Persistent store for named datasets.

use std::sync::Arc;

use tracing::info;

use crate::dataset::format::{self, DatasetFormat, ImportMode};
use crate::dataset::types::Dataset;
use crate::error::{HeraldError, Result};
use crate::storage::Storage;

const DATASET_SUFFIX: &str = ".json";

/// Stores datasets as structured JSON blobs, one per dataset name.
///
/// Saves are atomic replaces: a reader loading concurrently sees either the
/// previous or the new dataset, never a torn file. Imports append by default;
/// replacing an existing dataset requires [`ImportMode::Replace`] explicitly.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    storage: Arc<dyn Storage>,
}

impl DatasetStore {
    /// Create a store over the given storage backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        DatasetStore { storage }
    }

    /// Load a dataset by name.
    pub fn load(&self, name: &str) -> Result<Dataset> {
        check_dataset_name(name)?;
        let blob = self
            .storage
            .read(&blob_name(name))
            .map_err(|_| HeraldError::not_found(format!("dataset {name}")))?;
        let payload = String::from_utf8(blob)
            .map_err(|e| HeraldError::validation(format!("dataset {name} is not UTF-8: {e}")))?;
        format::parse(name, DatasetFormat::Structured, &payload)
    }

    /// Save a dataset, atomically replacing any previous persisted form.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        check_dataset_name(&dataset.name)?;
        let payload = format::export(dataset, DatasetFormat::Structured)?;
        self.storage
            .write_atomic(&blob_name(&dataset.name), payload.as_bytes())?;
        info!(dataset = %dataset.name, examples = dataset.len(), "dataset saved");
        Ok(())
    }

    /// Parse `payload` and merge it into the named dataset.
    ///
    /// With [`ImportMode::Append`] the parsed examples are appended to the
    /// existing dataset (which is created if absent); existing `description`
    /// and `task_type` are kept. [`ImportMode::Replace`] discards the
    /// existing dataset entirely. Returns the saved dataset.
    pub fn import_examples(
        &self,
        name: &str,
        source_format: DatasetFormat,
        payload: &str,
        mode: ImportMode,
    ) -> Result<Dataset> {
        check_dataset_name(name)?;
        let incoming = format::parse(name, source_format, payload)?;

        let merged = match mode {
            ImportMode::Replace => incoming,
            ImportMode::Append => match self.load(name) {
                Ok(mut existing) => {
                    existing.extend(incoming.examples().to_vec())?;
                    existing
                }
                Err(HeraldError::NotFound(_)) => incoming,
                Err(e) => return Err(e),
            },
        };

        self.save(&merged)?;
        info!(
            dataset = %name,
            format = ?source_format,
            mode = ?mode,
            examples = merged.len(),
            "dataset import complete"
        );
        Ok(merged)
    }

    /// Export the named dataset in the given format.
    pub fn export(&self, name: &str, target_format: DatasetFormat) -> Result<String> {
        let dataset = self.load(name)?;
        format::export(&dataset, target_format)
    }

    /// Delete a dataset and the examples it owns.
    pub fn delete(&self, name: &str) -> Result<()> {
        check_dataset_name(name)?;
        self.storage
            .delete(&blob_name(name))
            .map_err(|_| HeraldError::not_found(format!("dataset {name}")))?;
        info!(dataset = %name, "dataset deleted");
        Ok(())
    }

    /// List stored dataset names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list()?
            .into_iter()
            .filter_map(|blob| {
                blob.strip_suffix(DATASET_SUFFIX)
                    .map(|name| name.to_string())
            })
            .collect())
    }
}

fn blob_name(dataset_name: &str) -> String {
    format!("{dataset_name}{DATASET_SUFFIX}")
}

/// Dataset names double as storage keys, so they are restricted to a safe
/// character set.
fn check_dataset_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(HeraldError::validation("dataset name cannot be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(HeraldError::validation(format!(
            "dataset name {name:?} may only contain alphanumerics, '_' and '-'"
        )));
    }
    Ok(())
}
