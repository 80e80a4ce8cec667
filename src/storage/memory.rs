//! In-memory storage implementation for testing and ephemeral pipelines.

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::{HeraldError, Result};
use crate::storage::{Storage, check_name};

/// An in-memory storage implementation.
///
/// Useful for tests and for running the pipeline without touching disk.
/// Uses `Box<[u8]>` for the stored blobs since they are immutable once
/// written.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<AHashMap<String, Box<[u8]>>>,
}

impl MemoryStorage {
    /// Create a new, empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of blobs stored.
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().len()
    }

    /// Get the total size of all blobs.
    pub fn total_size(&self) -> u64 {
        self.blobs.lock().values().map(|data| data.len() as u64).sum()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        let blobs = self.blobs.lock();
        blobs
            .get(name)
            .map(|data| data.to_vec())
            .ok_or_else(|| HeraldError::not_found(format!("blob {name}")))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        self.blobs.lock().insert(name.to_string(), data.into());
        Ok(())
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        // A single insert under the lock is already atomic for readers.
        self.write(name, data)
    }

    fn exists(&self, name: &str) -> bool {
        self.blobs.lock().contains_key(name)
    }

    fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        self.blobs
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| HeraldError::not_found(format!("blob {name}")))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.blobs.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
