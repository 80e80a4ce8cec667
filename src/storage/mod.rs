//! Storage abstraction for datasets and model artifacts.
//!
//! Provides a pluggable interface for named-blob storage so the dataset store
//! and artifact store can run against the file system in production and
//! against memory in tests. Writes that replace existing data go through
//! [`Storage::write_atomic`], which must never expose a partially written
//! blob to readers.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::{HeraldError, Result};

/// A trait for storage backends that store and retrieve named blobs.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Read the full contents of a named blob.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Write a named blob, creating or overwriting it.
    fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Atomically replace a named blob. Readers observe either the old or the
    /// new contents, never a partial write.
    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Check if a blob exists.
    fn exists(&self, name: &str) -> bool;

    /// Delete a blob.
    fn delete(&self, name: &str) -> Result<()>;

    /// List all blob names in the storage, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Validate a blob name before it reaches a backend.
///
/// Names are flat: no path separators, no leading dots, not empty.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(HeraldError::storage("blob name cannot be empty"));
    }
    if name.starts_with('.') {
        return Err(HeraldError::storage(format!(
            "blob name cannot start with a dot: {name}"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(HeraldError::storage(format!(
            "blob name cannot contain path separators: {name}"
        )));
    }
    Ok(())
}
