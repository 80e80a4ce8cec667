//! Labeled training data: datasets, serialization formats, and the store.
//!
//! A [`Dataset`] is a named, ordered collection of [`TrainingExample`]s for
//! one task. The [`DatasetStore`] persists datasets through the storage
//! abstraction with atomic replace, and converts between the two supported
//! serializations (structured JSON and tabular CSV).

pub mod format;
pub mod store;
pub mod types;

pub use format::{DatasetFormat, ImportMode};
pub use store::DatasetStore;
pub use types::{Dataset, TrainingExample};
