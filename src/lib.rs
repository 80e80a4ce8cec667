//! # Herald
//!
//! Routes free-text user commands to intent labels by combining trainable
//! statistical classifiers with a deterministic rule-based fallback, gated
//! by a confidence threshold.
//!
//! ## Features
//!
//! - Named datasets of labeled examples with structured (JSON) and tabular
//!   (CSV) import/export
//! - Four pluggable model backends: naive bayes, linear support-vector,
//!   random forest, and a compact attention-based encoder
//! - Versioned, immutable model artifacts with an LRU-cached registry
//! - Deterministic rule fallback and a pure confidence threshold policy
//! - Compound-command decomposition with a fail-safe confidence bar
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use herald::config::{HeraldConfig, TrainingOptions};
//! use herald::dataset::DatasetStore;
//! use herald::error::Result;
//! use herald::ml::{CancelToken, ModelType, Trainer};
//! use herald::pipeline::{CommandProcessor, IntentClassifier, RuleMatcher};
//! use herald::registry::ModelRegistry;
//! use herald::storage::MemoryStorage;
//!
//! # fn main() -> Result<()> {
//! let datasets = DatasetStore::new(Arc::new(MemoryStorage::new()));
//! let registry = Arc::new(ModelRegistry::new(Arc::new(MemoryStorage::new()), 8));
//!
//! let trainer = Trainer::new(datasets.clone(), registry.clone());
//! trainer.train(
//!     "application_commands",
//!     ModelType::NaiveBayes,
//!     &TrainingOptions::default(),
//!     &CancelToken::new(),
//! )?;
//!
//! let processor = CommandProcessor::new(
//!     IntentClassifier::new(registry),
//!     RuleMatcher::with_default_rules()?,
//!     HeraldConfig::default(),
//!     "application_commands",
//! );
//! let decision = processor.process("open chrome please")?;
//! println!("{} ({:.2})", decision.result.label, decision.result.confidence);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod registry;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
