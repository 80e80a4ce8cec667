//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{HeraldArgs, OutputFormat};
use crate::error::Result;
use crate::ml::backend::ModelType;
use crate::pipeline::Decision;

/// Result structure for dataset creation/import.
#[derive(Debug, Serialize)]
pub struct DatasetChangeResult {
    pub dataset: String,
    pub examples: usize,
}

/// Result structure for training.
#[derive(Debug, Serialize)]
pub struct TrainingResult {
    pub dataset: String,
    pub model: ModelType,
    pub version: u64,
    pub metrics: std::collections::BTreeMap<String, f64>,
}

/// Result structure for classification.
#[derive(Debug, Serialize)]
pub struct ClassifyResult {
    pub text: String,
    pub decision: Decision,
}

/// Result structure for model listings.
#[derive(Debug, Serialize)]
pub struct ModelListing {
    pub dataset: String,
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub model: ModelType,
    pub versions: Vec<u64>,
    pub active: u64,
}

/// Print a command result in the selected output format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &HeraldArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
            }
        }
    }
    Ok(())
}
