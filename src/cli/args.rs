//! Command line argument parsing for the Herald CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::dataset::{DatasetFormat, ImportMode};
use crate::ml::backend::ModelType;

/// Herald - confidence-gated intent classification for text commands
#[derive(Parser, Debug, Clone)]
#[command(name = "herald")]
#[command(about = "Train intent classifiers and route text commands")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct HeraldArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Data directory holding datasets and trained models
    #[arg(short, long, default_value = "herald_data", env = "HERALD_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Pipeline configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl HeraldArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Output formats for command results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a small starter dataset of example commands
    #[command(name = "create-data")]
    CreateData(CreateDataArgs),

    /// Import examples into a dataset
    Import(ImportArgs),

    /// Export a dataset
    Export(ExportArgs),

    /// Train a model on a dataset
    Train(TrainArgs),

    /// Classify a text command
    Classify(ClassifyArgs),

    /// List stored datasets
    #[command(name = "list-datasets")]
    ListDatasets,

    /// List trained models for a dataset
    #[command(name = "list-models")]
    ListModels(ListModelsArgs),

    /// Delete one retained artifact version
    Prune(PruneArgs),
}

/// Arguments for creating the starter dataset
#[derive(Parser, Debug, Clone)]
pub struct CreateDataArgs {
    /// Dataset name
    #[arg(default_value = "custom_commands")]
    pub dataset: String,
}

/// Arguments for importing examples
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Target dataset name
    pub dataset: String,

    /// Input file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Input format
    #[arg(long, value_enum, default_value = "tabular")]
    pub source_format: DatasetFormat,

    /// Import mode; replacing an existing dataset must be explicit
    #[arg(long, value_enum, default_value = "append")]
    pub mode: ImportMode,
}

/// Arguments for exporting a dataset
#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Dataset name
    pub dataset: String,

    /// Output format
    #[arg(long, value_enum, default_value = "tabular")]
    pub target_format: DatasetFormat,

    /// Output file; stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Dataset name
    pub dataset: String,

    /// Model type to train
    #[arg(short, long, value_enum, default_value = "naive-bayes")]
    pub model: ModelType,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Training epochs (gradient-trained backends)
    #[arg(long)]
    pub epochs: Option<usize>,
}

/// Arguments for classification
#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    /// Text to classify
    pub text: String,

    /// Dataset whose models answer the query
    #[arg(short, long, default_value = "application_commands")]
    pub dataset: String,

    /// Override the configured model preference
    #[arg(short, long, value_enum)]
    pub model: Option<ModelType>,
}

/// Arguments for listing models
#[derive(Parser, Debug, Clone)]
pub struct ListModelsArgs {
    /// Dataset name
    pub dataset: String,
}

/// Arguments for pruning an artifact version
#[derive(Parser, Debug, Clone)]
pub struct PruneArgs {
    /// Dataset name
    pub dataset: String,

    /// Model type
    #[arg(short, long, value_enum)]
    pub model: ModelType,

    /// Version to delete
    #[arg(long)]
    pub version: u64,
}
