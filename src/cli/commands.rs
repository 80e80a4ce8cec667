//! Command implementations for the Herald CLI.

use std::fs;
use std::sync::Arc;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{HeraldConfig, TrainingOptions};
use crate::dataset::{Dataset, DatasetStore, TrainingExample};
use crate::error::Result;
use crate::ml::CancelToken;
use crate::ml::trainer::Trainer;
use crate::pipeline::{CommandProcessor, IntentClassifier, RuleMatcher};
use crate::registry::ModelRegistry;
use crate::storage::FileStorage;

/// Everything a subcommand needs, wired from the data directory and config.
struct Context {
    datasets: DatasetStore,
    registry: Arc<ModelRegistry>,
    config: HeraldConfig,
}

impl Context {
    fn open(args: &HeraldArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => HeraldConfig::from_json(&fs::read_to_string(path)?)?,
            None => HeraldConfig::default(),
        };
        let datasets = DatasetStore::new(Arc::new(FileStorage::new(
            args.data_dir.join("datasets"),
        )?));
        let registry = Arc::new(ModelRegistry::open(
            Arc::new(FileStorage::new(args.data_dir.join("models"))?),
            config.cache_capacity,
        )?);
        Ok(Context {
            datasets,
            registry,
            config,
        })
    }
}

/// Execute a CLI command.
pub fn execute_command(args: HeraldArgs) -> Result<()> {
    match &args.command {
        Command::CreateData(create_args) => create_data(create_args.clone(), &args),
        Command::Import(import_args) => import(import_args.clone(), &args),
        Command::Export(export_args) => export(export_args.clone(), &args),
        Command::Train(train_args) => train(train_args.clone(), &args),
        Command::Classify(classify_args) => classify(classify_args.clone(), &args),
        Command::ListDatasets => list_datasets(&args),
        Command::ListModels(list_args) => list_models(list_args.clone(), &args),
        Command::Prune(prune_args) => prune(prune_args.clone(), &args),
    }
}

/// Create a small starter dataset, mirroring the kind of custom commands a
/// user would add by hand.
fn create_data(cmd: CreateDataArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;

    let mut dataset = Dataset::new(&cmd.dataset);
    dataset.description = "Custom commands for specific user needs".to_string();
    dataset.task_type = "custom".to_string();
    for (text, label) in [
        ("open my coding setup", "dev_environment"),
        ("launch my coding tools", "dev_environment"),
        ("start my work day", "work_routine"),
        ("begin the work day", "work_routine"),
        ("evening relaxation mode", "relax_mode"),
        ("wind down for the evening", "relax_mode"),
    ] {
        dataset.push(TrainingExample::new(text, label, 1.0)?)?;
    }
    ctx.datasets.save(&dataset)?;

    output_result(
        &format!("Created dataset {} with {} examples", cmd.dataset, dataset.len()),
        &DatasetChangeResult {
            dataset: cmd.dataset,
            examples: dataset.len(),
        },
        args,
    )
}

fn import(cmd: ImportArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let payload = fs::read_to_string(&cmd.input)?;
    let merged = ctx
        .datasets
        .import_examples(&cmd.dataset, cmd.source_format, &payload, cmd.mode)?;

    output_result(
        &format!("Imported into {}: {} examples total", cmd.dataset, merged.len()),
        &DatasetChangeResult {
            dataset: cmd.dataset,
            examples: merged.len(),
        },
        args,
    )
}

fn export(cmd: ExportArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let payload = ctx.datasets.export(&cmd.dataset, cmd.target_format)?;

    match &cmd.output {
        Some(path) => {
            fs::write(path, &payload)?;
            if args.verbosity() > 0 && args.output_format == OutputFormat::Human {
                println!("Exported {} to {}", cmd.dataset, path.display());
            }
        }
        None => print!("{payload}"),
    }
    Ok(())
}

fn train(cmd: TrainArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let trainer = Trainer::new(ctx.datasets, ctx.registry);

    let mut options = TrainingOptions {
        seed: cmd.seed,
        ..TrainingOptions::default()
    };
    if let Some(epochs) = cmd.epochs {
        options.epochs = epochs;
    }

    let artifact = trainer.train(&cmd.dataset, cmd.model, &options, &CancelToken::new())?;

    let accuracy = artifact
        .metrics
        .get("train_accuracy")
        .copied()
        .unwrap_or_default();
    output_result(
        &format!(
            "Trained {}/{} v{} (train accuracy {:.2})",
            cmd.dataset, cmd.model, artifact.version, accuracy
        ),
        &TrainingResult {
            dataset: cmd.dataset,
            model: cmd.model,
            version: artifact.version,
            metrics: artifact.metrics.clone(),
        },
        args,
    )
}

fn classify(cmd: ClassifyArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let mut config = ctx.config;
    if let Some(model) = cmd.model {
        config.model_preference = model;
    }

    let processor = CommandProcessor::new(
        IntentClassifier::new(ctx.registry),
        RuleMatcher::with_default_rules()?,
        config,
        &cmd.dataset,
    );
    let decision = processor.process(&cmd.text)?;

    let mut message = format!(
        "{} (confidence {:.2}, {:?})",
        decision.result.label, decision.result.confidence, decision.result.source
    );
    if decision.decomposed {
        let parts: Vec<&str> = decision
            .sub_intents
            .iter()
            .map(|intent| intent.label.as_str())
            .collect();
        message.push_str(&format!("; decomposed into [{}]", parts.join(", ")));
    }
    output_result(
        &message,
        &ClassifyResult {
            text: cmd.text,
            decision,
        },
        args,
    )
}

fn list_datasets(args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let names = ctx.datasets.list()?;

    if args.output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if names.is_empty() {
        println!("No datasets found.");
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn list_models(cmd: ListModelsArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    let models: Vec<ModelEntry> = ctx
        .registry
        .list(&cmd.dataset)
        .into_iter()
        .map(|model| {
            let versions = ctx.registry.versions(&cmd.dataset, model);
            let active = versions.last().copied().unwrap_or_default();
            ModelEntry {
                model,
                versions,
                active,
            }
        })
        .collect();

    if args.output_format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ModelListing {
                dataset: cmd.dataset,
                models,
            })?
        );
    } else if models.is_empty() {
        println!("No trained models for {}.", cmd.dataset);
    } else {
        for entry in models {
            println!(
                "{} (active v{}, retained: {:?})",
                entry.model, entry.active, entry.versions
            );
        }
    }
    Ok(())
}

fn prune(cmd: PruneArgs, args: &HeraldArgs) -> Result<()> {
    let ctx = Context::open(args)?;
    ctx.registry.prune(&cmd.dataset, cmd.model, cmd.version)?;

    if args.verbosity() > 0 && args.output_format == OutputFormat::Human {
        println!("Pruned {}/{} v{}", cmd.dataset, cmd.model, cmd.version);
    }
    Ok(())
}
