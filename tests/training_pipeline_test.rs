//! Training-to-prediction pipeline scenarios.

use std::sync::Arc;

use herald::config::TrainingOptions;
use herald::dataset::{Dataset, DatasetStore, TrainingExample};
use herald::error::Result;
use herald::ml::{ArtifactStore, CancelToken, ModelType, Trainer, backend_for};
use herald::registry::ModelRegistry;
use herald::storage::MemoryStorage;

fn app_commands() -> Result<Dataset> {
    let mut dataset = Dataset::new("application_commands");
    dataset.task_type = "intent_classification".to_string();
    for (text, label) in [
        ("open chrome", "open_app"),
        ("start notepad", "open_app"),
        ("open firefox", "open_app"),
        ("open calculator", "open_app"),
        ("start chrome", "open_app"),
        ("close chrome", "close_app"),
        ("close firefox", "close_app"),
        ("close notepad", "close_app"),
        ("quit chrome", "close_app"),
    ] {
        dataset.push(TrainingExample::new(text, label, 1.0)?)?;
    }
    Ok(dataset)
}

fn fixture() -> Result<(Trainer, Arc<ModelRegistry>)> {
    let datasets = DatasetStore::new(Arc::new(MemoryStorage::new()));
    datasets.save(&app_commands()?)?;
    let registry = Arc::new(ModelRegistry::new(Arc::new(MemoryStorage::new()), 8));
    Ok((Trainer::new(datasets, registry.clone()), registry))
}

#[test]
fn test_idempotent_training_with_fixed_seed() -> Result<()> {
    let (trainer, _) = fixture()?;
    let options = TrainingOptions::default();

    let probes = [
        "open chrome please",
        "close firefox now",
        "launch the music player",
    ];

    for model_type in [
        ModelType::NaiveBayes,
        ModelType::SupportVector,
        ModelType::RandomForest,
        ModelType::Transformer,
    ] {
        let first = trainer.train(
            "application_commands",
            model_type,
            &options,
            &CancelToken::new(),
        )?;
        let second = trainer.train(
            "application_commands",
            model_type,
            &options,
            &CancelToken::new(),
        )?;

        // Version numbers differ, prediction behavior does not.
        assert_eq!(first.version + 1, second.version);
        let backend = backend_for(model_type);
        for probe in probes {
            let a = backend.predict(probe, &first)?;
            let b = backend.predict(probe, &second)?;
            assert_eq!(a.label, b.label, "{model_type} label drifted for {probe:?}");
            assert_eq!(
                a.confidence, b.confidence,
                "{model_type} confidence drifted for {probe:?}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_persist_restore_prediction_equality() -> Result<()> {
    let (trainer, _) = fixture()?;
    let store = ArtifactStore::new(Arc::new(MemoryStorage::new()));

    for model_type in [
        ModelType::NaiveBayes,
        ModelType::SupportVector,
        ModelType::RandomForest,
        ModelType::Transformer,
    ] {
        let artifact = trainer.train(
            "application_commands",
            model_type,
            &TrainingOptions::default(),
            &CancelToken::new(),
        )?;

        let handle = store.persist(&artifact)?;
        let restored = store.restore(&handle)?;

        let backend = backend_for(model_type);
        for probe in ["open chrome", "close notepad", "what is the weather"] {
            let before = backend.predict(probe, &artifact)?;
            let after = backend.predict(probe, &restored)?;
            assert_eq!(before.label, after.label);
            assert_eq!(before.confidence, after.confidence);
        }
    }
    Ok(())
}

#[test]
fn test_every_backend_reports_train_accuracy() -> Result<()> {
    let (trainer, _) = fixture()?;

    for model_type in [
        ModelType::NaiveBayes,
        ModelType::SupportVector,
        ModelType::RandomForest,
        ModelType::Transformer,
    ] {
        let artifact = trainer.train(
            "application_commands",
            model_type,
            &TrainingOptions::default(),
            &CancelToken::new(),
        )?;
        assert!(
            artifact.metrics.contains_key("train_accuracy"),
            "{model_type} artifact missing train_accuracy"
        );
    }
    Ok(())
}

#[test]
fn test_transformer_reports_validation_metrics() -> Result<()> {
    let (trainer, _) = fixture()?;
    let artifact = trainer.train(
        "application_commands",
        ModelType::Transformer,
        &TrainingOptions::default(),
        &CancelToken::new(),
    )?;
    assert!(artifact.metrics.contains_key("val_accuracy"));
    assert!(artifact.metrics.contains_key("val_loss"));
    Ok(())
}

#[test]
fn test_cancelled_run_leaves_active_artifact_untouched() -> Result<()> {
    let (trainer, registry) = fixture()?;

    let first = trainer.train(
        "application_commands",
        ModelType::Transformer,
        &TrainingOptions::default(),
        &CancelToken::new(),
    )?;

    let cancelled = CancelToken::new();
    cancelled.cancel();
    assert!(
        trainer
            .train(
                "application_commands",
                ModelType::Transformer,
                &TrainingOptions::default(),
                &cancelled,
            )
            .is_err()
    );

    let active = registry.get_active("application_commands", ModelType::Transformer)?;
    assert_eq!(active.version, first.version);
    Ok(())
}

#[test]
fn test_empty_dataset_rejects_training() -> Result<()> {
    let datasets = DatasetStore::new(Arc::new(MemoryStorage::new()));
    datasets.save(&Dataset::new("empty"))?;
    let registry = Arc::new(ModelRegistry::new(Arc::new(MemoryStorage::new()), 8));
    let trainer = Trainer::new(datasets, registry);

    let result = trainer.train(
        "empty",
        ModelType::NaiveBayes,
        &TrainingOptions::default(),
        &CancelToken::new(),
    );
    assert!(matches!(
        result,
        Err(herald::error::HeraldError::InsufficientData(_))
    ));
    Ok(())
}
