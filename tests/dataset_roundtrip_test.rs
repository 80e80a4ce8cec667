//! Dataset import/export round-trip scenarios.

use std::sync::Arc;

use herald::dataset::{Dataset, DatasetFormat, DatasetStore, ImportMode, TrainingExample};
use herald::error::Result;
use herald::storage::{FileStorage, MemoryStorage};
use tempfile::TempDir;

fn command_dataset() -> Result<Dataset> {
    let mut dataset = Dataset::new("application_commands");
    dataset.description = "Commands for opening and closing applications".to_string();
    dataset.task_type = "intent_classification".to_string();
    for (text, label, confidence) in [
        ("open chrome", "open_app", 1.0),
        ("start notepad", "open_app", 1.0),
        ("close chrome", "close_app", 1.0),
        ("please say \"done\" when finished", "speak", 0.85),
        ("maybe open the calculator", "open_app", 0.6),
    ] {
        dataset.push(TrainingExample::new(text, label, confidence)?)?;
    }
    Ok(dataset)
}

#[test]
fn test_tabular_export_reimports_identically() -> Result<()> {
    let store = DatasetStore::new(Arc::new(MemoryStorage::new()));
    let original = command_dataset()?;
    store.save(&original)?;

    // Export to the tabular form and import into a fresh dataset.
    let payload = store.export("application_commands", DatasetFormat::Tabular)?;
    let fresh = store.import_examples(
        "reimported",
        DatasetFormat::Tabular,
        &payload,
        ImportMode::Append,
    )?;

    // Identical (text, label, confidence) tuples, in order.
    assert_eq!(fresh.len(), original.len());
    for (a, b) in fresh.examples().iter().zip(original.examples()) {
        assert_eq!(a.text, b.text);
        assert_eq!(a.label, b.label);
        assert_eq!(a.annotation_confidence, b.annotation_confidence);
    }

    // The tabular form does not carry dataset metadata.
    assert_eq!(fresh.description, "");
    assert_eq!(fresh.task_type, "");
    Ok(())
}

#[test]
fn test_structured_export_preserves_metadata() -> Result<()> {
    let store = DatasetStore::new(Arc::new(MemoryStorage::new()));
    let original = command_dataset()?;
    store.save(&original)?;

    let payload = store.export("application_commands", DatasetFormat::Structured)?;
    let fresh = store.import_examples(
        "reimported",
        DatasetFormat::Structured,
        &payload,
        ImportMode::Append,
    )?;

    assert_eq!(fresh.description, original.description);
    assert_eq!(fresh.task_type, original.task_type);
    assert_eq!(fresh.examples(), original.examples());
    Ok(())
}

#[test]
fn test_roundtrip_through_file_storage() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store = DatasetStore::new(Arc::new(FileStorage::new(dir.path())?));

    let original = command_dataset()?;
    store.save(&original)?;

    // A second save atomically replaces the first.
    let mut updated = original.clone();
    updated.push(TrainingExample::new("quit chrome", "close_app", 1.0)?)?;
    store.save(&updated)?;

    let loaded = store.load("application_commands")?;
    assert_eq!(loaded.len(), original.len() + 1);
    assert_eq!(store.list()?, vec!["application_commands"]);
    Ok(())
}

#[test]
fn test_import_rejects_bad_rows_without_partial_writes() -> Result<()> {
    let store = DatasetStore::new(Arc::new(MemoryStorage::new()));
    store.save(&command_dataset()?)?;

    // Confidence outside [0, 1] fails validation; the stored dataset is
    // untouched.
    let payload = "text,label,confidence\n\"open spotify\",open_app,1.50\n";
    let result = store.import_examples(
        "application_commands",
        DatasetFormat::Tabular,
        payload,
        ImportMode::Append,
    );
    assert!(result.is_err());

    let dataset = store.load("application_commands")?;
    assert_eq!(dataset.len(), command_dataset()?.len());
    Ok(())
}
