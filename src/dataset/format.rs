//! Dataset serialization formats.
//!
//! Two interchange forms are supported:
//!
//! - **Structured**: a JSON record `{description, task_type, data: [...]}`
//!   where each data row is `{text, label, confidence}`.
//! - **Tabular**: CSV with header `text,label,confidence`, one row per
//!   example, text quoted with doubled inner quotes.
//!
//! Conversion between the two is lossless for `(text, label, confidence)`
//! tuples, in order. The tabular form does not carry `description` and
//! `task_type`; they default to empty on tabular import.

use serde::{Deserialize, Serialize};

use crate::dataset::types::{Dataset, TrainingExample};
use crate::error::{HeraldError, Result};

/// Supported dataset serializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// Nested JSON record with description, task type, and example list.
    Structured,
    /// Flat CSV, one row per example.
    Tabular,
}

/// Import behavior when the target dataset already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Append parsed examples to the existing dataset (the default).
    Append,
    /// Discard existing examples first. Must be requested explicitly.
    Replace,
}

/// On-disk shape of the structured form. The dataset name is carried by the
/// storage key, not the payload.
#[derive(Debug, Serialize, Deserialize)]
struct StructuredFile {
    #[serde(default)]
    description: String,
    #[serde(default)]
    task_type: String,
    data: Vec<TrainingExample>,
}

const TABULAR_HEADER: &str = "text,label,confidence";

/// Serialize a dataset into the given format.
pub fn export(dataset: &Dataset, format: DatasetFormat) -> Result<String> {
    match format {
        DatasetFormat::Structured => {
            let file = StructuredFile {
                description: dataset.description.clone(),
                task_type: dataset.task_type.clone(),
                data: dataset.examples().to_vec(),
            };
            Ok(serde_json::to_string_pretty(&file)?)
        }
        DatasetFormat::Tabular => {
            let mut out = String::with_capacity(64 * (dataset.len() + 1));
            out.push_str(TABULAR_HEADER);
            out.push('\n');
            for example in dataset.examples() {
                let text = example.text.replace('"', "\"\"");
                out.push_str(&format!(
                    "\"{}\",{},{}\n",
                    text,
                    example.label,
                    format_confidence(example.annotation_confidence)
                ));
            }
            Ok(out)
        }
    }
}

/// Parse a payload in the given format into a fresh dataset named `name`.
pub fn parse(name: &str, format: DatasetFormat, payload: &str) -> Result<Dataset> {
    match format {
        DatasetFormat::Structured => parse_structured(name, payload),
        DatasetFormat::Tabular => parse_tabular(name, payload),
    }
}

fn parse_structured(name: &str, payload: &str) -> Result<Dataset> {
    let file: StructuredFile = serde_json::from_str(payload)
        .map_err(|e| HeraldError::validation(format!("invalid structured payload: {e}")))?;
    let mut dataset = Dataset::new(name);
    dataset.description = file.description;
    dataset.task_type = file.task_type;
    dataset.extend(file.data)?;
    Ok(dataset)
}

fn parse_tabular(name: &str, payload: &str) -> Result<Dataset> {
    let mut lines = payload.lines();
    match lines.next() {
        Some(header) if header.trim() == TABULAR_HEADER => {}
        Some(header) => {
            return Err(HeraldError::validation(format!(
                "unexpected tabular header {header:?}, expected {TABULAR_HEADER:?}"
            )));
        }
        None => return Err(HeraldError::validation("empty tabular payload")),
    }

    let mut dataset = Dataset::new(name);
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(line)
            .map_err(|e| HeraldError::validation(format!("row {}: {e}", line_no + 2)))?;
        if fields.len() != 3 {
            return Err(HeraldError::validation(format!(
                "row {}: expected 3 fields, found {}",
                line_no + 2,
                fields.len()
            )));
        }
        let confidence: f64 = fields[2].trim().parse().map_err(|_| {
            HeraldError::validation(format!(
                "row {}: confidence {:?} is not a number",
                line_no + 2,
                fields[2]
            ))
        })?;
        let example = TrainingExample::new(fields[0].clone(), fields[1].clone(), confidence)
            .map_err(|e| HeraldError::validation(format!("row {}: {e}", line_no + 2)))?;
        dataset.push(example)?;
    }
    Ok(dataset)
}

/// Split one CSV row into fields, honoring quoted fields with doubled quotes.
fn split_row(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut field));
                }
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

/// Format a confidence with at least two decimal places, without losing
/// precision on values that need more.
fn format_confidence(value: f64) -> String {
    let s = format!("{value}");
    match s.find('.') {
        None => format!("{s}.00"),
        Some(idx) if s.len() - idx - 1 < 2 => format!("{s}0"),
        Some(_) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> Dataset {
        let mut dataset = Dataset::new("commands");
        dataset.description = "app launch commands".to_string();
        dataset.task_type = "intent_classification".to_string();
        dataset
            .push(TrainingExample::new("open chrome", "open_app", 1.0).unwrap())
            .unwrap();
        dataset
            .push(TrainingExample::new("say \"hello\" aloud", "speak", 0.85).unwrap())
            .unwrap();
        dataset
    }

    #[test]
    fn test_structured_roundtrip() {
        let dataset = sample_dataset();
        let payload = export(&dataset, DatasetFormat::Structured).unwrap();
        let parsed = parse("commands", DatasetFormat::Structured, &payload).unwrap();
        assert_eq!(parsed, dataset);
    }

    #[test]
    fn test_tabular_roundtrip_preserves_tuples() {
        let dataset = sample_dataset();
        let payload = export(&dataset, DatasetFormat::Tabular).unwrap();
        let parsed = parse("fresh", DatasetFormat::Tabular, &payload).unwrap();

        assert_eq!(parsed.len(), dataset.len());
        for (a, b) in parsed.examples().iter().zip(dataset.examples()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.label, b.label);
            assert_eq!(a.annotation_confidence, b.annotation_confidence);
        }
        // Tabular form does not carry these.
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.task_type, "");
    }

    #[test]
    fn test_tabular_export_format() {
        let dataset = sample_dataset();
        let payload = export(&dataset, DatasetFormat::Tabular).unwrap();
        let mut lines = payload.lines();
        assert_eq!(lines.next(), Some("text,label,confidence"));
        assert_eq!(lines.next(), Some("\"open chrome\",open_app,1.00"));
        assert_eq!(lines.next(), Some("\"say \"\"hello\"\" aloud\",speak,0.85"));
    }

    #[test]
    fn test_tabular_rejects_bad_rows() {
        let missing_field = "text,label,confidence\n\"open chrome\",open_app\n";
        assert!(matches!(
            parse("x", DatasetFormat::Tabular, missing_field),
            Err(HeraldError::Validation(_))
        ));

        let bad_confidence = "text,label,confidence\n\"open chrome\",open_app,high\n";
        assert!(matches!(
            parse("x", DatasetFormat::Tabular, bad_confidence),
            Err(HeraldError::Validation(_))
        ));

        let out_of_range = "text,label,confidence\n\"open chrome\",open_app,1.5\n";
        assert!(matches!(
            parse("x", DatasetFormat::Tabular, out_of_range),
            Err(HeraldError::Validation(_))
        ));
    }

    #[test]
    fn test_structured_rejects_missing_label() {
        let payload = r#"{"description":"","task_type":"","data":[{"text":"open chrome","confidence":1.0}]}"#;
        assert!(matches!(
            parse("x", DatasetFormat::Structured, payload),
            Err(HeraldError::Validation(_))
        ));
    }

    #[test]
    fn test_format_confidence_padding() {
        assert_eq!(format_confidence(1.0), "1.00");
        assert_eq!(format_confidence(0.5), "0.50");
        assert_eq!(format_confidence(0.85), "0.85");
        assert_eq!(format_confidence(0.955), "0.955");
    }
}
