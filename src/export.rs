/// Export Module
///
/// Writes a collection's records to `<collection>.csv` or `<collection>.json`.
///
/// ## CSV layout
///
/// The header is the union of all record keys in first-seen order. Null and
/// missing values are empty cells, strings are written as-is, and nested
/// arrays or objects are JSON-encoded into a single cell.

use crate::core::record::collect_columns;
use crate::core::{PolydbError, Record, Result};
use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output file format for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Csv, ExportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = PolydbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(PolydbError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Where an export was written and how many records it holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub records: usize,
}

/// Writes `records` into `dir`, creating the directory if needed.
pub fn write_export(
    records: &[Record],
    collection: &str,
    format: ExportFormat,
    dir: &Path,
) -> Result<ExportSummary> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", file_stem(collection), format.extension()));
    let file = File::create(&path)?;
    match format {
        ExportFormat::Csv => write_csv(records, file)?,
        ExportFormat::Json => write_json(records, file)?,
    }
    Ok(ExportSummary {
        path,
        records: records.len(),
    })
}

/// Collection names may contain path separators; keep the file in `dir`.
fn file_stem(collection: &str) -> String {
    collection.replace(['/', '\\'], "_")
}

pub fn write_json<W: Write>(records: &[Record], mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, records)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(records: &[Record], out: W) -> Result<()> {
    let columns = collect_columns(records);
    let mut writer = Writer::from_writer(out);
    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for record in records {
        writer.write_record(columns.iter().map(|column| csv_cell(record.get(column))))?;
    }
    writer.flush()?;
    Ok(())
}

/// Renders records as CSV text.
pub fn render_csv(records: &[Record]) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| PolydbError::Conversion(e.to_string()))
}

/// Null, missing and empty-string values all become an empty cell.
fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::parse_record;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_records() -> Vec<Record> {
        vec![
            parse_record(r#"{"id": 1, "name": "Alice", "tags": ["a", "b"]}"#).unwrap(),
            parse_record(r#"{"id": 2, "name": "Bob, Jr.", "active": true, "tags": null}"#).unwrap(),
        ]
    }

    #[test]
    fn test_render_csv() {
        let csv = render_csv(&sample_records()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,tags,active");
        assert_eq!(lines[1], r#"1,Alice,"[""a"",""b""]","#);
        assert_eq!(lines[2], r#"2,"Bob, Jr.",,true"#);
    }

    #[test]
    fn test_render_csv_empty() {
        assert_eq!(render_csv(&[]).unwrap(), "");
    }

    #[test]
    fn test_write_export_json() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("exports");
        let summary = write_export(&sample_records(), "users", ExportFormat::Json, &out).unwrap();
        assert_eq!(summary.path, out.join("users.json"));
        assert_eq!(summary.records, 2);

        let written: Value = serde_json::from_str(&fs::read_to_string(&summary.path).unwrap()).unwrap();
        assert_eq!(written[1]["name"], json!("Bob, Jr."));
        assert_eq!(written[0]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_write_export_keeps_file_in_dir() {
        let dir = TempDir::new().unwrap();
        let summary = write_export(&[], "../escape", ExportFormat::Csv, dir.path()).unwrap();
        assert_eq!(summary.path, dir.path().join(".._escape.csv"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" json ".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(PolydbError::UnsupportedFormat(_))
        ));
        assert_eq!(ExportFormat::Json.to_string(), "json");
    }
}
