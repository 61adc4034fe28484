/// Import Module
///
/// Reads records from a file for batch insertion. `.csv` files use their header
/// row as keys; anything else is parsed as JSON.

use crate::core::record::json_kind;
use crate::core::{PolydbError, Record, Result};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Loads the records stored in `path`.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        read_csv(File::open(path)?)?
    } else {
        parse_json_records(&fs::read_to_string(path)?)?
    };
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parses a JSON array of objects; a lone object counts as one record.
pub fn parse_json_records(text: &str) -> Result<Vec<Record>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(PolydbError::InvalidRecord(format!(
                    "item {} is {}, expected an object",
                    i,
                    json_kind(&other)
                ))),
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        other => Err(PolydbError::InvalidRecord(format!(
            "expected an array of records, got {}",
            json_kind(&other)
        ))),
    }
}

/// Reads CSV rows as records. Empty cells become null; every other cell is
/// kept as a string.
pub fn read_csv<R: Read>(input: R) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = Record::new();
        for (key, cell) in headers.iter().zip(row.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            record.insert(key.to_string(), value);
        }
        records.push(record);
    }
    Ok(records)
}
