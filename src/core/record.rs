/// Record Module
///
/// Records are opaque key-value documents. They travel from user-entered JSON
/// to the backend call without any schema being applied, so this module only
/// parses them and guards the names that end up inside SQL text.
use crate::core::{PolydbError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// A single document or row: field name to untyped value, in insertion order.
pub type Record = Map<String, Value>;

/// Longest identifier MySQL accepts; applied to SQLite as well.
const MAX_IDENTIFIER_LEN: usize = 64;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

/// Parses user input into a record. Only JSON objects are records.
pub fn parse_record(input: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(input.trim())? {
        Value::Object(map) => Ok(map),
        other => Err(PolydbError::InvalidRecord(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Checks that a table or column name can be interpolated into SQL.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(PolydbError::InvalidIdentifier(name.to_string()))
    }
}

/// Checks a MongoDB collection name.
pub fn validate_collection_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains('$') || name.contains('\0') || name.starts_with("system.") {
        Err(PolydbError::InvalidIdentifier(name.to_string()))
    } else {
        Ok(name)
    }
}

/// Union of the keys of all records, in first-seen order.
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Short name of a JSON value's type, for messages and inferred schemas.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
