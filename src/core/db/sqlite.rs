/// SQLite Adapter
///
/// Drives an embedded database file through `rusqlite`. Record keys map to
/// columns; values are always bound as parameters.
///
/// SQLite has no boolean or JSON storage class, so the declared column type
/// decides how values are written and read back: `BOOLEAN` columns hold 0/1
/// and read back as booleans, `JSON` columns hold every value JSON-encoded.

use super::schema::{FieldSchema, IndexSchema, SchemaReport};
use super::{DatabaseAdapter, RecordId};
use crate::core::record::validate_identifier;
use crate::core::{Backend, PolydbError, Record, Result};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// How a column's declared type shapes value conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Boolean,
    Json,
    Plain,
}

impl ColumnKind {
    pub(crate) fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("BOOL") {
            ColumnKind::Boolean
        } else if declared.contains("JSON") {
            ColumnKind::Json
        } else {
            ColumnKind::Plain
        }
    }
}

type ColumnKinds = HashMap<String, ColumnKind>;

fn kind_of(kinds: &ColumnKinds, column: &str) -> ColumnKind {
    kinds.get(column).copied().unwrap_or(ColumnKind::Plain)
}

/// Adapter over a single SQLite connection
#[derive(Debug)]
pub struct SqliteAdapter {
    conn: Connection,
}

impl SqliteAdapter {
    /// Opens (creating if needed) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening SQLite database {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(SqliteAdapter { conn })
    }

    /// Wraps an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        SqliteAdapter { conn }
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_table(&self, table: &str) -> Result<()> {
        if self.table_exists(table)? {
            Ok(())
        } else {
            Err(PolydbError::NotFound {
                noun: "table",
                name: table.to_string(),
            })
        }
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn list_collections(&mut self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    async fn create_collection(&mut self, name: &str, definition: &str) -> Result<()> {
        let table = quote(validate_identifier(name)?);
        if definition.trim().is_empty() {
            return Err(PolydbError::InvalidRecord(
                "a column definition is required to create a table".to_string(),
            ));
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, definition.trim());
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    async fn insert(&mut self, collection: &str, record: &Record) -> Result<()> {
        let table = validate_identifier(collection)?;
        let kinds = column_kinds(&self.conn, table)?;
        insert_record(&self.conn, table, &kinds, record)
    }

    async fn insert_many(&mut self, collection: &str, records: &[Record]) -> Result<u64> {
        let table = validate_identifier(collection)?;
        let kinds = column_kinds(&self.conn, table)?;
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record(&tx, table, &kinds, record)?;
        }
        tx.commit()?;
        Ok(records.len() as u64)
    }

    async fn find_all(&mut self, collection: &str) -> Result<Vec<Record>> {
        let table = validate_identifier(collection)?;
        self.require_table(table)?;
        let kinds = column_kinds(&self.conn, table)?;

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", quote(table)))?;
        let columns: Vec<(String, ColumnKind)> = stmt
            .column_names()
            .into_iter()
            .map(|name| (name.to_string(), kind_of(&kinds, name)))
            .collect();
        let records = stmt
            .query_map([], |row| {
                let mut record = Record::new();
                for (i, (name, kind)) in columns.iter().enumerate() {
                    record.insert(name.clone(), to_json(row.get_ref(i)?, *kind));
                }
                Ok(record)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn update(&mut self, collection: &str, id: &str, changes: &Record) -> Result<u64> {
        let table = validate_identifier(collection)?;
        let keys: Vec<&str> = changes.keys().map(String::as_str).collect();
        let sql = update_statement(table, &keys)?;
        let kinds = column_kinds(&self.conn, table)?;

        let mut params = changes
            .iter()
            .map(|(key, value)| to_sql_value(value, kind_of(&kinds, key)))
            .collect::<Result<Vec<SqlValue>>>()?;
        params.push(id_value(id));
        let changed = self.conn.execute(&sql, params_from_iter(params))?;
        Ok(changed as u64)
    }

    async fn delete(&mut self, collection: &str, id: &str) -> Result<u64> {
        let table = quote(validate_identifier(collection)?);
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        let deleted = self.conn.execute(&sql, [id_value(id)])?;
        Ok(deleted as u64)
    }

    async fn describe(&mut self, collection: &str) -> Result<SchemaReport> {
        let table = validate_identifier(collection)?;
        self.require_table(table)?;

        Ok(SchemaReport {
            collection: table.to_string(),
            backend: Backend::Sqlite,
            fields: get_table_columns(&self.conn, table)?,
            indexes: get_table_indexes(&self.conn, table)?,
            sampled_documents: None,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| PolydbError::Sqlite(e))
    }
}

fn insert_record(conn: &Connection, table: &str, kinds: &ColumnKinds, record: &Record) -> Result<()> {
    let keys: Vec<&str> = record.keys().map(String::as_str).collect();
    let sql = insert_statement(table, &keys)?;
    let params = record
        .iter()
        .map(|(key, value)| to_sql_value(value, kind_of(kinds, key)))
        .collect::<Result<Vec<SqlValue>>>()?;
    conn.execute(&sql, params_from_iter(params))?;
    Ok(())
}

/// Conversion kind of every column of `table`, keyed by column name
fn column_kinds(conn: &Connection, table: &str) -> Result<ColumnKinds> {
    Ok(get_table_columns(conn, table)?
        .into_iter()
        .map(|field| {
            let kind = ColumnKind::from_declared(&field.type_name);
            (field.name, kind)
        })
        .collect())
}

/// Builds the INSERT for a record with the given keys.
fn insert_statement(table: &str, keys: &[&str]) -> Result<String> {
    if keys.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", quote(table)));
    }
    let mut columns = Vec::with_capacity(keys.len());
    for key in keys {
        columns.push(quote(validate_identifier(key)?));
    }
    let placeholders: Vec<String> = (1..=keys.len()).map(|i| format!("?{}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(", "),
        placeholders.join(", ")
    ))
}

/// Builds the UPDATE for the given keys; the id is the last parameter.
fn update_statement(table: &str, keys: &[&str]) -> Result<String> {
    if keys.is_empty() {
        return Err(PolydbError::InvalidRecord("no fields to update".to_string()));
    }
    let mut assignments = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        assignments.push(format!("{} = ?{}", quote(validate_identifier(key)?), i + 1));
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        quote(table),
        assignments.join(", "),
        keys.len() + 1
    ))
}

/// Helper function to retrieve column information for a specific table
fn get_table_columns(conn: &Connection, table_name: &str) -> Result<Vec<FieldSchema>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table_name)))?;
    let columns = stmt
        .query_map([], |row| {
            let notnull: bool = row.get(3)?;
            let pk: i64 = row.get(5)?;
            Ok(FieldSchema {
                name: row.get(1)?,
                type_name: row.get(2)?,
                nullable: !notnull && pk == 0,
                primary_key: pk > 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Helper function to retrieve index information for a specific table
fn get_table_indexes(conn: &Connection, table_name: &str) -> Result<Vec<IndexSchema>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quote(table_name)))?;
    let listed = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?, // index name
                row.get::<_, bool>(2)?,   // unique
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut indexes = Vec::with_capacity(listed.len());
    for (name, unique) in listed {
        let mut info = conn.prepare(&format!("PRAGMA index_info({})", quote(&name)))?;
        // Expression indexes report a NULL column name
        let columns = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|c| c.unwrap_or_else(|| "<expr>".to_string()))
            .collect();
        indexes.push(IndexSchema { name, columns, unique });
    }
    Ok(indexes)
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn id_value(id: &str) -> SqlValue {
    match RecordId::parse(id) {
        RecordId::Integer(n) => SqlValue::Integer(n),
        RecordId::Text(s) => SqlValue::Text(s),
    }
}

/// Converts a JSON value to the SQLite value bound for a column of `kind`.
///
/// Booleans become 0/1; nested arrays and objects are stored as JSON text.
/// Integers beyond the signed 64-bit range are rejected rather than rounded.
pub(crate) fn to_sql_value(value: &Value, kind: ColumnKind) -> Result<SqlValue> {
    let converted = match value {
        Value::Null => SqlValue::Null,
        _ if kind == ColumnKind::Json => SqlValue::Text(value.to_string()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if n.is_u64() {
                return Err(PolydbError::Conversion(format!(
                    "{} does not fit in a 64-bit signed integer",
                    n
                )));
            } else {
                match n.as_f64() {
                    Some(f) => SqlValue::Real(f),
                    None => return Err(PolydbError::Conversion(format!("unsupported number {}", n))),
                }
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    };
    Ok(converted)
}

/// Converts a stored SQLite value from a column of `kind` back to JSON.
pub(crate) fn to_json(value: ValueRef<'_>, kind: ColumnKind) -> Value {
    match (value, kind) {
        (ValueRef::Integer(i @ (0 | 1)), ColumnKind::Boolean) => Value::Bool(i == 1),
        // Text not written by polydb may not be valid JSON
        (ValueRef::Text(t), ColumnKind::Json) => serde_json::from_slice(t)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(t).into_owned())),
        (value, _) => plain_json(value),
    }
}

fn plain_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}
