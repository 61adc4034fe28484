/// MySQL Adapter
///
/// Talks to a MySQL server over a single `sqlx` connection. Table and column
/// metadata come from `information_schema`; row values are decoded by their
/// reported column type.

use super::schema::{FieldSchema, IndexSchema, SchemaReport};
use super::{DatabaseAdapter, RecordId};
use crate::config::MySqlConfig;
use crate::core::record::validate_identifier;
use crate::core::{Backend, PolydbError, Record, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, MySql, Row, TypeInfo, ValueRef};
use tracing::{debug, trace};

pub struct MySqlAdapter {
    conn: MySqlConnection,
    database: String,
}

impl MySqlAdapter {
    /// Connects to `database`, or the configured default when it is empty.
    pub async fn connect(config: &MySqlConfig, database: &str) -> Result<Self> {
        let database = config.resolve_database(database)?;
        debug!("Connecting to MySQL {}:{}/{}", config.host, config.port, database);
        let conn = connect_options(config).database(&database).connect().await?;
        Ok(MySqlAdapter { conn, database })
    }

    /// Creates a database on the server if it does not exist yet.
    pub async fn create_database(config: &MySqlConfig, name: &str) -> Result<()> {
        let name = validate_identifier(name.trim())?;
        let mut conn = connect_options(config).connect().await?;
        let sql = format!("CREATE DATABASE IF NOT EXISTS {}", quote(name));
        sqlx::query(&sql).execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn require_table(&mut self, table: &str) -> Result<()> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(table)
        .fetch_one(&mut self.conn)
        .await?;
        if count == 0 {
            return Err(PolydbError::NotFound {
                noun: "table",
                name: table.to_string(),
            });
        }
        Ok(())
    }
}

fn connect_options(config: &MySqlConfig) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user);
    if config.password.is_empty() {
        options
    } else {
        options.password(&config.password)
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn backend(&self) -> Backend {
        Backend::Mysql
    }

    async fn list_collections(&mut self) -> Result<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.tables
             WHERE TABLE_SCHEMA = DATABASE()
             ORDER BY TABLE_NAME",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(tables)
    }

    async fn create_collection(&mut self, name: &str, definition: &str) -> Result<()> {
        let table = quote(validate_identifier(name)?);
        if definition.trim().is_empty() {
            return Err(PolydbError::InvalidRecord(
                "a column definition is required to create a table".to_string(),
            ));
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, definition.trim());
        sqlx::query(&sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn insert(&mut self, collection: &str, record: &Record) -> Result<()> {
        let sql = insert_statement(validate_identifier(collection)?, &keys_of(record))?;
        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = bind_json(query, value);
        }
        query.execute(&mut self.conn).await?;
        Ok(())
    }

    async fn insert_many(&mut self, collection: &str, records: &[Record]) -> Result<u64> {
        let table = validate_identifier(collection)?;
        let mut tx = self.conn.begin().await?;
        for record in records {
            let sql = insert_statement(table, &keys_of(record))?;
            let mut query = sqlx::query(&sql);
            for value in record.values() {
                query = bind_json(query, value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(records.len() as u64)
    }

    async fn find_all(&mut self, collection: &str) -> Result<Vec<Record>> {
        let table = validate_identifier(collection)?;
        self.require_table(table).await?;

        let sql = format!("SELECT * FROM {}", quote(table));
        let rows = sqlx::query(&sql).fetch_all(&mut self.conn).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn update(&mut self, collection: &str, id: &str, changes: &Record) -> Result<u64> {
        let sql = update_statement(validate_identifier(collection)?, &keys_of(changes))?;
        let mut query = sqlx::query(&sql);
        for value in changes.values() {
            query = bind_json(query, value);
        }
        let result = bind_id(query, id).execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&mut self, collection: &str, id: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", quote(validate_identifier(collection)?));
        let result = bind_id(sqlx::query(&sql), id).execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn describe(&mut self, collection: &str) -> Result<SchemaReport> {
        let table = validate_identifier(collection)?;
        self.require_table(table).await?;

        let column_rows = sqlx::query(
            "SELECT
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(COLUMN_TYPE AS CHAR) AS column_type,
                CAST(IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(COLUMN_KEY AS CHAR) AS column_key
             FROM information_schema.columns
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY ORDINAL_POSITION",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut fields = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let is_nullable: String = row.try_get("is_nullable")?;
            let column_key: String = row.try_get("column_key")?;
            fields.push(FieldSchema {
                name: row.try_get("column_name")?,
                type_name: row.try_get("column_type")?,
                nullable: is_nullable == "YES",
                primary_key: column_key == "PRI",
            });
        }

        let index_rows = sqlx::query(
            "SELECT
                CAST(INDEX_NAME AS CHAR) AS index_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(NON_UNIQUE AS SIGNED) AS non_unique
             FROM information_schema.statistics
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY INDEX_NAME, SEQ_IN_INDEX",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut indexes: Vec<IndexSchema> = Vec::new();
        for row in &index_rows {
            let name: String = row.try_get("index_name")?;
            // Functional key parts have no column name
            let column: Option<String> = row.try_get("column_name")?;
            let non_unique: i64 = row.try_get("non_unique")?;
            let column = column.unwrap_or_else(|| "<expr>".to_string());
            match indexes.iter_mut().find(|i| i.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(IndexSchema {
                    name,
                    columns: vec![column],
                    unique: non_unique == 0,
                }),
            }
        }

        Ok(SchemaReport {
            collection: table.to_string(),
            backend: Backend::Mysql,
            fields,
            indexes,
            sampled_documents: None,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        debug!("Closing MySQL connection to {}", self.database);
        self.conn.close().await?;
        Ok(())
    }
}

fn keys_of(record: &Record) -> Vec<&str> {
    record.keys().map(String::as_str).collect()
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Builds the INSERT for a record with the given keys.
fn insert_statement(table: &str, keys: &[&str]) -> Result<String> {
    if keys.is_empty() {
        return Ok(format!("INSERT INTO {} () VALUES ()", quote(table)));
    }
    let mut columns = Vec::with_capacity(keys.len());
    for key in keys {
        columns.push(quote(validate_identifier(key)?));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(", "),
        vec!["?"; keys.len()].join(", ")
    ))
}

/// Builds the UPDATE for the given keys; the id is bound last.
fn update_statement(table: &str, keys: &[&str]) -> Result<String> {
    if keys.is_empty() {
        return Err(PolydbError::InvalidRecord("no fields to update".to_string()));
    }
    let mut assignments = Vec::with_capacity(keys.len());
    for key in keys {
        assignments.push(format!("{} = ?", quote(validate_identifier(key)?)));
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE id = ?",
        quote(table),
        assignments.join(", ")
    ))
}

fn bind_id<'q>(query: Query<'q, MySql, MySqlArguments>, id: &str) -> Query<'q, MySql, MySqlArguments> {
    match RecordId::parse(id) {
        RecordId::Integer(n) => query.bind(n),
        RecordId::Text(s) => query.bind(s),
    }
}

/// Binds a JSON value; arrays and objects are sent as JSON text.
fn bind_json<'q>(query: Query<'q, MySql, MySqlArguments>, value: &Value) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
    }
}

/// Converts a result row into a record keyed by column name.
fn row_to_record(row: &MySqlRow) -> Result<Record> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if row.try_get_raw(index)?.is_null() {
            Value::Null
        } else {
            decode_column(row, index, column.type_info().name())?
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    trace!("Decoding column {} as {}", index, type_name);
    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" => Value::from(row.try_get::<i8, _>(index)?),
        "SMALLINT" => Value::from(row.try_get::<i16, _>(index)?),
        "MEDIUMINT" | "INT" => Value::from(row.try_get::<i32, _>(index)?),
        "BIGINT" => Value::from(row.try_get::<i64, _>(index)?),
        "TINYINT UNSIGNED" => Value::from(row.try_get::<u8, _>(index)?),
        "SMALLINT UNSIGNED" => Value::from(row.try_get::<u16, _>(index)?),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => Value::from(row.try_get::<u32, _>(index)?),
        "BIGINT UNSIGNED" => Value::from(row.try_get::<u64, _>(index)?),
        "YEAR" => Value::from(row.try_get_unchecked::<u16, _>(index)?),
        "FLOAT" => float_value(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => float_value(row.try_get::<f64, _>(index)?),
        // Exact decimals stay strings
        "DECIMAL" => Value::String(row.try_get_unchecked::<String, _>(index)?),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        // TIME is an interval: signed and up to 838 hours
        "TIME" => match row.try_get::<Duration, _>(index) {
            Ok(d) => Value::String(format_time(d)),
            Err(_) => Value::String(row.try_get_unchecked::<String, _>(index)?),
        },
        "DATETIME" | "TIMESTAMP" => Value::String(row.try_get::<NaiveDateTime, _>(index)?.to_string()),
        "JSON" => row.try_get::<Value, _>(index)?,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY" => {
            bytes_value(row.try_get_unchecked::<Vec<u8>, _>(index)?)
        }
        _ => match row.try_get::<String, _>(index) {
            Ok(s) => Value::String(s),
            Err(_) => Value::String(row.try_get_unchecked::<String, _>(index)?),
        },
    };
    Ok(value)
}

/// Formats a TIME value the way MySQL prints it, e.g. `-838:59:59` or `01:02:03.250000`.
fn format_time(d: Duration) -> String {
    let sign = if d < Duration::zero() { "-" } else { "" };
    let d = d.abs();
    let total = d.num_seconds();
    let micros = (d - Duration::seconds(total)).num_microseconds().unwrap_or(0);
    let clock = format!("{}{:02}:{:02}:{:02}", sign, total / 3600, (total % 3600) / 60, total % 60);
    if micros == 0 {
        clock
    } else {
        format!("{}.{:06}", clock, micros)
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Binary columns holding UTF-8 text read back as strings.
fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => Value::Array(e.into_bytes().into_iter().map(Value::from).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_escapes_backticks() {
        assert_eq!(quote("users"), "`users`");
        assert_eq!(quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_insert_statement() {
        assert_eq!(
            insert_statement("users", &["name", "email"]).unwrap(),
            "INSERT INTO `users` (`name`, `email`) VALUES (?, ?)"
        );
        assert_eq!(insert_statement("users", &[]).unwrap(), "INSERT INTO `users` () VALUES ()");
        assert!(matches!(
            insert_statement("users", &["name; DROP TABLE users"]),
            Err(PolydbError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_update_statement() {
        assert_eq!(
            update_statement("users", &["name", "age"]).unwrap(),
            "UPDATE `users` SET `name` = ?, `age` = ? WHERE id = ?"
        );
        assert!(matches!(
            update_statement("users", &[]),
            Err(PolydbError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_bytes_value() {
        assert_eq!(bytes_value(b"plain".to_vec()), json!("plain"));
        assert_eq!(bytes_value(vec![0xff, 0x01]), json!([255, 1]));
    }

    #[test]
    fn test_format_time_beyond_a_day() {
        let longest = Duration::hours(838) + Duration::minutes(59) + Duration::seconds(59);
        assert_eq!(format_time(longest), "838:59:59");
        assert_eq!(format_time(-longest), "-838:59:59");
        assert_eq!(format_time(-(Duration::hours(1) + Duration::minutes(30))), "-01:30:00");
        assert_eq!(format_time(Duration::zero()), "00:00:00");
        assert_eq!(
            format_time(Duration::seconds(3723) + Duration::milliseconds(250)),
            "01:02:03.250000"
        );
    }

    #[test]
    fn test_float_value() {
        assert_eq!(float_value(1.5), json!(1.5));
        assert_eq!(float_value(f64::INFINITY), Value::Null);
    }
}
