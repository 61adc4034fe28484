/// Database Module
///
/// One adapter per backend, all behind the [`DatabaseAdapter`] trait so the
/// operation layer can stay a plain switch on the selected backend.
///
/// ## Architecture
///
/// - **MongoDB** (`mongo.rs`): official async driver
/// - **MySQL** (`mysql.rs`): `sqlx` single connection
/// - **SQLite** (`sqlite.rs`): `rusqlite` file connection
/// - **Schema reports** (`schema.rs`): shared report structures
///
/// Each adapter owns exactly one connection. Callers open an adapter, perform
/// one request and close it again.
pub mod mongo;
pub mod mysql;
pub mod schema;
pub mod sqlite;

use crate::config::AppConfig;
use crate::core::{Backend, Record, Result, Target};
use async_trait::async_trait;
use tracing::debug;

pub use schema::{FieldSchema, IndexSchema, SchemaReport};

/// Native operations every backend provides.
#[async_trait]
pub trait DatabaseAdapter: Send {
    /// The backend this adapter talks to
    fn backend(&self) -> Backend;

    /// Names of all collections or tables, sorted
    async fn list_collections(&mut self) -> Result<Vec<String>>;

    /// Creates a collection, or a table from a user-entered column definition
    async fn create_collection(&mut self, name: &str, definition: &str) -> Result<()>;

    /// Inserts one record
    async fn insert(&mut self, collection: &str, record: &Record) -> Result<()>;

    /// Inserts a batch of records, returning how many were written
    async fn insert_many(&mut self, collection: &str, records: &[Record]) -> Result<u64>;

    /// Reads every record of a collection
    async fn find_all(&mut self, collection: &str) -> Result<Vec<Record>>;

    /// Applies `changes` to the record with the given identifier, returning
    /// the number of records matched
    async fn update(&mut self, collection: &str, id: &str, changes: &Record) -> Result<u64>;

    /// Deletes the record with the given identifier, returning the number deleted
    async fn delete(&mut self, collection: &str, id: &str) -> Result<u64>;

    /// Describes a collection's fields and indexes
    async fn describe(&mut self, collection: &str) -> Result<SchemaReport>;

    /// Closes the underlying connection
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a connection to the target database.
pub async fn open(config: &AppConfig, target: &Target) -> Result<Box<dyn DatabaseAdapter>> {
    debug!("Opening {} connection to {:?}", target.backend, target.database);
    let adapter: Box<dyn DatabaseAdapter> = match target.backend {
        Backend::Mongodb => Box::new(mongo::MongoAdapter::connect(&config.mongodb, &target.database).await?),
        Backend::Mysql => Box::new(mysql::MySqlAdapter::connect(&config.mysql, &target.database).await?),
        Backend::Sqlite => Box::new(sqlite::SqliteAdapter::open(&config.sqlite.resolve(&target.database)?)?),
    };
    Ok(adapter)
}

/// A record identifier as typed by the user, bound as an integer when it
/// looks like one.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordId {
    Integer(i64),
    Text(String),
}

impl RecordId {
    pub fn parse(id: &str) -> Self {
        let id = id.trim();
        match id.parse::<i64>() {
            Ok(n) => RecordId::Integer(n),
            Err(_) => RecordId::Text(id.to_string()),
        }
    }
}
