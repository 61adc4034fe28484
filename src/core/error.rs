/// Polydb Error Module
///
/// This module defines the error type shared by every backend adapter and
/// the interactive front end. Driver errors are wrapped as-is so the user sees
/// the message the database produced.
use thiserror::Error;

/// Error type for polydb.
///
/// The variants cover:
/// - Driver failures from SQLite, MySQL and MongoDB
/// - Missing or empty collections/tables
/// - Malformed user input (records, identifiers, backend names)
/// - Configuration, prompt and backup failures
/// - File system, JSON and CSV errors from import/export
#[derive(Error, Debug)]
pub enum PolydbError {
    /// Errors from the embedded SQLite driver
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Errors from the MySQL driver
    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    /// Errors from the MongoDB driver
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// The named collection or table does not exist
    #[error("The {noun} \"{name}\" does not exist.")]
    NotFound { noun: &'static str, name: String },

    /// The named collection exists but holds nothing to sample
    #[error("The collection \"{0}\" is empty.")]
    EmptyCollection(String),

    /// User-entered record data that cannot be used
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Table, column or collection names that cannot be used safely
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Unknown backend names
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(String),

    /// Unknown export formats
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Value conversion between JSON and a driver's native representation
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interactive prompt failures, including end of input
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// External dump utility failures
    #[error("Backup failed: {0}")]
    Backup(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading and writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Type alias for Result to use PolydbError as the error type.
pub type Result<T> = std::result::Result<T, PolydbError>;
