/// Backend Module
///
/// Identifies which of the supported database systems a session talks to,
/// and which database on it.
use crate::core::{PolydbError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The database systems polydb can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Document store
    #[value(alias = "mongo")]
    Mongodb,
    /// Relational server
    Mysql,
    /// Embedded relational file
    #[value(alias = "sqlite3")]
    Sqlite,
}

impl Backend {
    /// All backends, in the order they are offered to the user.
    pub const ALL: [Backend; 3] = [Backend::Mongodb, Backend::Mysql, Backend::Sqlite];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Mongodb => "mongodb",
            Backend::Mysql => "mysql",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Whether the backend stores rows in tables with declared columns.
    pub fn is_relational(&self) -> bool {
        !matches!(self, Backend::Mongodb)
    }

    /// What this backend calls a set of records.
    pub fn collection_noun(&self) -> &'static str {
        if self.is_relational() {
            "table"
        } else {
            "collection"
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = PolydbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Backend::Mongodb),
            "mysql" => Ok(Backend::Mysql),
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            other => Err(PolydbError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// The backend and database a session operates on.
///
/// For SQLite `database` is a file name or path; for the servers it is the
/// database (schema) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub backend: Backend,
    pub database: String,
}

impl Target {
    pub fn new(backend: Backend, database: impl Into<String>) -> Self {
        Target {
            backend,
            database: database.into(),
        }
    }
}
