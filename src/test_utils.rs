/// # Test Utilities Module
///
/// Fixtures for tests that need a real database: each `TestDb` owns a
/// temporary directory holding a populated SQLite file plus a configuration
/// whose SQLite, export and backup directories all point inside it.

use crate::config::AppConfig;
use crate::core::{Backend, Target};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated SQLite database fixture
pub struct TestDb {
    pub dir: TempDir,
    pub path: PathBuf,
    pub config: AppConfig,
    pub target: Target,
}

impl TestDb {
    /// Creates `sample.db` with the standard schema and sample data
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("sample.db");

        let conn = Connection::open(&path).expect("Failed to create sample database");
        setup_standard_schema(&conn);
        populate_sample_data(&conn);
        conn.close().expect("Failed to close sample database");

        let mut config = AppConfig::default();
        config.sqlite.directory = dir.path().to_path_buf();
        config.export.directory = dir.path().join("exports");
        config.backup.directory = dir.path().join("backups");

        let target = Target::new(Backend::Sqlite, path.display().to_string());
        TestDb {
            dir,
            path,
            config,
            target,
        }
    }
}

/// Set up standard test schema
fn setup_standard_schema(conn: &Connection) {
    conn.execute_batch(
        "
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE,
            age INTEGER
        );

        CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            price REAL,
            tags TEXT
        );

        CREATE INDEX idx_products_title ON products (title);
    ",
    )
    .expect("Failed to create schema");
}

/// Populate with realistic sample data
fn populate_sample_data(conn: &Connection) {
    let users = [
        ("Alice", "alice@example.com", Some(28)),
        ("Bob", "bob@example.com", None),
        ("Charlie", "charlie@example.com", Some(25)),
    ];
    for (name, email, age) in users {
        conn.execute(
            "INSERT INTO users (name, email, age) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, email, age],
        )
        .expect("Failed to insert user");
    }

    let products = [
        ("Keyboard", 49.5, r#"["input"]"#),
        ("Monitor", 199.0, r#"["display", "hd"]"#),
    ];
    for (title, price, tags) in products {
        conn.execute(
            "INSERT INTO products (title, price, tags) VALUES (?1, ?2, ?3)",
            rusqlite::params![title, price, tags],
        )
        .expect("Failed to insert product");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_populated() {
        let fixture = TestDb::new();
        let conn = Connection::open(&fixture.path).unwrap();
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)).unwrap();
        let products: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0)).unwrap();
        assert_eq!(users, 3);
        assert_eq!(products, 2);
        assert_eq!(fixture.config.sqlite.resolve(&fixture.target.database).unwrap(), fixture.path);
    }
}
