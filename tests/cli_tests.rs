//! End-to-end tests for the polydb binary
//!
//! Every test runs against SQLite files inside a temporary directory, with a
//! configuration file that points the SQLite, export and backup directories
//! there, so nothing outside the sandbox is touched.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("polydb.toml");
        fs::write(
            &config,
            format!(
                "[sqlite]\ndirectory = '{}'\n\n[export]\ndirectory = '{}'\n\n[backup]\ndirectory = '{}'\n",
                dir.path().display(),
                dir.path().join("exports").display(),
                dir.path().join("backups").display(),
            ),
        )
        .unwrap();
        Sandbox { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn polydb(&self) -> Command {
        let mut cmd = Command::cargo_bin("polydb").unwrap();
        cmd.arg("--config").arg(&self.config);
        for var in ["SQLITE_DB_PATH", "POLYDB_EXPORT_DIR", "POLYDB_BACKUP_DIR", "MYSQL_DATABASE"] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn sqlite(&self, args: &[&str]) -> Command {
        let mut cmd = self.polydb();
        let (subcommand, rest) = args.split_first().unwrap();
        cmd.arg(subcommand).args(["--backend", "sqlite", "--db", "shop"]).args(rest);
        cmd
    }

    /// Creates shop.db with a users table holding two records
    fn seed(&self) {
        self.sqlite(&["create-db"]).assert().success();
        self.sqlite(&[
            "create-collection",
            "users",
            "--schema",
            "id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE",
        ])
        .assert()
        .success();
        self.sqlite(&["insert", "users", r#"{"name": "Alice", "email": "alice@example.com"}"#])
            .assert()
            .success();
        self.sqlite(&["insert", "users", r#"{"name": "Bob", "email": "bob@example.com"}"#])
            .assert()
            .success();
    }
}

/// Runs the command, expecting success, and returns its stdout
fn stdout_of(mut cmd: Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// Runs the command, expecting failure, and returns its stderr
fn stderr_of(mut cmd: Command) -> String {
    let output = cmd.output().unwrap();
    assert!(!output.status.success(), "command unexpectedly succeeded");
    String::from_utf8(output.stderr).unwrap()
}

#[test]
fn test_help_lists_commands() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.polydb();
    cmd.arg("--help");
    let out = stdout_of(cmd);
    assert!(out.contains("create-collection"));
    assert!(out.contains("backup"));
}

#[test]
fn test_create_db_makes_file() {
    let sandbox = Sandbox::new();
    let out = stdout_of(sandbox.sqlite(&["create-db"]));
    assert!(out.contains("Database shop created."));
    assert!(sandbox.path().join("shop.db").exists());
}

#[test]
fn test_record_crud() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    assert_eq!(stdout_of(sandbox.sqlite(&["list"])), "users\n");

    let out = stdout_of(sandbox.sqlite(&["read", "users"]));
    assert!(out.contains("\"name\": \"Alice\""));
    assert!(out.contains("\"email\": \"bob@example.com\""));

    let out = stdout_of(sandbox.sqlite(&["update", "users", "1", r#"{"name": "Alicia"}"#]));
    assert!(out.contains("1 record(s) updated."));

    let out = stdout_of(sandbox.sqlite(&["delete", "users", "2"]));
    assert!(out.contains("1 record(s) deleted."));

    let out = stdout_of(sandbox.sqlite(&["read", "users"]));
    assert!(out.contains("Alicia"));
    assert!(!out.contains("Bob"));
}

#[test]
fn test_update_missing_id_matches_nothing() {
    let sandbox = Sandbox::new();
    sandbox.seed();
    let out = stdout_of(sandbox.sqlite(&["update", "users", "99", r#"{"name": "Nobody"}"#]));
    assert!(out.contains("0 record(s) updated."));
}

#[test]
fn test_invalid_record_fails() {
    let sandbox = Sandbox::new();
    sandbox.seed();
    let err = stderr_of(sandbox.sqlite(&["insert", "users", "[1, 2]"]));
    assert!(err.contains("Invalid record"), "{}", err);
}

#[test]
fn test_read_missing_table_fails() {
    let sandbox = Sandbox::new();
    sandbox.seed();
    let err = stderr_of(sandbox.sqlite(&["read", "ghosts"]));
    assert!(err.contains("The table \"ghosts\" does not exist."), "{}", err);
}

#[test]
fn test_unknown_backend_is_rejected() {
    let sandbox = Sandbox::new();
    let mut cmd = sandbox.polydb();
    cmd.args(["list", "--backend", "oracle", "--db", "x"]);
    stderr_of(cmd);
}

#[test]
fn test_schema_report() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    let out = stdout_of(sandbox.sqlite(&["schema", "users"]));
    assert!(out.starts_with("Table: users (sqlite)"), "{}", out);
    assert!(out.contains("id: INTEGER [primary key, not null]"), "{}", out);
    assert!(out.contains("name: TEXT [not null]"), "{}", out);

    let out = stdout_of(sandbox.sqlite(&["schema", "users", "--json"]));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["backend"], "sqlite");
    assert_eq!(report["fields"].as_array().unwrap().len(), 3);
}

#[test]
fn test_export_and_import() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    let out = stdout_of(sandbox.sqlite(&["export", "users", "--format", "csv"]));
    assert!(out.contains("Exported 2 records"));
    let csv = fs::read_to_string(sandbox.path().join("exports/users.csv")).unwrap();
    assert_eq!(
        csv,
        "id,name,email\n1,Alice,alice@example.com\n2,Bob,bob@example.com\n"
    );

    let input = sandbox.path().join("more.json");
    fs::write(
        &input,
        r#"[{"name": "Carol", "email": "carol@example.com"}, {"name": "Dan", "email": null}]"#,
    )
    .unwrap();
    let out = stdout_of(sandbox.sqlite(&["import", "users", input.to_str().unwrap()]));
    assert!(out.contains("Imported 2 records into users."));

    let out_dir = sandbox.path().join("json-out");
    stdout_of(sandbox.sqlite(&["export", "users", "--out-dir", out_dir.to_str().unwrap()]));
    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("users.json")).unwrap()).unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 4);
    assert_eq!(exported[3]["email"], serde_json::Value::Null);
}

#[test]
fn test_import_is_all_or_nothing() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    // Second record collides with the UNIQUE email
    let input = sandbox.path().join("dupes.json");
    fs::write(
        &input,
        r#"[{"name": "Eve", "email": "eve@example.com"}, {"name": "Al", "email": "alice@example.com"}]"#,
    )
    .unwrap();
    stderr_of(sandbox.sqlite(&["import", "users", input.to_str().unwrap()]));

    let out = stdout_of(sandbox.sqlite(&["read", "users"]));
    assert!(!out.contains("Eve"));
}

#[test]
fn test_backup_without_sqlite3_reports_failure() {
    let sandbox = Sandbox::new();
    sandbox.seed();
    let config = sandbox.path().join("missing-tool.toml");
    fs::write(
        &config,
        format!(
            "[sqlite]\ndirectory = '{}'\n\n[backup]\nsqlite3 = 'polydb-no-such-sqlite3'\n",
            sandbox.path().display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("polydb").unwrap();
    cmd.env_remove("SQLITE_DB_PATH")
        .env_remove("POLYDB_BACKUP_DIR")
        .arg("--config")
        .arg(&config)
        .args(["backup", "--backend", "sqlite", "--db", "shop"])
        .arg("--out-dir")
        .arg(sandbox.path().join("bk"));
    let err = stderr_of(cmd);
    assert!(err.contains("Backup failed: failed to run polydb-no-such-sqlite3"), "{}", err);
}

#[test]
fn test_interactive_session() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    // type, existing db, name, list tables, continue, read users, continue, exit
    let mut cmd = sandbox.polydb();
    cmd.write_stdin("sqlite\n1\nshop\n1\n\nRead Records\nusers\n\nexit\n");
    let out = stdout_of(cmd);
    assert!(out.contains("? Select the database type:"));
    assert!(out.contains("  - users"));
    assert!(out.contains("\"name\": \"Alice\""));
    assert!(out.contains("Goodbye!"));
}

#[test]
fn test_interactive_reports_errors_and_ends_at_eof() {
    let sandbox = Sandbox::new();
    sandbox.seed();

    let mut cmd = sandbox.polydb();
    cmd.arg("interactive")
        .write_stdin("sqlite\n1\nshop\nschema\nghosts\n\n");
    let out = stdout_of(cmd);
    assert!(
        out.contains("Error generating schema report: The table \"ghosts\" does not exist."),
        "{}",
        out
    );
}
