use crate::core::{PolydbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section is optional; missing values fall back to defaults that match
/// a local development setup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub mongodb: MongoConfig,
    pub mysql: MySqlConfig,
    pub sqlite: SqliteConfig,
    pub export: ExportConfig,
    pub backup: BackupConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// MongoDB connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
}

/// MySQL connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database used when the session does not name one.
    pub database: Option<String>,
}

/// SQLite file settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file used when the session does not name one.
    pub path: Option<PathBuf>,
    /// Directory that bare database names are created in.
    pub directory: PathBuf,
}

/// Export settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

/// Backup settings, including the external dump programs to run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub directory: PathBuf,
    pub mongodump: String,
    pub mysqldump: String,
    pub sqlite3: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
        }
    }
}

impl Default for MySqlConfig {
    fn default() -> Self {
        MySqlConfig {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            path: None,
            directory: PathBuf::from("."),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            directory: PathBuf::from("."),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            directory: PathBuf::from("backups"),
            mongodump: "mongodump".to_string(),
            mysqldump: "mysqldump".to_string(),
            sqlite3: "sqlite3".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration for a run.
    ///
    /// An explicit `path` must exist. Without one, the per-user file
    /// `<config dir>/polydb/config.toml` is read when present. Environment
    /// variables are applied last.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => match default_config_path() {
                Some(default) if default.exists() => load_config(&default)?,
                _ => AppConfig::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("MONGODB_URI") {
            self.mongodb.uri = uri;
        }
        if let Some(host) = lookup("MYSQL_HOST") {
            self.mysql.host = host;
        }
        if let Some(port) = lookup("MYSQL_PORT") {
            self.mysql.port = port
                .parse()
                .map_err(|_| PolydbError::Config(format!("MYSQL_PORT is not a port number: {}", port)))?;
        }
        if let Some(user) = lookup("MYSQL_USER") {
            self.mysql.user = user;
        }
        if let Some(password) = lookup("MYSQL_PASSWORD") {
            self.mysql.password = password;
        }
        if let Some(database) = lookup("MYSQL_DATABASE") {
            self.mysql.database = Some(database);
        }
        if let Some(path) = lookup("SQLITE_DB_PATH") {
            self.sqlite.path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("POLYDB_EXPORT_DIR") {
            self.export.directory = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("POLYDB_BACKUP_DIR") {
            self.backup.directory = PathBuf::from(dir);
        }
        Ok(())
    }
}

impl SqliteConfig {
    /// Maps a database name entered by the user to a file path.
    ///
    /// An empty name falls back to the configured path. Names without an
    /// extension get `.db`, and bare file names live in `directory`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return self.path.clone().ok_or_else(|| {
                PolydbError::Config("no SQLite database named and SQLITE_DB_PATH is not set".to_string())
            });
        }
        if name == ":memory:" {
            return Ok(PathBuf::from(name));
        }

        let mut path = PathBuf::from(name);
        if path.extension().is_none() {
            path.set_extension("db");
        }
        let bare = path.parent().map_or(true, |p| p.as_os_str().is_empty());
        if path.is_relative() && bare {
            path = self.directory.join(path);
        }
        Ok(path)
    }
}

impl MySqlConfig {
    /// The database a session should use: the selected name, else the
    /// configured default.
    pub fn resolve_database(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
        self.database
            .clone()
            .filter(|db| !db.is_empty())
            .ok_or_else(|| PolydbError::Config("no MySQL database selected and MYSQL_DATABASE is not set".to_string()))
    }
}

/// Location of the per-user configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("polydb").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)
        .map_err(|e| PolydbError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| PolydbError::Config(format!("{}: {}", path.display(), e)))
}
